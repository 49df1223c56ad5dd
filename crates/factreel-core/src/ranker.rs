//! Asset ranking: keyword scoring of pooled video candidates and music picking.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::{MusicAsset, VideoCandidate};
use crate::keywords::stem;

/// A candidate together with its keyword score.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub candidate: VideoCandidate,
    pub score: u32,
}

/// Count how many keywords appear in the candidate's title or tags.
///
/// Matching is case-insensitive and compares stems token by token.
pub fn score(candidate: &VideoCandidate, keywords: &[String]) -> u32 {
    let tokens: HashSet<String> = std::iter::once(candidate.title.as_str())
        .chain(candidate.tags.iter().map(String::as_str))
        .flat_map(|field| field.split(|c: char| !c.is_alphanumeric()))
        .filter(|t| !t.is_empty())
        .map(stem)
        .collect();

    let wanted: HashSet<String> = keywords.iter().map(|k| stem(k)).collect();
    wanted.iter().filter(|k| tokens.contains(*k)).count() as u32
}

/// Order pooled candidates best-first.
///
/// Candidates shorter than `min_duration` are dropped and repeated
/// `(provider, id)` pairs are counted once. Ties on score go to the higher
/// native resolution, then to the provider listed first in `provider_order`,
/// then to pool order.
pub fn rank(
    pool: &[VideoCandidate],
    keywords: &[String],
    provider_order: &[String],
    min_duration: f64,
) -> Vec<RankedCandidate> {
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut ranked: Vec<RankedCandidate> = pool
        .iter()
        .filter(|c| c.duration >= min_duration)
        .filter(|c| seen.insert((c.provider.as_str(), c.id.as_str())))
        .map(|c| RankedCandidate {
            candidate: c.clone(),
            score: score(c, keywords),
        })
        .collect();

    let priority = |provider: &str| {
        provider_order
            .iter()
            .position(|p| p == provider)
            .unwrap_or(usize::MAX)
    };
    let pixels = |c: &VideoCandidate| c.resolution.map(|r| r.pixels()).unwrap_or(0);

    // Stable sort keeps pool order for full ties.
    ranked.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| pixels(&b.candidate).cmp(&pixels(&a.candidate)))
            .then_with(|| priority(&a.candidate.provider).cmp(&priority(&b.candidate.provider)))
    });
    ranked
}

/// The single best candidate, if any survive filtering.
pub fn select(
    pool: &[VideoCandidate],
    keywords: &[String],
    provider_order: &[String],
    min_duration: f64,
) -> Option<RankedCandidate> {
    rank(pool, keywords, provider_order, min_duration)
        .into_iter()
        .next()
}

/// Uniform-random pick of a music track at least `min_duration` long.
///
/// When no track is long enough, any track is picked and the planner loops it.
pub fn pick_music<R: Rng + ?Sized>(
    pool: &[MusicAsset],
    min_duration: f64,
    rng: &mut R,
) -> Option<MusicAsset> {
    let long_enough: Vec<&MusicAsset> = pool.iter().filter(|m| m.duration >= min_duration).collect();
    if long_enough.is_empty() {
        pool.choose(rng).cloned()
    } else {
        long_enough.choose(rng).map(|m| (*m).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Resolution;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::path::PathBuf;

    fn cand(provider: &str, id: &str, title: &str, tags: &[&str], res: Option<(u32, u32)>) -> VideoCandidate {
        VideoCandidate {
            id: id.into(),
            provider: provider.into(),
            title: title.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            duration: 12.0,
            resolution: res.map(|(w, h)| Resolution::new(w, h)),
            download_url: format!("https://example.com/{id}.mp4"),
        }
    }

    fn kws(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn order() -> Vec<String> {
        kws(&["pexels", "pixabay"])
    }

    #[test]
    fn test_score_is_stemmed_and_case_insensitive() {
        let c = cand("pexels", "1", "Octopus swimming", &["Heart", "ocean"], None);
        assert_eq!(score(&c, &kws(&["octopuses", "hearts", "three"])), 2);
    }

    #[test]
    fn test_highest_score_wins() {
        let pool = vec![
            cand("pexels", "1", "ocean waves", &[], Some((1080, 1920))),
            cand("pixabay", "2", "octopus", &["heart", "ocean"], Some((720, 1280))),
        ];
        let best = select(&pool, &kws(&["octopus", "hearts"]), &order(), 5.0).unwrap();
        assert_eq!(best.candidate.id, "2");
        assert_eq!(best.score, 2);
    }

    #[test]
    fn test_ties_prefer_resolution_then_provider_order() {
        let pool = vec![
            cand("pixabay", "a", "octopus", &[], Some((1080, 1920))),
            cand("pexels", "b", "octopus", &[], Some((720, 1280))),
            cand("pexels", "c", "octopus", &[], Some((1080, 1920))),
        ];
        let ranked = rank(&pool, &kws(&["octopus"]), &order(), 5.0);
        let ids: Vec<_> = ranked.iter().map(|r| r.candidate.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_duplicates_counted_once_and_short_clips_dropped() {
        let mut short = cand("pexels", "s", "octopus", &[], None);
        short.duration = 2.0;
        let pool = vec![
            cand("pexels", "1", "octopus", &[], None),
            cand("pexels", "1", "octopus", &[], None),
            cand("pixabay", "1", "octopus", &[], None),
            short,
        ];
        let ranked = rank(&pool, &kws(&["octopus"]), &order(), 5.0);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_empty_pool_selects_nothing() {
        assert!(select(&[], &kws(&["octopus"]), &order(), 5.0).is_none());
    }

    fn track(id: &str, duration: f64) -> MusicAsset {
        MusicAsset {
            id: id.into(),
            provider: "local".into(),
            local_path: PathBuf::from(format!("/music/{id}.mp3")),
            duration,
        }
    }

    #[test]
    fn test_pick_music_prefers_long_enough_tracks() {
        let pool = vec![track("short", 5.0), track("long", 120.0)];
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let pick = pick_music(&pool, 30.0, &mut rng).unwrap();
            assert_eq!(pick.id, "long");
        }
    }

    #[test]
    fn test_pick_music_falls_back_to_any_track() {
        let pool = vec![track("a", 5.0), track("b", 6.0)];
        let mut rng = StdRng::seed_from_u64(1);
        assert!(pick_music(&pool, 30.0, &mut rng).is_some());
        assert!(pick_music(&[], 30.0, &mut rng).is_none());
    }
}
