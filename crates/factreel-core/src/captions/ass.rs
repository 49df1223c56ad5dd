//! ASS (Advanced SubStation Alpha) rendering for burned-in captions.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::domain::CaptionEvent;

const STYLE_NAME: &str = "Caption";

/// Visual style of the burned-in captions. Colours use ASS `&HAABBGGRR` notation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SubtitleStyle {
    pub font_name: String,
    pub font_size: u32,
    /// Fill of words already spoken (karaoke) or of the whole line.
    pub primary_colour: String,
    /// Fill of words not yet spoken.
    pub secondary_colour: String,
    pub outline_colour: String,
    pub back_colour: String,
    pub bold: bool,
    pub outline: u32,
    pub shadow: u32,
    /// Numpad-style alignment (2 = bottom centre).
    pub alignment: u8,
    pub margin_h: u32,
    pub margin_v: u32,
    pub uppercase: bool,
    /// Emit `\k` tags so emphasis advances word by word.
    pub karaoke: bool,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_name: "Arial".into(),
            font_size: 72,
            primary_colour: "&H0000FFFF".into(),
            secondary_colour: "&H00FFFFFF".into(),
            outline_colour: "&H00000000".into(),
            back_colour: "&H00000000".into(),
            bold: true,
            outline: 2,
            shadow: 0,
            alignment: 2,
            margin_h: 60,
            margin_v: 150,
            uppercase: true,
            karaoke: true,
        }
    }
}

fn secs_to_cs(secs: f64) -> i64 {
    (secs * 100.0).round() as i64
}

/// Centiseconds to `h:mm:ss.cc`.
fn cs_to_ass(cs: i64) -> String {
    let total = cs.max(0);
    let h = total / 360_000;
    let m = (total % 360_000) / 6_000;
    let s = (total % 6_000) / 100;
    let c = total % 100;
    format!("{h}:{m:02}:{s:02}.{c:02}")
}

/// Strip characters that ASS would read as override blocks.
fn sanitize(text: &str, uppercase: bool) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| match c {
            '{' => '(',
            '}' => ')',
            '\\' => '/',
            '\n' | '\r' => ' ',
            other => other,
        })
        .collect();
    if uppercase {
        cleaned.to_uppercase()
    } else {
        cleaned
    }
}

fn dialogue_text(event: &CaptionEvent, style: &SubtitleStyle) -> String {
    if !style.karaoke || event.highlights.is_empty() {
        return sanitize(&event.text, style.uppercase);
    }
    let mut out = String::new();
    for (i, span) in event.highlights.iter().enumerate() {
        let Some(word) = event.text.get(span.char_start..span.char_end) else {
            continue;
        };
        let k = (secs_to_cs(span.end) - secs_to_cs(span.start)).max(0);
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{{\\k{k}}}{}", sanitize(word, style.uppercase));
    }
    out
}

/// Render caption events as a complete ASS document sized to the output frame.
pub fn render_ass(events: &[CaptionEvent], style: &SubtitleStyle, width: u32, height: u32) -> String {
    let bold = if style.bold { -1 } else { 0 };
    let mut doc = String::new();
    let _ = write!(
        doc,
        "[Script Info]\n\
         ScriptType: v4.00+\n\
         PlayResX: {width}\n\
         PlayResY: {height}\n\
         ScaledBorderAndShadow: yes\n\
         \n\
         [V4+ Styles]\n\
         Format: Name,Fontname,Fontsize,PrimaryColour,SecondaryColour,OutlineColour,BackColour,Bold,Italic,Underline,StrikeOut,ScaleX,ScaleY,Spacing,Angle,BorderStyle,Outline,Shadow,Alignment,MarginL,MarginR,MarginV,Encoding\n\
         Style: {STYLE_NAME},{font},{size},{pri},{sec},{out},{back},{bold},0,0,0,100,100,0,0,1,{ow},{sh},{al},{mh},{mh},{mv},1\n\
         \n\
         [Events]\n\
         Format: Layer,Start,End,Style,Name,MarginL,MarginR,MarginV,Effect,Text\n",
        font = style.font_name,
        size = style.font_size,
        pri = style.primary_colour,
        sec = style.secondary_colour,
        out = style.outline_colour,
        back = style.back_colour,
        ow = style.outline,
        sh = style.shadow,
        al = style.alignment,
        mh = style.margin_h,
        mv = style.margin_v,
    );

    for event in events {
        let _ = writeln!(
            doc,
            "Dialogue: 0,{},{},{STYLE_NAME},,0,0,0,,{}",
            cs_to_ass(secs_to_cs(event.start)),
            cs_to_ass(secs_to_cs(event.end)),
            dialogue_text(event, style),
        );
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HighlightSpan;

    fn event() -> CaptionEvent {
        CaptionEvent {
            text: "three {big} hearts".into(),
            start: 61.5,
            end: 62.5,
            highlights: vec![
                HighlightSpan {
                    word_index: 0,
                    char_start: 0,
                    char_end: 5,
                    start: 61.5,
                    end: 61.8,
                },
                HighlightSpan {
                    word_index: 1,
                    char_start: 6,
                    char_end: 11,
                    start: 61.8,
                    end: 62.1,
                },
                HighlightSpan {
                    word_index: 2,
                    char_start: 12,
                    char_end: 18,
                    start: 62.1,
                    end: 62.5,
                },
            ],
        }
    }

    #[test]
    fn test_time_format() {
        assert_eq!(cs_to_ass(0), "0:00:00.00");
        assert_eq!(cs_to_ass(6_150), "0:01:01.50");
        assert_eq!(cs_to_ass(360_001), "1:00:00.01");
        assert_eq!(cs_to_ass(-5), "0:00:00.00");
    }

    #[test]
    fn test_karaoke_dialogue() {
        let doc = render_ass(&[event()], &SubtitleStyle::default(), 1080, 1920);
        assert!(doc.contains("PlayResX: 1080"));
        assert!(doc.contains("PlayResY: 1920"));
        assert!(doc.contains("Style: Caption,Arial,72,&H0000FFFF"));
        assert!(doc.contains(
            "Dialogue: 0,0:01:01.50,0:01:02.50,Caption,,0,0,0,,{\\k30}THREE {\\k30}(BIG) {\\k40}HEARTS"
        ));
    }

    #[test]
    fn test_static_dialogue_without_karaoke() {
        let style = SubtitleStyle {
            karaoke: false,
            uppercase: false,
            ..SubtitleStyle::default()
        };
        let doc = render_ass(&[event()], &style, 720, 1280);
        assert!(doc.contains(",,three (big) hearts\n"));
    }
}
