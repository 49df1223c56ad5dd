//! Fact sources: the API-Ninjas facts endpoint and a local rotating pool.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use factreel_core::domain::{Fact, ProviderError};
use factreel_core::providers::{FactProvider, Provider, ProviderResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::http::{classify_error, read_json};

pub const API_NINJAS_FACTS_URL: &str = "https://api.api-ninjas.com/v1/facts";

/// Facts used when no pool file or list is configured.
const BUILTIN_FACTS: &[&str] = &[
    "Octopuses have three hearts and blue blood.",
    "Honey never spoils; edible honey has been found in ancient Egyptian tombs.",
    "A day on Venus is longer than a year on Venus.",
    "Bananas are berries, but strawberries are not.",
    "Sharks existed before trees did.",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiNinjasSettings {
    pub url: String,
}

impl Default for ApiNinjasSettings {
    fn default() -> Self {
        Self {
            url: API_NINJAS_FACTS_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiNinjasFact {
    fact: String,
}

/// Random facts from `GET /v1/facts` with an `X-Api-Key` header.
pub struct ApiNinjasFacts {
    client: reqwest::Client,
    settings: ApiNinjasSettings,
    api_key: String,
}

impl ApiNinjasFacts {
    pub fn new(client: reqwest::Client, settings: ApiNinjasSettings, api_key: String) -> Self {
        Self {
            client,
            settings,
            api_key,
        }
    }
}

#[async_trait]
impl Provider for ApiNinjasFacts {
    fn name(&self) -> &str {
        "api_ninjas"
    }

    async fn probe(&self) -> ProviderResult<()> {
        self.fetch().await.map(|_| ())
    }
}

#[async_trait]
impl FactProvider for ApiNinjasFacts {
    async fn fetch(&self) -> ProviderResult<Fact> {
        let response = self
            .client
            .get(&self.settings.url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| classify_error(&e))?;
        let facts: Vec<ApiNinjasFact> = read_json(response).await?;
        let first = facts
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::permanent("API-Ninjas returned no facts"))?;
        info!(provider = "api_ninjas", chars = first.fact.len(), "fact fetched");
        Ok(Fact::new(first.fact, "general", "api_ninjas"))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StaticFactsSettings {
    /// Newline-separated facts; blank lines and `#` comments are skipped.
    pub file: Option<std::path::PathBuf>,
    /// Inline facts, used when no file is given.
    pub facts: Vec<String>,
}

/// A fixed pool served round-robin.
pub struct StaticFacts {
    facts: Vec<String>,
    next: AtomicUsize,
}

impl StaticFacts {
    pub fn new(facts: Vec<String>) -> Self {
        Self {
            facts,
            next: AtomicUsize::new(0),
        }
    }

    /// Build from settings. Falls back to the built-in pool when nothing is
    /// configured.
    pub fn from_settings(settings: &StaticFactsSettings) -> std::io::Result<Self> {
        let facts = match &settings.file {
            Some(path) => read_pool(path)?,
            None if !settings.facts.is_empty() => settings.facts.clone(),
            None => BUILTIN_FACTS.iter().map(|f| f.to_string()).collect(),
        };
        Ok(Self::new(facts))
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

fn read_pool(path: &Path) -> std::io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

#[async_trait]
impl Provider for StaticFacts {
    fn name(&self) -> &str {
        "static"
    }

    async fn probe(&self) -> ProviderResult<()> {
        if self.facts.is_empty() {
            return Err(ProviderError::permanent("static fact pool is empty"));
        }
        Ok(())
    }
}

#[async_trait]
impl FactProvider for StaticFacts {
    async fn fetch(&self) -> ProviderResult<Fact> {
        if self.facts.is_empty() {
            return Err(ProviderError::permanent("static fact pool is empty"));
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.facts.len();
        Ok(Fact::new(
            self.facts[index].clone(),
            "general",
            format!("static-{index}"),
        ))
    }
}
