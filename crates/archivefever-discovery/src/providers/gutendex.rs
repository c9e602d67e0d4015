//! Project Gutenberg search through the Gutendex catalogue API

use super::SearchProvider;
use crate::error::{DiscoveryError, DiscoveryResult};
use archivefever_core::TextCandidate;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

pub const GUTENDEX_URL: &str = "https://gutendex.com";
const SOURCE: &str = "Project Gutenberg";
const MAX_RESULTS: usize = 5;

pub struct GutendexSearch {
    client: Client,
    base_url: String,
}

impl GutendexSearch {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Deserialize)]
struct GutendexPage {
    #[serde(default)]
    results: Vec<GutendexBook>,
}

#[derive(Deserialize)]
struct GutendexBook {
    title: String,
    #[serde(default)]
    authors: Vec<GutendexPerson>,
    #[serde(default)]
    formats: HashMap<String, String>,
    #[serde(default)]
    download_count: Option<u64>,
}

#[derive(Deserialize)]
struct GutendexPerson {
    name: String,
    #[serde(default)]
    death_year: Option<i32>,
}

impl GutendexBook {
    /// Plain-text rendition, preferring UTF-8.
    fn text_url(&self) -> Option<&str> {
        let mut plain: Vec<(&String, &String)> = self
            .formats
            .iter()
            .filter(|(mime, url)| mime.starts_with("text/plain") && !url.ends_with(".zip"))
            .collect();
        plain.sort_by_key(|(mime, _)| !mime.contains("utf-8"));
        plain.into_iter().next().map(|(_, url)| url.as_str())
    }

    fn into_candidate(self) -> Option<TextCandidate> {
        let url = self.text_url()?.to_string();
        let author = self.authors.first();
        Some(TextCandidate {
            title: self.title.clone(),
            author: author.map(|a| a.name.clone()).unwrap_or_else(|| "Unknown Author".into()),
            url,
            source: SOURCE.to_string(),
            summary: None,
            year: author.and_then(|a| a.death_year),
            citation_count: self.download_count,
        })
    }
}

#[async_trait::async_trait]
impl SearchProvider for GutendexSearch {
    fn name(&self) -> &str {
        "gutendex"
    }

    async fn search(&self, query: &str) -> DiscoveryResult<Vec<TextCandidate>> {
        let url = format!("{}/books", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("search", query)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(DiscoveryError::Status {
                url,
                status: response.status().as_u16(),
            });
        }
        let page: GutendexPage = response
            .json()
            .await
            .map_err(|e| DiscoveryError::Parse(e.to_string()))?;

        let candidates: Vec<TextCandidate> = page
            .results
            .into_iter()
            .filter_map(GutendexBook::into_candidate)
            .take(MAX_RESULTS)
            .collect();
        debug!("Gutendex: {} candidates for {:?}", candidates.len(), query);
        Ok(candidates)
    }
}
