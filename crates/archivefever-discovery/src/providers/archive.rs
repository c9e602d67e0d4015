//! Internet Archive advanced search over the `texts` collection

use super::SearchProvider;
use crate::error::{DiscoveryError, DiscoveryResult};
use archivefever_core::TextCandidate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

pub const ARCHIVE_URL: &str = "https://archive.org";
const SOURCE: &str = "Internet Archive";

pub struct InternetArchiveSearch {
    client: Client,
    base_url: String,
}

impl InternetArchiveSearch {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn stream_url(&self, identifier: &str) -> String {
        format!("{}/stream/{}/{}_djvu.txt", self.base_url, identifier, identifier)
    }
}

#[derive(Deserialize)]
struct SearchEnvelope {
    response: Option<SearchResponse>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<ArchiveDoc>,
}

#[derive(Deserialize)]
struct ArchiveDoc {
    identifier: String,
    #[serde(default)]
    title: Option<Value>,
    #[serde(default)]
    creator: Option<Value>,
    #[serde(default)]
    year: Option<Value>,
}

/// Archive fields arrive as a string, a number or a list of either.
fn first_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.iter().find_map(first_string),
        _ => None,
    }
}

#[async_trait::async_trait]
impl SearchProvider for InternetArchiveSearch {
    fn name(&self) -> &str {
        "internet_archive"
    }

    async fn search(&self, query: &str) -> DiscoveryResult<Vec<TextCandidate>> {
        let url = format!("{}/advancedsearch.php", self.base_url);
        let q = format!("title:({}) AND mediatype:texts", query);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", q.as_str()),
                ("fl[]", "identifier"),
                ("fl[]", "title"),
                ("fl[]", "creator"),
                ("fl[]", "year"),
                ("rows", "5"),
                ("page", "1"),
                ("output", "json"),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(DiscoveryError::Status {
                url,
                status: response.status().as_u16(),
            });
        }
        let envelope: SearchEnvelope = response
            .json()
            .await
            .map_err(|e| DiscoveryError::Parse(e.to_string()))?;

        let docs = envelope.response.map(|r| r.docs).unwrap_or_default();
        let candidates: Vec<TextCandidate> = docs
            .into_iter()
            .map(|doc| TextCandidate {
                title: doc.title.as_ref().and_then(first_string).unwrap_or_else(|| "Unknown Title".into()),
                author: doc.creator.as_ref().and_then(first_string).unwrap_or_else(|| "Unknown Author".into()),
                url: self.stream_url(&doc.identifier),
                source: SOURCE.to_string(),
                summary: None,
                year: doc.year.as_ref().and_then(first_string).and_then(|y| y.parse().ok()),
                citation_count: None,
            })
            .collect();
        debug!("Internet Archive: {} candidates for {:?}", candidates.len(), query);
        Ok(candidates)
    }
}
