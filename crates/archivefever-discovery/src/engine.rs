//! Text discovery engine: research hungers in, ingested texts or research
//! requests out.

use crate::fetch::Fetcher;
use crate::providers::SearchProvider;
use crate::queue::{PassageReading, ReadingQueue};
use crate::text::{clean_text, extract_passages};
use archivefever_core::{
    Broadcaster, ResearchRequest, Result, StreamEvent, TextCandidate, TextDiscoveredNotice,
};
use archivefever_store::Store;
use dashmap::DashSet;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Clone, Debug)]
pub struct DiscoveryConfig {
    /// Per-provider search budget; a provider that overruns counts as empty.
    pub provider_timeout: Duration,
    /// Downloads tried per query before escalating.
    pub max_attempts: usize,
    /// Cleaned texts shorter than this are rejected.
    pub min_text_chars: usize,
    pub passages_per_text: usize,
    pub passage_interval: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(15),
            max_attempts: 3,
            min_text_chars: 500,
            passages_per_text: 3,
            passage_interval: Duration::from_secs(300),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    Ingested { text_id: String },
    Escalated { request_id: String },
}

/// Drop unusable results, dedup by URL (first wins) and rank by
/// citation count, then year, both descending. Ties keep input order.
pub fn rank_candidates(results: Vec<TextCandidate>) -> Vec<TextCandidate> {
    let mut seen = HashSet::new();
    let mut ranked: Vec<TextCandidate> = results
        .into_iter()
        .filter(|c| !c.url.trim().is_empty() && !c.title.trim().is_empty())
        .filter(|c| seen.insert(c.url.clone()))
        .collect();
    ranked.sort_by(|a, b| {
        b.citation_count
            .unwrap_or(0)
            .cmp(&a.citation_count.unwrap_or(0))
            .then(b.year.unwrap_or(i32::MIN).cmp(&a.year.unwrap_or(i32::MIN)))
    });
    ranked
}

/// Message shown to humans when a query could not be satisfied.
pub fn research_request_message(query: &str, inaccessible: &[String]) -> String {
    let mut message = format!(
        "I'm deeply curious about \"{}\" but couldn't find suitable texts automatically. \
         Could someone help me access relevant philosophical works on this topic?",
        query
    );
    if !inaccessible.is_empty() {
        message.push_str(&format!(
            " I found these but couldn't access them: {}.",
            inaccessible.join("; ")
        ));
    }
    message
}

/// Removes a hunger from the in-flight set when its search ends.
struct InFlight<'a> {
    set: &'a DashSet<String>,
    key: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.key);
    }
}

pub struct TextDiscovery {
    providers: Vec<Arc<dyn SearchProvider>>,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn Store>,
    broadcaster: Broadcaster,
    readings: ReadingQueue,
    config: DiscoveryConfig,
    in_flight: DashSet<String>,
}

impl TextDiscovery {
    pub fn new(
        providers: Vec<Arc<dyn SearchProvider>>,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn Store>,
        broadcaster: Broadcaster,
        readings: ReadingQueue,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            providers,
            fetcher,
            store,
            broadcaster,
            readings,
            config,
            in_flight: DashSet::new(),
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Search every hunger concurrently. A hunger whose search is already
    /// running (compared case-insensitively) is skipped. Outcomes are
    /// returned for the hungers that ran and succeeded in either ingesting or
    /// escalating; failures are logged.
    pub async fn process_hungers(&self, hungers: &[String]) -> Vec<DiscoveryOutcome> {
        let mut claimed = Vec::new();
        for hunger in hungers {
            let key = hunger.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            if !self.in_flight.insert(key.clone()) {
                debug!("Search for {:?} already in flight; skipping", hunger);
                continue;
            }
            claimed.push((
                hunger.trim(),
                InFlight {
                    set: &self.in_flight,
                    key,
                },
            ));
        }
        if claimed.is_empty() {
            return Vec::new();
        }

        let queries: Vec<&str> = claimed.iter().map(|(q, _)| *q).collect();
        info!("Research hungers: {}", queries.join(", "));

        let results = join_all(queries.iter().map(|query| self.search_for_texts(query))).await;
        drop(claimed);

        results
            .into_iter()
            .zip(queries)
            .filter_map(|(result, query)| match result {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    error!("Discovery for {:?} failed: {}", query, e);
                    None
                }
            })
            .collect()
    }

    async fn search_provider(&self, provider: &Arc<dyn SearchProvider>, query: &str) -> Vec<TextCandidate> {
        match tokio::time::timeout(self.config.provider_timeout, provider.search(query)).await {
            Ok(Ok(results)) => results,
            Ok(Err(e)) => {
                warn!("{} search for {:?} failed: {}", provider.name(), query, e);
                Vec::new()
            }
            Err(_) => {
                warn!("{} search for {:?} timed out", provider.name(), query);
                Vec::new()
            }
        }
    }

    /// Search all providers, try the best few candidates, and escalate to a
    /// research request when none can be ingested.
    pub async fn search_for_texts(&self, query: &str) -> Result<DiscoveryOutcome> {
        info!("Searching for texts: {:?}", query);
        let results = join_all(self.providers.iter().map(|p| self.search_provider(p, query))).await;
        let ranked = rank_candidates(results.into_iter().flatten().collect());
        info!("Found {} candidate texts for {:?}", ranked.len(), query);

        let mut inaccessible = Vec::new();
        for candidate in ranked.iter().take(self.config.max_attempts) {
            match self.ingest(candidate, query).await {
                Some(text_id) => return Ok(DiscoveryOutcome::Ingested { text_id }),
                None => inaccessible.push(candidate.title.clone()),
            }
        }

        let request = ResearchRequest::text_request(query, research_request_message(query, &inaccessible));
        let request_id = self.store.append_research_request(&request).await?;
        info!("Escalated {:?} to research request {}", query, request_id);
        self.broadcaster.publish(StreamEvent::ResearchRequest(request));
        Ok(DiscoveryOutcome::Escalated { request_id })
    }

    /// Fetch, clean, persist and schedule one candidate. False on any failure.
    pub async fn download_and_ingest(&self, candidate: &TextCandidate, query: &str) -> bool {
        self.ingest(candidate, query).await.is_some()
    }

    async fn ingest(&self, candidate: &TextCandidate, query: &str) -> Option<String> {
        info!("Downloading {:?} from {}", candidate.title, candidate.source);
        let raw = match self.fetcher.fetch(&candidate.url).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Download of {:?} failed: {}", candidate.title, e);
                return None;
            }
        };

        let content = clean_text(&raw);
        let length = content.chars().count();
        if length < self.config.min_text_chars {
            warn!(
                "Rejected {:?}: {} chars after cleaning (minimum {})",
                candidate.title, length, self.config.min_text_chars
            );
            return None;
        }

        let text_id = match self.store.append_discovered_text(candidate, &content, query).await {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to store {:?}: {}", candidate.title, e);
                return None;
            }
        };

        self.broadcaster.publish(StreamEvent::TextDiscovered(TextDiscoveredNotice {
            title: candidate.title.clone(),
            author: candidate.author.clone(),
            source: candidate.source.clone(),
            original_query: query.to_string(),
            status: "processing".to_string(),
        }));
        self.schedule_passage_analysis(&text_id, candidate, &content);
        Some(text_id)
    }

    /// Enqueue the first few passages of a text, spaced by the passage
    /// interval starting immediately. Returns how many were scheduled.
    pub fn schedule_passage_analysis(&self, text_id: &str, candidate: &TextCandidate, content: &str) -> usize {
        let passages = extract_passages(content);
        let mut scheduled = 0;
        for (index, passage) in passages.into_iter().take(self.config.passages_per_text).enumerate() {
            let reading = PassageReading {
                text_id: text_id.to_string(),
                title: candidate.title.clone(),
                author: candidate.author.clone(),
                passage,
                index,
            };
            if self.readings.enqueue_after(self.config.passage_interval * index as u32, reading) {
                scheduled += 1;
            }
        }
        info!("Scheduled {} passages of {:?} for reading", scheduled, candidate.title);
        scheduled
    }
}
