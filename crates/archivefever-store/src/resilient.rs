//! Degraded-mode wrapper around a durable backend.
//!
//! Thought appends never fail: when the durable backend rejects a write the
//! thought lands in a bounded in-memory ring buffer instead and the store
//! enters degraded mode, during which thought reads are served from that
//! buffer. The next successful durable append leaves degraded mode. All other
//! operations pass straight through.

use crate::error::StoreResult;
use crate::store::{new_id, next_timestamp, NewCrystallizedWork, NewUpload, Store};
use archivefever_core::{
    CrystallizedWork, DiscoveredTextSummary, Identity, NewThought, ResearchRequest,
    ResearchRequestRow, TextCandidate, Thought,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

struct ThoughtCache {
    thoughts: VecDeque<Thought>,
    capacity: usize,
    last_ts: DateTime<Utc>,
}

impl ThoughtCache {
    fn push(&mut self, id: String, thought: NewThought) {
        let ts = next_timestamp(&mut self.last_ts);
        if self.thoughts.len() >= self.capacity {
            self.thoughts.pop_front();
        }
        self.thoughts.push_back(thought.into_thought(id, ts));
    }

    fn recent(&self, limit: usize, offset: usize) -> Vec<Thought> {
        self.thoughts.iter().rev().skip(offset).take(limit).cloned().collect()
    }
}

pub struct ResilientStore {
    durable: Arc<dyn Store>,
    cache: Mutex<ThoughtCache>,
    degraded: AtomicBool,
}

impl ResilientStore {
    pub fn new(durable: Arc<dyn Store>) -> Self {
        Self::with_capacity(durable, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(durable: Arc<dyn Store>, capacity: usize) -> Self {
        Self {
            durable,
            cache: Mutex::new(ThoughtCache {
                thoughts: VecDeque::with_capacity(capacity.min(DEFAULT_CACHE_CAPACITY)),
                capacity: capacity.max(1),
                last_ts: DateTime::<Utc>::default(),
            }),
            degraded: AtomicBool::new(false),
        }
    }

    /// True while thought reads are served from the in-memory buffer.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    pub async fn cached_len(&self) -> usize {
        self.cache.lock().await.thoughts.len()
    }
}

#[async_trait]
impl Store for ResilientStore {
    fn name(&self) -> &str {
        self.durable.name()
    }

    async fn append_thought(&self, thought: NewThought) -> StoreResult<String> {
        // Durable write and cache update happen under one lock so the
        // buffer order matches append order.
        let mut cache = self.cache.lock().await;
        match self.durable.append_thought(thought.clone()).await {
            Ok(id) => {
                if self.degraded.swap(false, Ordering::SeqCst) {
                    info!("Durable store recovered; leaving degraded mode");
                }
                cache.push(id.clone(), thought);
                Ok(id)
            }
            Err(e) => {
                if !self.degraded.swap(true, Ordering::SeqCst) {
                    error!("Durable thought append failed, entering degraded mode: {}", e);
                } else {
                    warn!("Durable thought append failed again: {}", e);
                }
                let id = new_id();
                cache.push(id.clone(), thought);
                Ok(id)
            }
        }
    }

    async fn recent_thoughts(&self, limit: usize, offset: usize) -> StoreResult<Vec<Thought>> {
        if !self.is_degraded() {
            match self.durable.recent_thoughts(limit, offset).await {
                Ok(thoughts) => return Ok(thoughts),
                Err(e) => warn!("Durable thought read failed, serving cache: {}", e),
            }
        }
        Ok(self.cache.lock().await.recent(limit, offset))
    }

    async fn count_thoughts(&self) -> StoreResult<usize> {
        if !self.is_degraded() {
            match self.durable.count_thoughts().await {
                Ok(n) => return Ok(n),
                Err(e) => warn!("Durable thought count failed, serving cache: {}", e),
            }
        }
        Ok(self.cache.lock().await.thoughts.len())
    }

    async fn current_identity(&self) -> Identity {
        self.durable.current_identity().await
    }

    async fn append_identity(
        &self,
        name: &str,
        rationale: &str,
        previous_name: Option<&str>,
    ) -> StoreResult<String> {
        self.durable.append_identity(name, rationale, previous_name).await
    }

    async fn identity_history(&self) -> StoreResult<Vec<Identity>> {
        self.durable.identity_history().await
    }

    async fn append_crystallized_work(&self, work: NewCrystallizedWork) -> StoreResult<String> {
        self.durable.append_crystallized_work(work).await
    }

    async fn crystallized_works(&self) -> StoreResult<Vec<CrystallizedWork>> {
        self.durable.crystallized_works().await
    }

    async fn append_discovered_text(
        &self,
        candidate: &TextCandidate,
        content: &str,
        context: &str,
    ) -> StoreResult<String> {
        self.durable.append_discovered_text(candidate, content, context).await
    }

    async fn list_discovered_texts(&self) -> StoreResult<Vec<DiscoveredTextSummary>> {
        self.durable.list_discovered_texts().await
    }

    async fn append_research_request(&self, request: &ResearchRequest) -> StoreResult<String> {
        self.durable.append_research_request(request).await
    }

    async fn list_research_requests_with_counts(&self) -> StoreResult<Vec<ResearchRequestRow>> {
        self.durable.list_research_requests_with_counts().await
    }

    async fn append_comment(
        &self,
        request_id: &str,
        author: Option<&str>,
        content: &str,
    ) -> StoreResult<String> {
        self.durable.append_comment(request_id, author, content).await
    }

    async fn append_upload(&self, request_id: &str, upload: &NewUpload) -> StoreResult<String> {
        self.durable.append_upload(request_id, upload).await
    }
}
