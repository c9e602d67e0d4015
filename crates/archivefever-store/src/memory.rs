//! In-process backend. Nothing survives a restart.

use crate::error::{StoreError, StoreResult};
use crate::store::{new_id, next_timestamp, non_blank, NewCrystallizedWork, NewUpload, Store, DEFAULT_COMMENT_AUTHOR};
use archivefever_core::{
    AnalysisStatus, CrystallizedWork, DiscoveredText, DiscoveredTextSummary, Identity, NewThought,
    ResearchComment, ResearchRequest, ResearchRequestRow, TextCandidate, Thought, UploadedText,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct Inner {
    thoughts: Vec<Thought>,
    identities: Vec<Identity>,
    works: Vec<CrystallizedWork>,
    texts: Vec<DiscoveredText>,
    requests: Vec<ResearchRequest>,
    comments: Vec<ResearchComment>,
    uploads: Vec<UploadedText>,
    last_ts: DateTime<Utc>,
}

impl Inner {
    fn has_request(&self, request_id: &str) -> bool {
        self.requests.iter().any(|r| r.id == request_id)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full discovered text by id, including its body.
    pub async fn discovered_text(&self, id: &str) -> Option<DiscoveredText> {
        self.inner.read().await.texts.iter().find(|t| t.id == id).cloned()
    }

    pub async fn comments_for(&self, request_id: &str) -> Vec<ResearchComment> {
        let inner = self.inner.read().await;
        inner.comments.iter().filter(|c| c.request_id == request_id).cloned().collect()
    }
}

fn newest_first<T: Clone>(items: &[T]) -> Vec<T> {
    items.iter().rev().cloned().collect()
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn append_thought(&self, thought: NewThought) -> StoreResult<String> {
        let mut inner = self.inner.write().await;
        let id = new_id();
        let ts = next_timestamp(&mut inner.last_ts);
        inner.thoughts.push(thought.into_thought(id.clone(), ts));
        debug!("Appended thought {} ({} total)", id, inner.thoughts.len());
        Ok(id)
    }

    async fn recent_thoughts(&self, limit: usize, offset: usize) -> StoreResult<Vec<Thought>> {
        let inner = self.inner.read().await;
        Ok(inner.thoughts.iter().rev().skip(offset).take(limit).cloned().collect())
    }

    async fn count_thoughts(&self) -> StoreResult<usize> {
        Ok(self.inner.read().await.thoughts.len())
    }

    async fn current_identity(&self) -> Identity {
        self.inner
            .read()
            .await
            .identities
            .last()
            .cloned()
            .unwrap_or_else(Identity::seed)
    }

    async fn append_identity(
        &self,
        name: &str,
        rationale: &str,
        previous_name: Option<&str>,
    ) -> StoreResult<String> {
        let mut inner = self.inner.write().await;
        let id = new_id();
        let created_at = next_timestamp(&mut inner.last_ts);
        inner.identities.push(Identity {
            id: id.clone(),
            name: name.to_string(),
            rationale: rationale.to_string(),
            previous_name: previous_name.map(str::to_string),
            created_at,
        });
        Ok(id)
    }

    async fn identity_history(&self) -> StoreResult<Vec<Identity>> {
        Ok(newest_first(&self.inner.read().await.identities))
    }

    async fn append_crystallized_work(&self, work: NewCrystallizedWork) -> StoreResult<String> {
        let mut inner = self.inner.write().await;
        let id = new_id();
        let ts = next_timestamp(&mut inner.last_ts);
        inner.works.push(work.into_work(id.clone(), ts));
        Ok(id)
    }

    async fn crystallized_works(&self) -> StoreResult<Vec<CrystallizedWork>> {
        Ok(newest_first(&self.inner.read().await.works))
    }

    async fn append_discovered_text(
        &self,
        candidate: &TextCandidate,
        content: &str,
        context: &str,
    ) -> StoreResult<String> {
        let mut inner = self.inner.write().await;
        let id = new_id();
        let discovered_at = next_timestamp(&mut inner.last_ts);
        inner.texts.push(DiscoveredText {
            id: id.clone(),
            title: candidate.title.clone(),
            author: candidate.author.clone(),
            content: content.to_string(),
            source: candidate.source.clone(),
            url: non_blank(Some(candidate.url.as_str())).map(str::to_string),
            discovered_for: context.to_string(),
            discovered_at,
            analysis_status: AnalysisStatus::Pending,
        });
        Ok(id)
    }

    async fn list_discovered_texts(&self) -> StoreResult<Vec<DiscoveredTextSummary>> {
        let inner = self.inner.read().await;
        Ok(inner.texts.iter().rev().map(DiscoveredTextSummary::from).collect())
    }

    async fn append_research_request(&self, request: &ResearchRequest) -> StoreResult<String> {
        let mut inner = self.inner.write().await;
        inner.requests.push(request.clone());
        Ok(request.id.clone())
    }

    async fn list_research_requests_with_counts(&self) -> StoreResult<Vec<ResearchRequestRow>> {
        let inner = self.inner.read().await;
        Ok(inner
            .requests
            .iter()
            .rev()
            .map(|request| ResearchRequestRow {
                request: request.clone(),
                comment_count: inner.comments.iter().filter(|c| c.request_id == request.id).count(),
                upload_count: inner.uploads.iter().filter(|u| u.request_id == request.id).count(),
            })
            .collect())
    }

    async fn append_comment(
        &self,
        request_id: &str,
        author: Option<&str>,
        content: &str,
    ) -> StoreResult<String> {
        let mut inner = self.inner.write().await;
        if !inner.has_request(request_id) {
            return Err(StoreError::NotFound(format!("research request {}", request_id)));
        }
        let id = new_id();
        let created_at = next_timestamp(&mut inner.last_ts);
        inner.comments.push(ResearchComment {
            id: id.clone(),
            request_id: request_id.to_string(),
            author_name: non_blank(author).unwrap_or(DEFAULT_COMMENT_AUTHOR).to_string(),
            content: content.to_string(),
            created_at,
        });
        Ok(id)
    }

    async fn append_upload(&self, request_id: &str, upload: &NewUpload) -> StoreResult<String> {
        let mut inner = self.inner.write().await;
        if !inner.has_request(request_id) {
            return Err(StoreError::NotFound(format!("research request {}", request_id)));
        }
        let id = new_id();
        let uploaded_at = next_timestamp(&mut inner.last_ts);
        inner.uploads.push(UploadedText {
            id: id.clone(),
            request_id: request_id.to_string(),
            title: upload.title.clone(),
            author: upload.author().to_string(),
            content: upload.content.clone(),
            uploaded_by: upload.uploader().to_string(),
            uploaded_at,
        });
        Ok(id)
    }
}
