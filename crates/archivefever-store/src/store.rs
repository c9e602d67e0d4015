//! The `Store` trait shared by every backend

use crate::error::StoreResult;
use archivefever_core::{
    CrystallizationKind, CrystallizedWork, DiscoveredTextSummary, Identity, NewThought,
    ResearchRequest, ResearchRequestRow, TextCandidate, Thought,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub const DEFAULT_COMMENT_AUTHOR: &str = "Anonymous";
pub const DEFAULT_UPLOAD_AUTHOR: &str = "Unknown";

/// A crystallized work before the store assigns its id and timestamp.
#[derive(Clone, Debug)]
pub struct NewCrystallizedWork {
    pub title: String,
    pub content: String,
    pub summary: String,
    pub kind: CrystallizationKind,
    pub origin_entry_id: String,
    pub substack_url: String,
}

impl NewCrystallizedWork {
    pub fn into_work(self, id: String, timestamp: DateTime<Utc>) -> CrystallizedWork {
        CrystallizedWork {
            id,
            title: self.title,
            content: self.content,
            summary: self.summary,
            kind: self.kind,
            origin_entry_id: self.origin_entry_id,
            substack_url: self.substack_url,
            timestamp,
        }
    }
}

/// A human-supplied text attached to a research request.
#[derive(Clone, Debug, Default)]
pub struct NewUpload {
    pub title: String,
    pub author: Option<String>,
    pub content: String,
    pub uploaded_by: Option<String>,
}

impl NewUpload {
    pub fn author(&self) -> &str {
        non_blank(self.author.as_deref()).unwrap_or(DEFAULT_UPLOAD_AUTHOR)
    }

    pub fn uploader(&self) -> &str {
        non_blank(self.uploaded_by.as_deref()).unwrap_or(DEFAULT_COMMENT_AUTHOR)
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Next append timestamp: never earlier than the previous one.
pub(crate) fn next_timestamp(last: &mut DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > *last {
        *last = now;
    }
    *last
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Append-only persistence. Reads are newest-first.
#[async_trait]
pub trait Store: Send + Sync {
    fn name(&self) -> &str;

    // Thoughts
    async fn append_thought(&self, thought: NewThought) -> StoreResult<String>;
    async fn recent_thoughts(&self, limit: usize, offset: usize) -> StoreResult<Vec<Thought>>;
    async fn count_thoughts(&self) -> StoreResult<usize>;

    // Identity
    /// The most recently appended identity, or the seed. Never fails.
    async fn current_identity(&self) -> Identity;
    async fn append_identity(
        &self,
        name: &str,
        rationale: &str,
        previous_name: Option<&str>,
    ) -> StoreResult<String>;
    async fn identity_history(&self) -> StoreResult<Vec<Identity>>;

    // Crystallized works
    async fn append_crystallized_work(&self, work: NewCrystallizedWork) -> StoreResult<String>;
    async fn crystallized_works(&self) -> StoreResult<Vec<CrystallizedWork>>;

    // Discovered texts
    async fn append_discovered_text(
        &self,
        candidate: &TextCandidate,
        content: &str,
        context: &str,
    ) -> StoreResult<String>;
    async fn list_discovered_texts(&self) -> StoreResult<Vec<DiscoveredTextSummary>>;

    // Research requests
    async fn append_research_request(&self, request: &ResearchRequest) -> StoreResult<String>;
    async fn list_research_requests_with_counts(&self) -> StoreResult<Vec<ResearchRequestRow>>;
    /// Fails with `NotFound` for an unknown request.
    async fn append_comment(
        &self,
        request_id: &str,
        author: Option<&str>,
        content: &str,
    ) -> StoreResult<String>;
    /// Records the upload only; turning it into a discovered text is the caller's job.
    async fn append_upload(&self, request_id: &str, upload: &NewUpload) -> StoreResult<String>;
}
