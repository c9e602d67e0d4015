//! Research desk: human replies to research requests.
//!
//! An upload is a two-step protocol. The upload row is written first and
//! decides success; the discovered-text row and passage scheduling follow
//! and only log on failure.

use archivefever_core::{Error, Result, TextCandidate, HUMAN_UPLOAD_SOURCE};
use archivefever_discovery::TextDiscovery;
use archivefever_store::{NewUpload, Store};
use std::sync::Arc;
use tracing::{error, info};

pub struct ResearchDesk {
    store: Arc<dyn Store>,
    discovery: Arc<TextDiscovery>,
}

impl ResearchDesk {
    pub fn new(store: Arc<dyn Store>, discovery: Arc<TextDiscovery>) -> Self {
        Self { store, discovery }
    }

    pub async fn comment(&self, request_id: &str, author: Option<&str>, content: &str) -> Result<String> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::validation("content is required"));
        }
        let id = self.store.append_comment(request_id, author, content).await?;
        info!("Comment {} added to request {}", id, request_id);
        Ok(id)
    }

    /// Store the upload, then register it as a discovered text and schedule
    /// its passages. Returns the upload id.
    pub async fn upload(&self, request_id: &str, upload: NewUpload) -> Result<String> {
        if upload.title.trim().is_empty() {
            return Err(Error::validation("title is required"));
        }
        if upload.content.trim().is_empty() {
            return Err(Error::validation("content is required"));
        }

        let upload_id = self.store.append_upload(request_id, &upload).await?;
        info!("Upload {:?} stored for request {}", upload.title, request_id);

        let candidate = TextCandidate::new(upload.title.trim(), upload.author(), "", HUMAN_UPLOAD_SOURCE);
        match self
            .store
            .append_discovered_text(&candidate, &upload.content, request_id)
            .await
        {
            Ok(text_id) => {
                self.discovery
                    .schedule_passage_analysis(&text_id, &candidate, &upload.content);
            }
            Err(e) => error!("Upload {} stored but not registered as a text: {}", upload_id, e),
        }
        Ok(upload_id)
    }
}
