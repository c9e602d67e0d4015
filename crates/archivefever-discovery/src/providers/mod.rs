//! Text search providers.
//!
//! Each provider is a self-contained module implementing `SearchProvider`.
//! `default_providers()` assembles the set used in production.

pub mod archive;
pub mod curated;
pub mod gutendex;

pub use archive::InternetArchiveSearch;
pub use curated::CuratedCatalog;
pub use gutendex::GutendexSearch;

use crate::error::DiscoveryResult;
use archivefever_core::TextCandidate;
use std::sync::Arc;

/// A catalogue that can be searched for candidate texts.
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str) -> DiscoveryResult<Vec<TextCandidate>>;
}

/// Gutendex, the Internet Archive and the curated catalogue.
pub fn default_providers(gutendex_url: &str, archive_url: &str) -> Vec<Arc<dyn SearchProvider>> {
    vec![
        Arc::new(GutendexSearch::new(gutendex_url)),
        Arc::new(InternetArchiveSearch::new(archive_url)),
        Arc::new(CuratedCatalog::new()),
    ]
}
