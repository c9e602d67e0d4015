//! Archive Fever Discovery - research-hunger driven text search, ingestion
//! and delayed passage reading

pub mod engine;
pub mod error;
pub mod fetch;
pub mod providers;
pub mod queue;
pub mod text;

pub use engine::{rank_candidates, research_request_message, DiscoveryConfig, DiscoveryOutcome, TextDiscovery};
pub use error::{DiscoveryError, DiscoveryResult};
pub use fetch::{Fetcher, HttpFetcher};
pub use providers::{default_providers, CuratedCatalog, GutendexSearch, InternetArchiveSearch, SearchProvider};
pub use queue::{PassageReader, PassageReading, ReadingQueue, ReadingWorker};
pub use text::{clean_text, extract_passages};
