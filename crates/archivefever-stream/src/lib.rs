//! Archive Fever Stream - the thought lifecycle: generation, classification,
//! reactions, crystallization, scheduling and the research desk

pub mod classifier;
pub mod config;
pub mod crystallize;
pub mod dispatcher;
pub mod engine;
pub mod gateway;
pub mod publication;
pub mod research;
pub mod scheduler;

pub use classifier::{classification_prompt, parse_classification};
pub use config::{ArchiveConfig, Secrets};
pub use crystallize::{parse_expanded_work, slugify, Crystallizer};
pub use dispatcher::ReactionDispatcher;
pub use engine::ThoughtEngine;
pub use gateway::{strip_draft, CompletionGateway, DraftedThought};
pub use publication::{publication_email, DisabledPublisher, EmailPublisher, PublishError, Publisher};
pub use research::ResearchDesk;
pub use scheduler::{Scheduler, ThoughtCycle, TOPICS};
