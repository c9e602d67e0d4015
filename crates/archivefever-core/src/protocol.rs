//! Observer protocol: JSON events pushed over the `/ws` socket
//!
//! Wire format:
//!
//! Server → Observer (event push):
//!   { "type": "new_thought", "data": { "thought": "...", "type": "concept_emergence", ... } }
//!   { "type": "research_request", "data": { "id": "...", "query": "Bergson duration", ... } }
//!
//! Observer → Server:
//!   { "type": "inject_question", "question": "What is time?" }

use crate::types::{CrystallizationKind, GeneratedThought, Identity, ResearchRequest, Thought};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Server → Observer
// ---------------------------------------------------------------------------

/// Event pushed to every connected observer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Backlog sent once when an observer connects.
    InitialStream(Vec<Thought>),
    NewThought(GeneratedThought),
    TextDiscovered(TextDiscoveredNotice),
    ResearchRequest(ResearchRequest),
    CrystallizationPublished(PublicationNotice),
    IdentityEvolved(Identity),
}

impl StreamEvent {
    /// Wire name of the event, as it appears in the `type` field.
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::InitialStream(_) => "initial_stream",
            StreamEvent::NewThought(_) => "new_thought",
            StreamEvent::TextDiscovered(_) => "text_discovered",
            StreamEvent::ResearchRequest(_) => "research_request",
            StreamEvent::CrystallizationPublished(_) => "crystallization_published",
            StreamEvent::IdentityEvolved(_) => "identity_evolved",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TextDiscoveredNotice {
    pub title: String,
    pub author: String,
    pub source: String,
    pub original_query: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicationNotice {
    pub title: String,
    #[serde(rename = "abstract")]
    pub summary: String,
    pub substack_url: String,
    #[serde(rename = "type")]
    pub kind: CrystallizationKind,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Observer → Server
// ---------------------------------------------------------------------------

/// Message an observer may send over the socket.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObserverMessage {
    InjectQuestion { question: String },
}

/// Context string handed to the generator for a human question.
pub fn question_context(question: &str) -> String {
    format!("Human question: {}", question.trim())
}
