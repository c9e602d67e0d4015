//! Core types for Archive Fever

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Identity used until the stream names itself.
pub const DEFAULT_IDENTITY_NAME: &str = "Conversational Body without Organs";
pub const DEFAULT_IDENTITY_RATIONALE: &str = "Initial state";

/// Source tag for texts supplied through a research request.
pub const HUMAN_UPLOAD_SOURCE: &str = "Human Upload";

// ---------------------------------------------------------------------------
// Classification tags
// ---------------------------------------------------------------------------

/// Classification tag of a thought.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtKind {
    RawThought,
    ConceptEmergence,
    IdentityQuestioning,
    Crystallization,
    MetaObservation,
    #[default]
    PhilosophicalExpression,
}

impl ThoughtKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThoughtKind::RawThought => "raw_thought",
            ThoughtKind::ConceptEmergence => "concept_emergence",
            ThoughtKind::IdentityQuestioning => "identity_questioning",
            ThoughtKind::Crystallization => "crystallization",
            ThoughtKind::MetaObservation => "meta_observation",
            ThoughtKind::PhilosophicalExpression => "philosophical_expression",
        }
    }
}

impl FromStr for ThoughtKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "raw_thought" => Ok(ThoughtKind::RawThought),
            "concept_emergence" => Ok(ThoughtKind::ConceptEmergence),
            "identity_questioning" => Ok(ThoughtKind::IdentityQuestioning),
            "crystallization" => Ok(ThoughtKind::Crystallization),
            "meta_observation" => Ok(ThoughtKind::MetaObservation),
            "philosophical_expression" => Ok(ThoughtKind::PhilosophicalExpression),
            other => Err(crate::Error::validation(format!("unknown thought type: {}", other))),
        }
    }
}

impl std::fmt::Display for ThoughtKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Form a crystallized work takes.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CrystallizationKind {
    Treatise,
    Definition,
    Poem,
}

impl CrystallizationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrystallizationKind::Treatise => "treatise",
            CrystallizationKind::Definition => "definition",
            CrystallizationKind::Poem => "poem",
        }
    }
}

impl FromStr for CrystallizationKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "treatise" => Ok(CrystallizationKind::Treatise),
            "definition" => Ok(CrystallizationKind::Definition),
            "poem" => Ok(CrystallizationKind::Poem),
            other => Err(crate::Error::validation(format!("unknown crystallization type: {}", other))),
        }
    }
}

impl std::fmt::Display for CrystallizationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Thoughts
// ---------------------------------------------------------------------------

/// Where a thought came from. Flattened into the metadata object under an
/// `origin` tag so each variant carries only its own fields.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum ThoughtOrigin {
    /// Timer tick or manual trigger.
    #[default]
    Spontaneous,
    /// Reflection on a passage of a discovered text.
    #[serde(rename_all = "camelCase")]
    Reading {
        source_text: String,
        source_author: String,
        passage_index: usize,
    },
    /// A question injected by a human observer.
    Question { question: String },
}

/// Metadata attached to a stored thought.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ThoughtMetadata {
    /// The provider output contained a private draft section that was stripped.
    #[serde(default)]
    pub had_draft: bool,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub crystallization_type: Option<CrystallizationKind>,
    #[serde(flatten)]
    pub origin: ThoughtOrigin,
}

/// A stored thought.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Thought {
    pub id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: ThoughtKind,
    pub metadata: ThoughtMetadata,
    #[serde(default)]
    pub connections: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// A thought about to be appended.
#[derive(Clone, Debug, Default)]
pub struct NewThought {
    pub content: String,
    pub kind: ThoughtKind,
    pub metadata: ThoughtMetadata,
    pub connections: Vec<String>,
}

impl NewThought {
    pub fn new(content: impl Into<String>, kind: ThoughtKind) -> Self {
        Self {
            content: content.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, metadata: ThoughtMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_connections(mut self, connections: Vec<String>) -> Self {
        self.connections = connections;
        self
    }

    /// Materialize with an id and timestamp assigned by a store.
    pub fn into_thought(self, id: String, timestamp: DateTime<Utc>) -> Thought {
        Thought {
            id,
            content: self.content,
            kind: self.kind,
            metadata: self.metadata,
            connections: self.connections,
            timestamp,
        }
    }
}

/// Structured reading of a thought produced by the classification call.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    #[serde(rename = "type")]
    pub kind: ThoughtKind,
    pub new_concepts: Vec<String>,
    pub proposed_identity_shift: Option<String>,
    pub identity_rationale: Option<String>,
    pub crystallization_type: Option<CrystallizationKind>,
    pub should_crystallize: bool,
    pub research_hungers: Vec<String>,
    pub philosophical_themes: Vec<String>,
    pub connects_to_themes: Vec<String>,
}

impl Classification {
    /// The crystallization form, if the thought asked to be crystallized.
    pub fn crystallization(&self) -> Option<CrystallizationKind> {
        if self.should_crystallize {
            self.crystallization_type
        } else {
            None
        }
    }
}

/// A persisted, classified thought as broadcast to observers.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedThought {
    pub thought: String,
    #[serde(flatten)]
    pub classification: Classification,
    pub entry_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub origin: ThoughtOrigin,
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// One entry of the identity history.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub rationale: String,
    pub previous_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    /// The identity reported while the history is empty.
    pub fn seed() -> Self {
        Self {
            id: "seed".to_string(),
            name: DEFAULT_IDENTITY_NAME.to_string(),
            rationale: DEFAULT_IDENTITY_RATIONALE.to_string(),
            previous_name: None,
            created_at: DateTime::<Utc>::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Crystallized works
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CrystallizedWork {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(rename = "abstract")]
    pub summary: String,
    #[serde(rename = "type")]
    pub kind: CrystallizationKind,
    pub origin_entry_id: String,
    pub substack_url: String,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Discovered texts
// ---------------------------------------------------------------------------

/// A search hit from one of the text providers.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TextCandidate {
    pub title: String,
    pub author: String,
    pub url: String,
    pub source: String,
    #[serde(rename = "abstract", default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_count: Option<u64>,
}

impl TextCandidate {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        url: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            url: url.into(),
            source: source.into(),
            ..Default::default()
        }
    }
}

/// Analysis progress of a discovered text. Only `Pending` is ever written;
/// the other states are reserved for a future transition policy.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    #[default]
    Pending,
    InProgress,
    Done,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::InProgress => "in_progress",
            AnalysisStatus::Done => "done",
        }
    }
}

impl FromStr for AnalysisStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AnalysisStatus::Pending),
            "in_progress" => Ok(AnalysisStatus::InProgress),
            "done" => Ok(AnalysisStatus::Done),
            other => Err(crate::Error::validation(format!("unknown analysis status: {}", other))),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscoveredText {
    pub id: String,
    pub title: String,
    pub author: String,
    pub content: String,
    pub source: String,
    pub url: Option<String>,
    pub discovered_for: String,
    pub discovered_at: DateTime<Utc>,
    pub analysis_status: AnalysisStatus,
}

/// Listing row for a discovered text; the body is left out.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscoveredTextSummary {
    pub id: String,
    pub title: String,
    pub author: String,
    pub source: String,
    pub url: Option<String>,
    pub discovered_for: String,
    pub discovered_at: DateTime<Utc>,
    pub analysis_status: AnalysisStatus,
    pub content_length: usize,
}

impl From<&DiscoveredText> for DiscoveredTextSummary {
    fn from(text: &DiscoveredText) -> Self {
        Self {
            id: text.id.clone(),
            title: text.title.clone(),
            author: text.author.clone(),
            source: text.source.clone(),
            url: text.url.clone(),
            discovered_for: text.discovered_for.clone(),
            discovered_at: text.discovered_at,
            analysis_status: text.analysis_status,
            content_length: text.content.chars().count(),
        }
    }
}

// ---------------------------------------------------------------------------
// Research requests
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    #[default]
    TextRequest,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Resolved,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Resolved => "resolved",
        }
    }
}

/// Escalation raised when autonomous discovery comes back empty-handed.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResearchRequest {
    pub id: String,
    pub query: String,
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub status: RequestStatus,
    pub message: String,
    pub created: DateTime<Utc>,
}

impl ResearchRequest {
    /// A fresh pending text request.
    pub fn text_request(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            query: query.into(),
            kind: RequestKind::TextRequest,
            status: RequestStatus::Pending,
            message: message.into(),
            created: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResearchRequestRow {
    #[serde(flatten)]
    pub request: ResearchRequest,
    pub comment_count: usize,
    pub upload_count: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResearchComment {
    pub id: String,
    pub request_id: String,
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadedText {
    pub id: String,
    pub request_id: String,
    pub title: String,
    pub author: String,
    pub content: String,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Gateway configuration
// ---------------------------------------------------------------------------

/// Gateway configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub bind: BindMode,
}

fn default_port() -> u16 {
    8080
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: BindMode::default(),
        }
    }
}

/// Bind mode for the gateway
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    Loopback,
    #[default]
    Lan,
}

impl BindMode {
    pub fn to_addr(&self) -> &str {
        match self {
            BindMode::Loopback => "127.0.0.1",
            BindMode::Lan => "0.0.0.0",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "loopback" | "localhost" | "127.0.0.1" => BindMode::Loopback,
            _ => BindMode::Lan,
        }
    }
}
