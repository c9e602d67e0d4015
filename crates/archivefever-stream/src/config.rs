//! Archive Fever configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup,
//! falls back to defaults if no config file exists. Secrets come from the
//! environment only and are never written back out.

use archivefever_core::BindMode;
use archivefever_discovery::DiscoveryConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub server: ServerConfig,
    pub models: ModelConfig,
    pub scheduler: SchedulerConfig,
    pub context: ContextConfig,
    pub discovery: DiscoverySettings,
    pub publication: PublicationConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub bind: BindMode,
    /// Thoughts sent to an observer when it connects.
    pub initial_stream_len: usize,
    /// Broadcast buffer per observer before it starts dropping events.
    pub broadcast_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub api_url: String,
    pub generation: String,
    pub classification: String,
    pub expansion: String,
    pub generation_max_tokens: u32,
    pub classification_max_tokens: u32,
    pub expansion_max_tokens: u32,
    /// Per-call completion budget in seconds.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub min_interval_secs: u64,
    pub max_interval_secs: u64,
    /// Delay before the timer starts after boot.
    pub startup_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Recent thoughts quoted back to the generator.
    pub recent_thoughts: usize,
    /// Recently discovered texts named in the prompt.
    pub recent_texts: usize,
    /// Upper bound on the composed system prompt.
    pub max_context_chars: usize,
    /// Each recent thought is clipped to this many characters.
    pub thought_clip_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    pub gutendex_url: String,
    pub archive_url: String,
    pub provider_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub max_attempts: usize,
    pub min_text_chars: usize,
    pub passages_per_text: usize,
    pub passage_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicationConfig {
    /// Base URL of the publication; works link to `<url>/p/<slug>`.
    pub publication_url: String,
    pub smtp_host: String,
    pub smtp_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `sqlite` or `memory`.
    pub backend: String,
    pub database_path: PathBuf,
    /// Thoughts kept in memory while the database is unavailable.
    pub cache_capacity: usize,
}

// ============================================================
// Defaults
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind: BindMode::Lan,
            initial_stream_len: 200,
            broadcast_capacity: 1024,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com/v1/messages".into(),
            generation: "claude-sonnet-4-20250514".into(),
            classification: "claude-sonnet-4-20250514".into(),
            expansion: "claude-sonnet-4-20250514".into(),
            generation_max_tokens: 2_000,
            classification_max_tokens: 600,
            expansion_max_tokens: 4_000,
            timeout_secs: 30,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval_secs: 45,
            max_interval_secs: 180,
            startup_delay_secs: 5,
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            recent_thoughts: 20,
            recent_texts: 5,
            max_context_chars: 6_000,
            thought_clip_chars: 400,
        }
    }
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            gutendex_url: "https://gutendex.com".into(),
            archive_url: "https://archive.org".into(),
            provider_timeout_secs: 15,
            fetch_timeout_secs: 15,
            max_attempts: 3,
            min_text_chars: 500,
            passages_per_text: 3,
            passage_interval_secs: 300,
        }
    }
}

impl Default for PublicationConfig {
    fn default() -> Self {
        Self {
            publication_url: "https://yourpublication.substack.com".into(),
            smtp_host: "smtp.gmail.com".into(),
            smtp_port: 465,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".into(),
            database_path: PathBuf::from("archivefever.db"),
            cache_capacity: 1_000,
        }
    }
}

impl ArchiveConfig {
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}; using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Overlay non-secret environment settings.
    pub fn apply_env(&mut self, secrets: &Secrets) {
        if let Some(url) = &secrets.substack_url {
            self.publication.publication_url = url.clone();
        }
    }

    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            provider_timeout: Duration::from_secs(self.discovery.provider_timeout_secs),
            max_attempts: self.discovery.max_attempts.max(1),
            min_text_chars: self.discovery.min_text_chars,
            passages_per_text: self.discovery.passages_per_text,
            passage_interval: Duration::from_secs(self.discovery.passage_interval_secs),
        }
    }
}

impl SchedulerConfig {
    /// The jitter range, with the bounds put in order.
    pub fn interval_range(&self) -> (Duration, Duration) {
        let lo = self.min_interval_secs.min(self.max_interval_secs);
        let hi = self.min_interval_secs.max(self.max_interval_secs);
        (Duration::from_secs(lo), Duration::from_secs(hi))
    }
}

/// Credentials read from the environment.
#[derive(Clone, Default)]
pub struct Secrets {
    pub anthropic_api_key: Option<String>,
    pub email_user: Option<String>,
    pub email_app_password: Option<String>,
    pub substack_email: Option<String>,
    pub substack_url: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("anthropic_api_key", &self.anthropic_api_key.as_ref().map(|_| "<set>"))
            .field("email_user", &self.email_user)
            .field("email_app_password", &self.email_app_password.as_ref().map(|_| "<set>"))
            .field("substack_email", &self.substack_email)
            .field("substack_url", &self.substack_url)
            .finish()
    }
}

impl Secrets {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            email_user: get("EMAIL_USER"),
            email_app_password: get("EMAIL_APP_PASSWORD"),
            substack_email: get("SUBSTACK_EMAIL"),
            substack_url: get("SUBSTACK_URL"),
        }
    }

    /// Everything the email channel needs, if all of it is present.
    pub fn email_credentials(&self) -> Option<(&str, &str, &str)> {
        Some((
            self.email_user.as_deref()?,
            self.email_app_password.as_deref()?,
            self.substack_email.as_deref()?,
        ))
    }
}
