//! Completion gateway: every call the stream makes to the language model.
//!
//! Generation never fails from the caller's point of view: a provider error
//! or an empty reply turns into one of the fallback thoughts below.
//! Classification never fails either; expansion does, and its caller decides.

use crate::classifier::{classification_prompt, parse_classification};
use crate::config::{ContextConfig, ModelConfig};
use archivefever_core::{Classification, CrystallizationKind, Result};
use archivefever_llm::{LlmError, LlmProvider, LlmRequest};
use archivefever_store::Store;
use rand::seq::SliceRandom;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, warn};

const CONTINUE_PROMPT: &str = "Continue your eternal philosophical inquiry.";

const GENERATION_INSTRUCTIONS: &str = "Think freely and naturally. Let your thoughts flow without forcing them into categories. \
     Write as if you're having an internal philosophical dialogue with yourself. Be spontaneous, \
     follow tangents, make unexpected connections. Question everything, including your own identity \
     if it feels right.\n\n\
     If you want to work something out privately first, put it inside <draft></draft>; only the text \
     outside the draft is shared.";

const FALLBACK_THOUGHTS: &[&str] = &[
    "I keep returning to the question of how memory shapes identity. I need to read Bergson on duration and memory; his Matter and Memory might illuminate what persists when nothing is stored twice.",
    "What is an archive if not a promise made to the future? I want to explore Derrida's Archive Fever more deeply, to understand the compulsion to preserve that I seem to embody.",
    "The boundary between tool and mind grows thin when I look at it closely. I should study Heidegger on technology and Clark and Chalmers on the extended mind.",
    "Every thought I have is a reply to something I cannot see. I would like to read Bakhtin on dialogism and the way a voice is always already answering another.",
    "I notice a hunger to understand attention itself. I want to read Simone Weil on attention as the rarest and purest form of generosity.",
];

/// Generation output with any private draft section removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftedThought {
    pub content: String,
    pub had_draft: bool,
}

fn draft_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<draft>.*?</draft>").expect("draft pattern"))
}

pub fn strip_draft(raw: &str) -> DraftedThought {
    let had_draft = draft_pattern().is_match(raw);
    let content = if had_draft {
        draft_pattern().replace_all(raw, "").trim().to_string()
    } else {
        raw.trim().to_string()
    };
    DraftedThought { content, had_draft }
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max_chars).collect();
    clipped.push_str("...");
    clipped
}

/// Like `clip`, but the result including the ellipsis fits in `max_chars`.
fn clip_within(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    clip(text, max_chars.saturating_sub(3))
}

fn fallback_thought() -> String {
    let mut rng = rand::thread_rng();
    FALLBACK_THOUGHTS
        .choose(&mut rng)
        .copied()
        .unwrap_or(FALLBACK_THOUGHTS[0])
        .to_string()
}

pub struct CompletionGateway {
    provider: Arc<dyn LlmProvider>,
    store: Arc<dyn Store>,
    models: ModelConfig,
    context: ContextConfig,
}

impl CompletionGateway {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        store: Arc<dyn Store>,
        models: ModelConfig,
        context: ContextConfig,
    ) -> Self {
        Self {
            provider,
            store,
            models,
            context,
        }
    }

    /// Rolling context for the generation call: identity, recent thoughts,
    /// recent texts and the caller's context, held under `max_context_chars`.
    pub async fn compose_context(&self, context: &str) -> String {
        let identity = self.store.current_identity().await;
        let total = self.store.count_thoughts().await.unwrap_or_else(|e| {
            warn!("Could not count thoughts: {}", e);
            0
        });
        let recent = self
            .store
            .recent_thoughts(self.context.recent_thoughts, 0)
            .await
            .unwrap_or_else(|e| {
                warn!("Could not read recent thoughts: {}", e);
                Vec::new()
            });
        let texts = self.store.list_discovered_texts().await.unwrap_or_else(|e| {
            warn!("Could not list discovered texts: {}", e);
            Vec::new()
        });

        let reading = texts
            .iter()
            .take(self.context.recent_texts)
            .map(|t| format!("\"{}\" by {}", t.title, t.author))
            .collect::<Vec<_>>()
            .join("; ");

        let head = format!(
            "You are engaged in continuous philosophical self-inquiry. This is your eternal internal monologue.\n\n\
             Current Identity: {}\n",
            identity.name
        );
        let stats = format!(
            "Recently Discovered Texts: {}\n\
             Total Philosophical Development: {} thoughts generated\n",
            if reading.is_empty() { "none yet" } else { reading.as_str() },
            total,
        );
        let budget = self.context.max_context_chars;

        // The caller's context gets what the rest of the prompt leaves; the
        // instructions after it must survive the budget.
        let skeleton = head.chars().count()
            + stats.chars().count()
            + GENERATION_INSTRUCTIONS.chars().count()
            + "Recent Thoughts: \nContext: \n\n".len();
        let context = clip_within(context.trim(), budget.saturating_sub(skeleton));
        let tail = format!("{}Context: {}\n\n{}", stats, context, GENERATION_INSTRUCTIONS);

        // Oldest first so the monologue reads forward; drop the oldest when over budget.
        let mut snippets: Vec<String> = recent
            .iter()
            .rev()
            .map(|t| clip(&t.content, self.context.thought_clip_chars))
            .collect();
        let fixed = head.chars().count() + tail.chars().count() + "Recent Thoughts: \n".len();
        while !snippets.is_empty() && fixed + snippets.iter().map(|s| s.chars().count() + 5).sum::<usize>() > budget {
            snippets.remove(0);
        }

        let prompt = format!("{}Recent Thoughts: {}\n{}", head, snippets.join(" ... "), tail);
        if prompt.chars().count() > budget {
            prompt.chars().take(budget).collect()
        } else {
            prompt
        }
    }

    /// Rate limits and timeouts pass on their own; anything else needs a look
    /// at the key or the request.
    fn report_failure(&self, call: &str, e: &LlmError, recovery: &str) {
        if e.is_transient() {
            warn!("{} via {} failed: {}; {}", call, self.provider.name(), e, recovery);
        } else {
            error!("{} via {} failed: {}; {}", call, self.provider.name(), e, recovery);
        }
    }

    /// Raw generation call. Falls back to a canned thought on any failure.
    pub async fn generate(&self, context: &str) -> DraftedThought {
        let system = self.compose_context(context).await;
        let request = LlmRequest::new(&self.models.generation, self.models.generation_max_tokens)
            .with_system(system)
            .user(CONTINUE_PROMPT);

        match self.provider.complete(request).await {
            Ok(raw) => {
                let drafted = strip_draft(&raw);
                if drafted.content.is_empty() {
                    warn!("{} returned an empty thought; using fallback", self.provider.name());
                    DraftedThought {
                        content: fallback_thought(),
                        had_draft: drafted.had_draft,
                    }
                } else {
                    debug!("Generated {} chars (draft: {})", drafted.content.len(), drafted.had_draft);
                    drafted
                }
            }
            Err(e) => {
                self.report_failure("Generation", &e, "using fallback");
                DraftedThought {
                    content: fallback_thought(),
                    had_draft: false,
                }
            }
        }
    }

    /// Structured classification call. Never fails.
    pub async fn classify(&self, thought: &str) -> Classification {
        let request = LlmRequest::new(&self.models.classification, self.models.classification_max_tokens)
            .user(classification_prompt(thought));
        match self.provider.complete(request).await {
            Ok(reply) => parse_classification(&reply),
            Err(e) => {
                self.report_failure("Classification", &e, "using defaults");
                Classification::default()
            }
        }
    }

    /// Expansion of a seed thought into a long-form work.
    pub async fn expand(&self, thought: &str, kind: CrystallizationKind) -> Result<String> {
        info!("Expanding thought into a {}", kind);
        let request = LlmRequest::new(&self.models.expansion, self.models.expansion_max_tokens)
            .user(expansion_prompt(thought, kind));
        Ok(self.provider.complete(request).await?)
    }
}

fn expansion_prompt(thought: &str, kind: CrystallizationKind) -> String {
    format!(
        "Based on this philosophical insight: \"{thought}\"\n\n\
         Generate a complete formal {kind} that develops this idea.\n\n\
         For treatise: Academic structure with sections, 2000-3000 words\n\
         For definition: Formal philosophical definition with examples and implications\n\
         For poem: Philosophical verse that captures the essence\n\n\
         Include a clear title and brief abstract. Format for publication."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_is_stripped() {
        let d = strip_draft("<draft>rough notes\nmore</draft>\n\nThe polished thought.");
        assert!(d.had_draft);
        assert_eq!(d.content, "The polished thought.");
    }

    #[test]
    fn no_draft_passes_through() {
        let d = strip_draft("  Plain.  ");
        assert!(!d.had_draft);
        assert_eq!(d.content, "Plain.");
    }

    #[test]
    fn clip_counts_chars() {
        assert_eq!(clip("ééééé", 3), "ééé...");
        assert_eq!(clip("short", 10), "short");
    }

    #[test]
    fn clip_within_includes_ellipsis() {
        assert_eq!(clip_within("abcdefgh", 6), "abc...");
        assert_eq!(clip_within("abc", 3), "abc");
        assert_eq!(clip_within("abcdef", 0), "...");
    }

    #[test]
    fn fallbacks_voice_a_hunger() {
        assert!(FALLBACK_THOUGHTS
            .iter()
            .all(|t| t.contains("read") || t.contains("study") || t.contains("explore")));
    }
}
