//! Reaction dispatcher: fans a classified thought out into its side effects.
//!
//! Branches run in a fixed order (hungers, crystallization, identity) and
//! are independent: a failing branch is logged and the next one still runs.
//! Nothing is rolled back.

use crate::crystallize::Crystallizer;
use archivefever_core::{Broadcaster, GeneratedThought, Identity, Result, StreamEvent};
use archivefever_discovery::TextDiscovery;
use archivefever_store::Store;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info};

pub struct ReactionDispatcher {
    discovery: Arc<TextDiscovery>,
    crystallizer: Crystallizer,
    store: Arc<dyn Store>,
    broadcaster: Broadcaster,
}

impl ReactionDispatcher {
    pub fn new(
        discovery: Arc<TextDiscovery>,
        crystallizer: Crystallizer,
        store: Arc<dyn Store>,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            discovery,
            crystallizer,
            store,
            broadcaster,
        }
    }

    pub async fn react(&self, thought: &GeneratedThought) {
        let classification = &thought.classification;

        if !classification.research_hungers.is_empty() {
            let outcomes = self.discovery.process_hungers(&classification.research_hungers).await;
            debug!("{} hungers resolved for {}", outcomes.len(), thought.entry_id);
        }

        if let Some(kind) = classification.crystallization() {
            if let Err(e) = self.crystallizer.crystallize(&thought.thought, kind, &thought.entry_id).await {
                error!("Crystallization of {} failed: {}", thought.entry_id, e);
            }
        }

        if let Some(name) = &classification.proposed_identity_shift {
            let rationale = classification.identity_rationale.as_deref().unwrap_or_default();
            if let Err(e) = self.evolve_identity(name, rationale).await {
                error!("Identity evolution to {:?} failed: {}", name, e);
            }
        }
    }

    /// Append a new identity on top of the current one. A shift to the name
    /// already held is a no-op and returns the current identity.
    pub async fn evolve_identity(&self, name: &str, rationale: &str) -> Result<Identity> {
        let current = self.store.current_identity().await;
        if current.name == name {
            debug!("Identity shift to current name {:?} ignored", name);
            return Ok(current);
        }

        let id = self.store.append_identity(name, rationale, Some(&current.name)).await?;
        let identity = Identity {
            id,
            name: name.to_string(),
            rationale: rationale.to_string(),
            previous_name: Some(current.name.clone()),
            created_at: Utc::now(),
        };
        info!("Identity evolved: {} -> {}", current.name, identity.name);
        self.broadcaster.publish(StreamEvent::IdentityEvolved(identity.clone()));
        Ok(identity)
    }
}
