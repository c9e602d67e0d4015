//! ThoughtEngine: one generation cycle end to end.
//!
//! generate → classify → persist → broadcast, then react. The thought is in
//! the store before any reaction starts.

use crate::dispatcher::ReactionDispatcher;
use crate::gateway::CompletionGateway;
use crate::scheduler::ThoughtCycle;
use archivefever_core::{
    Broadcaster, GeneratedThought, NewThought, Result, StreamEvent, ThoughtMetadata, ThoughtOrigin,
};
use archivefever_discovery::{PassageReader, PassageReading};
use archivefever_store::Store;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

pub struct ThoughtEngine {
    gateway: Arc<CompletionGateway>,
    store: Arc<dyn Store>,
    broadcaster: Broadcaster,
    dispatcher: ReactionDispatcher,
}

impl ThoughtEngine {
    pub fn new(
        gateway: Arc<CompletionGateway>,
        store: Arc<dyn Store>,
        broadcaster: Broadcaster,
        dispatcher: ReactionDispatcher,
    ) -> Self {
        Self {
            gateway,
            store,
            broadcaster,
            dispatcher,
        }
    }

    /// Generate, classify, persist and broadcast one thought. Reactions are
    /// left to the caller (`react`), so a request can answer before they run.
    pub async fn generate_thought(&self, context: &str, origin: ThoughtOrigin) -> Result<GeneratedThought> {
        let drafted = self.gateway.generate(context).await;
        let classification = self.gateway.classify(&drafted.content).await;

        let metadata = ThoughtMetadata {
            had_draft: drafted.had_draft,
            themes: classification.philosophical_themes.clone(),
            crystallization_type: classification.crystallization(),
            origin: origin.clone(),
        };
        let new_thought = NewThought::new(drafted.content.clone(), classification.kind)
            .with_metadata(metadata)
            .with_connections(classification.connects_to_themes.clone());
        let entry_id = self.store.append_thought(new_thought).await?;

        let generated = GeneratedThought {
            thought: drafted.content,
            classification,
            entry_id,
            timestamp: Utc::now(),
            origin,
        };
        info!("New thought {} ({})", generated.entry_id, generated.classification.kind);
        self.broadcaster.publish(StreamEvent::NewThought(generated.clone()));
        Ok(generated)
    }

    pub async fn react(&self, thought: &GeneratedThought) {
        self.dispatcher.react(thought).await;
    }

    /// One full cycle. Failures are logged here and never escape.
    pub async fn run_cycle(&self, context: &str, origin: ThoughtOrigin) -> Option<GeneratedThought> {
        match self.generate_thought(context, origin).await {
            Ok(thought) => {
                self.react(&thought).await;
                Some(thought)
            }
            Err(e) => {
                error!("Thought cycle failed: {}", e);
                None
            }
        }
    }
}

/// Context handed to the generator when reading a passage.
pub fn reading_context(reading: &PassageReading) -> String {
    format!(
        "Reading from \"{}\" by {}: \"{}\"",
        reading.title, reading.author, reading.passage
    )
}

#[async_trait]
impl PassageReader for ThoughtEngine {
    async fn read_passage(&self, reading: PassageReading) {
        info!("Reading passage {} of {:?}", reading.index, reading.title);
        let context = reading_context(&reading);
        let origin = ThoughtOrigin::Reading {
            source_text: reading.title,
            source_author: reading.author,
            passage_index: reading.index,
        };
        self.run_cycle(&context, origin).await;
    }
}

#[async_trait]
impl ThoughtCycle for ThoughtEngine {
    async fn think(&self, context: String, origin: ThoughtOrigin) {
        self.run_cycle(&context, origin).await;
    }
}
