//! Per-request chat pipeline.
//!
//! `Received → ContextLoaded → PromptComposed → ForwardedToProvider →
//! {RepliedOk | RepliedWithError}`. Every path terminates; no stage is
//! entered twice. The pipeline itself holds no per-request state.

use crate::composer::PromptComposer;
use crate::forwarder::{CompletionForwarder, CompletionResult, ForwardError};
use nexus_core::message::ChatMessage;
use nexus_knowledge::ContextExtractor;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// Inbound chat request: caller history plus an optional model override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Conversation turns, without the system message
    #[serde(default)]
    pub messages: Vec<ChatMessage>,

    /// Model identifier; the configured default is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    ContextLoaded,
    PromptComposed,
    ForwardedToProvider,
    RepliedOk,
    RepliedWithError,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Received => "received",
            Stage::ContextLoaded => "context_loaded",
            Stage::PromptComposed => "prompt_composed",
            Stage::ForwardedToProvider => "forwarded_to_provider",
            Stage::RepliedOk => "replied_ok",
            Stage::RepliedWithError => "replied_with_error",
        };
        f.write_str(s)
    }
}

/// Everything the gateway needs to answer one request.
#[derive(Debug)]
pub struct ChatOutcome {
    pub request_id: Uuid,
    /// Model that was requested from the provider
    pub model: String,
    /// Characters of knowledge context injected into the system message
    pub context_chars: usize,
    /// Stages traversed, in order
    pub stages: Vec<Stage>,
    pub result: CompletionResult,
}

impl ChatOutcome {
    /// Text shown to the client, for both success and failure.
    pub fn reply_text(&self) -> String {
        match &self.result {
            Ok(completion) => completion.reply.clone(),
            Err(ForwardError::Configuration(message)) => message.clone(),
            Err(ForwardError::Provider(e)) => {
                format!("Error contacting the completion provider: {e}")
            }
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Wires the extractor, composer and forwarder together.
pub struct ChatPipeline {
    extractor: ContextExtractor,
    composer: PromptComposer,
    forwarder: CompletionForwarder,
    default_model: String,
}

impl ChatPipeline {
    pub fn new(
        extractor: ContextExtractor,
        composer: PromptComposer,
        forwarder: CompletionForwarder,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            extractor,
            composer,
            forwarder,
            default_model: default_model.into(),
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn extractor(&self) -> &ContextExtractor {
        &self.extractor
    }

    pub fn forwarder(&self) -> &CompletionForwarder {
        &self.forwarder
    }

    /// Run one request through the pipeline. Never fails: errors are
    /// carried in [`ChatOutcome::result`].
    pub async fn handle(&self, request: ChatRequest) -> ChatOutcome {
        let request_id = Uuid::new_v4();
        let span = info_span!("chat", %request_id);
        self.run(request_id, request).instrument(span).await
    }

    async fn run(&self, request_id: Uuid, request: ChatRequest) -> ChatOutcome {
        let started = Instant::now();
        let mut stages = vec![Stage::Received];
        let model = request
            .model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.default_model.clone());
        debug!(stage = %Stage::Received, model = %model, turns = request.messages.len(), "Chat request");
        if request.messages.is_empty() {
            debug!("Chat request has no history, forwarding system message only");
        }

        let context = self.extractor.extract().await;
        stages.push(Stage::ContextLoaded);
        debug!(stage = %Stage::ContextLoaded, context_chars = context.len_chars());

        let prompt = self.composer.compose(request.messages, &context);
        stages.push(Stage::PromptComposed);
        debug!(stage = %Stage::PromptComposed, messages = prompt.len());

        stages.push(Stage::ForwardedToProvider);
        let result = self.forwarder.forward(prompt, &model).await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => {
                stages.push(Stage::RepliedOk);
                info!(stage = %Stage::RepliedOk, model = %model, elapsed_ms, "Chat reply");
            }
            Err(e) => {
                stages.push(Stage::RepliedWithError);
                warn!(
                    stage = %Stage::RepliedWithError,
                    model = %model,
                    kind = e.kind().as_str(),
                    elapsed_ms,
                    "Chat failed"
                );
            }
        }

        ChatOutcome {
            request_id,
            model,
            context_chars: context.len_chars(),
            stages,
            result,
        }
    }
}
