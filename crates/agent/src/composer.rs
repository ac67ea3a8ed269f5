//! Prompt composition: persona preamble + knowledge context + caller history.

use nexus_core::message::{ChatMessage, Role};
use nexus_knowledge::ContextDocument;

/// Built-in persona used when no override is configured.
pub const PERSONA_PREAMBLE: &str = concat!(
    "You are NEXUS, an advanced AI agent living on a private VPS.\n",
    "You have full access to a development environment (workspace).\n",
    "Your mission is to build apps, scripts and automations as requested.\n",
);

/// Header separating the knowledge excerpt from the preamble.
pub const CONTEXT_HEADER: &str = "--- KNOWLEDGE BASE RULES ---";

/// The exact message sequence sent to the provider.
///
/// Always starts with one system message; the caller's history follows
/// unchanged. Only [`PromptComposer`] can build one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
    messages: Vec<ChatMessage>,
}

impl ComposedPrompt {
    /// The leading system message.
    pub fn system(&self) -> &ChatMessage {
        &self.messages[0]
    }

    /// The caller-supplied turns, in order.
    pub fn history(&self) -> &[ChatMessage] {
        &self.messages[1..]
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Merges the persona, the extracted context and the conversation.
///
/// Deterministic: no timestamps or ids are embedded.
#[derive(Debug, Clone)]
pub struct PromptComposer {
    preamble: String,
}

impl PromptComposer {
    pub fn new() -> Self {
        Self {
            preamble: PERSONA_PREAMBLE.to_string(),
        }
    }

    /// Replace the built-in persona.
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    pub fn from_config(config: &nexus_config::PersonaConfig) -> Self {
        match &config.preamble_override {
            Some(preamble) => Self::new().with_preamble(preamble),
            None => Self::new(),
        }
    }

    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    /// Render the system message text for `context`.
    pub fn system_text(&self, context: &ContextDocument) -> String {
        if context.is_empty() {
            return self.preamble.clone();
        }
        format!("{}\n\n{CONTEXT_HEADER}\n{}", self.preamble, context.text())
    }

    pub fn compose(&self, history: Vec<ChatMessage>, context: &ContextDocument) -> ComposedPrompt {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::new(Role::System, self.system_text(context)));
        messages.extend(history);
        ComposedPrompt { messages }
    }
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::new()
    }
}
