//! The chat path of the NEXUS gateway.
//!
//! Each request flows through three steps:
//!
//! 1. **Load context**: the bounded knowledge excerpt from the mirror
//! 2. **Compose**: persona preamble + context as one system message,
//!    followed by the caller's history verbatim
//! 3. **Forward**: a single call to the completion provider, with every
//!    failure mapped into a structured error instead of escaping
//!
//! Conversation history is never stored between requests.

pub mod composer;
pub mod forwarder;
pub mod pipeline;

pub use composer::{CONTEXT_HEADER, ComposedPrompt, PERSONA_PREAMBLE, PromptComposer};
pub use forwarder::{
    Completion, CompletionForwarder, CompletionResult, FailureKind, ForwardError,
    MISSING_CREDENTIAL_MESSAGE,
};
pub use pipeline::{ChatOutcome, ChatPipeline, ChatRequest, Stage};
