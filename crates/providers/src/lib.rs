//! Completion provider implementations for NEXUS.
//!
//! All providers implement the `nexus_core::Provider` trait. The gateway
//! builds one from the `[provider]` config section at startup.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
