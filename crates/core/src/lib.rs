//! # NEXUS Core
//!
//! Domain types, traits, and error definitions shared by every NEXUS crate.
//! This crate has **zero framework dependencies**: it defines the chat
//! message model and the `Provider` seam that the forwarder and the HTTP
//! client implement against.

pub mod error;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::ProviderError;
pub use message::{ChatMessage, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
