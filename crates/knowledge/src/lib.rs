//! Knowledge mirror and context extraction for NEXUS.
//!
//! - [`KnowledgeMirror`] keeps a local git checkout of the knowledge
//!   repository in sync (clone when absent, fast-forward pull otherwise).
//!   Syncs are serialized per mirror and never leave a half-written checkout.
//! - [`ContextExtractor`] reads one well-known file from the checkout and
//!   returns a [`ContextDocument`] capped at a character budget.
//!
//! Both degrade instead of failing: a broken sync keeps the previous
//! checkout, and a missing file yields an empty document.

pub mod error;
pub mod extract;
mod git;
pub mod mirror;

pub use error::{ContextReadError, SyncError};
pub use extract::{ContextDocument, ContextExtractor};
pub use mirror::{KnowledgeMirror, SyncAction, SyncStatus};
