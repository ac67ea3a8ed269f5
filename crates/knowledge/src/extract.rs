//! Bounded context extraction from the knowledge mirror.
//!
//! Reads a single well-known file (e.g. `AGENTS.md`) relative to the mirror
//! root and keeps at most `max_chars` characters of it. Missing or
//! unreadable files produce an empty document.

use crate::error::ContextReadError;
use crate::mirror::KnowledgeMirror;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// A bounded excerpt of a knowledge file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextDocument {
    source: PathBuf,
    text: String,
    truncated: bool,
}

impl ContextDocument {
    /// An empty document attributed to `source`.
    pub fn empty(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            text: String::new(),
            truncated: false,
        }
    }

    /// Build a document from raw text, keeping at most `max_chars` characters.
    pub fn bounded(source: impl Into<PathBuf>, raw: &str, max_chars: usize) -> Self {
        let text = truncate_chars(raw, max_chars);
        Self {
            source: source.into(),
            truncated: text.len() < raw.len(),
            text: text.to_string(),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Length of the kept excerpt, in characters.
    pub fn len_chars(&self) -> usize {
        self.text.chars().count()
    }

    /// Whether the source held more text than was kept.
    pub fn was_truncated(&self) -> bool {
        self.truncated
    }
}

/// Longest prefix of `text` with at most `max_chars` characters.
///
/// Always cuts on a code-point boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Reads the configured knowledge file out of the mirror.
#[derive(Debug, Clone)]
pub struct ContextExtractor {
    root: PathBuf,
    file_name: String,
    max_chars: usize,
}

impl ContextExtractor {
    pub const DEFAULT_MAX_CHARS: usize = 2000;

    pub fn new(root: impl Into<PathBuf>, file_name: impl Into<String>, max_chars: usize) -> Self {
        Self {
            root: root.into(),
            file_name: file_name.into(),
            max_chars,
        }
    }

    pub fn from_config(config: &nexus_config::KnowledgeConfig) -> Self {
        Self::new(&config.dir, &config.context_file, config.max_context_chars)
    }

    /// Extractor reading `file_name` from `mirror`'s checkout.
    pub fn for_mirror(mirror: &KnowledgeMirror, file_name: impl Into<String>, max_chars: usize) -> Self {
        Self::new(mirror.path(), file_name, max_chars)
    }

    /// Full path of the knowledge file.
    pub fn source_path(&self) -> PathBuf {
        self.root.join(&self.file_name)
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Upper bound on bytes read from the file: four bytes per kept
    /// character plus one more character, enough to detect truncation.
    fn read_limit(&self) -> u64 {
        (self.max_chars as u64).saturating_add(1).saturating_mul(4)
    }

    /// Read the knowledge file, reporting why nothing could be read.
    ///
    /// Only a bounded prefix of the file is read. Invalid UTF-8 sequences
    /// are replaced rather than rejected.
    pub async fn try_extract(&self) -> Result<ContextDocument, ContextReadError> {
        let path = self.source_path();
        let read_err = |e: std::io::Error| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ContextReadError::Missing { path: path.clone() }
            } else {
                ContextReadError::Unreadable {
                    path: path.clone(),
                    reason: e.to_string(),
                }
            }
        };

        let file = tokio::fs::File::open(&path).await.map_err(read_err)?;
        let mut bytes = Vec::new();
        file.take(self.read_limit())
            .read_to_end(&mut bytes)
            .await
            .map_err(read_err)?;

        let raw = String::from_utf8_lossy(&bytes);
        let doc = ContextDocument::bounded(path.clone(), &raw, self.max_chars);
        debug!(
            source = %doc.source().display(),
            chars = doc.len_chars(),
            truncated = doc.was_truncated(),
            "Loaded knowledge context"
        );
        Ok(doc)
    }

    /// Read the knowledge file, degrading to an empty document on any failure.
    pub async fn extract(&self) -> ContextDocument {
        match self.try_extract().await {
            Ok(doc) => doc,
            Err(ContextReadError::Missing { path }) => {
                debug!(path = %path.display(), "No knowledge file, using empty context");
                ContextDocument::empty(path)
            }
            Err(e @ ContextReadError::Unreadable { .. }) => {
                warn!(error = %e, "Knowledge file unreadable, using empty context");
                ContextDocument::empty(self.source_path())
            }
        }
    }
}
