//! Collaborators at the edge of the engine: completion, ingestion, storage.
//!
//! The document engine itself never does I/O. Everything that talks to a
//! language model, reads an uploaded file or remembers a document sits
//! behind one of three traits so callers (and tests) can swap in their own:
//!
//! | Trait | Default | Used by |
//! |-------|---------|---------|
//! | [`CompletionOracle`] | [`llm::ProviderOracle`] | [`crate::research`] |
//! | [`TextExtractor`]    | [`ingest::FileExtractor`] | CLI, callers ingesting uploads |
//! | [`DocumentStore`]    | [`store::MemoryStore`] | [`crate::export::export_stored`] |
//!
//! Traits return [`BoxFuture`]s rather than using `async fn` so they stay
//! object safe and can be held as `Arc<dyn …>`.

pub mod ingest;
pub mod input;
pub mod llm;
pub mod scripted;
pub mod store;

use crate::error::{DocGenError, OracleFailure};
use crate::model::{DocumentKind, DocumentMetadata};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::pin::Pin;
use tokio_stream::Stream;

/// A boxed stream of completion chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, OracleFailure>> + Send>>;

// ── Completion ───────────────────────────────────────────────────────────

/// One completion call: a system prompt, a user prompt and sampling limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.5,
            max_tokens: 1000,
        }
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.max_tokens = n;
        self
    }
}

/// Produces text for a prompt. Never retried by this crate.
pub trait CompletionOracle: Send + Sync {
    /// Name of the backing model, reported in results.
    fn model(&self) -> String;

    fn complete(&self, request: CompletionRequest) -> BoxFuture<'_, Result<String, OracleFailure>>;

    /// Partial chunks of one logical completion. Dropping the stream
    /// abandons the call.
    fn complete_stream(
        &self,
        request: CompletionRequest,
    ) -> BoxFuture<'_, Result<ChunkStream, OracleFailure>>;
}

// ── Ingestion ────────────────────────────────────────────────────────────

/// Text, a minimal HTML rendition and metadata of an uploaded document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub text: String,
    pub html: String,
    pub metadata: DocumentMetadata,
}

/// Reads a document from disk. `mime` may be empty; implementations then
/// sniff the content.
pub trait TextExtractor: Send + Sync {
    fn extract_text<'a>(
        &'a self,
        path: &'a Path,
        mime: &'a str,
    ) -> BoxFuture<'a, Result<ExtractedDocument, DocGenError>>;
}

// ── Storage ──────────────────────────────────────────────────────────────

/// A document kept for later export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Generated or extracted text, before classification.
    pub content: String,
    /// Kind to classify with. None means detect from content.
    pub kind: Option<DocumentKind>,
    pub metadata: DocumentMetadata,
}

/// A keyed document store. Implementations provide their own locking.
pub trait DocumentStore: Send + Sync {
    fn save(&self, id: &str, doc: StoredDocument) -> BoxFuture<'_, Result<(), DocGenError>>;

    fn get(&self, id: &str) -> BoxFuture<'_, Result<Option<StoredDocument>, DocGenError>>;

    /// Returns whether a document was removed.
    fn delete(&self, id: &str) -> BoxFuture<'_, Result<bool, DocGenError>>;

    /// Every stored id with its document, in no particular order.
    fn all(&self) -> BoxFuture<'_, Result<Vec<(String, StoredDocument)>, DocGenError>>;
}
