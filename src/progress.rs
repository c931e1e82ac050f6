//! Progress-callback trait for generation and rendering events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::DocGenConfigBuilder::progress_callback`] to hear about
//! the slow steps: each part of a multi-part assignment response, and each
//! PDF engine attempt along the fallback chain.
//!
//! # Example
//!
//! ```rust
//! use researchaid_docgen::{DocGenConfig, GenerationProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PartCounter {
//!     done: AtomicUsize,
//! }
//!
//! impl GenerationProgressCallback for PartCounter {
//!     fn on_part_complete(&self, part: usize, total: usize, chars: usize) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Part {}/{} done ({} chars)", part, total, chars);
//!     }
//! }
//!
//! let config = DocGenConfig::builder()
//!     .progress_callback(Arc::new(PartCounter { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Receives generation and rendering events.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Parts are generated sequentially and engines are
/// tried one at a time, so events for one call never interleave; the trait
/// is still `Send + Sync` because a config may be shared across tasks.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called before the completion request for one part is sent.
    ///
    /// # Arguments
    /// * `part`: 1-indexed part number
    /// * `total`: number of parts in this response
    fn on_part_start(&self, part: usize, total: usize) {
        let _ = (part, total);
    }

    /// Called when a part's completion has arrived.
    ///
    /// # Arguments
    /// * `part`: 1-indexed part number
    /// * `total`: number of parts
    /// * `chars`: length of the generated text in characters
    fn on_part_complete(&self, part: usize, total: usize, chars: usize) {
        let _ = (part, total, chars);
    }

    /// Called before a PDF engine is tried.
    fn on_engine_attempt(&self, engine: &str) {
        let _ = engine;
    }

    /// Called when an engine failed. `falling_back` tells whether the next
    /// engine will be tried.
    fn on_engine_failed(&self, engine: &str, error: &str, falling_back: bool) {
        let _ = (engine, error, falling_back);
    }

    /// Called once with the engine that produced the PDF.
    fn on_engine_success(&self, engine: &str, bytes: usize) {
        let _ = (engine, bytes);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DocGenConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;
