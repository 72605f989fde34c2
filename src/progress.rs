//! Progress-callback trait for stage-level conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves each source through its stages.
//!
//! The trait is `Send + Sync` because [`crate::convert::convert_many`] runs
//! several sources at once; events for different sources may interleave.
//!
//! # Example
//!
//! ```rust
//! use pgf2png::{ConversionConfig, ConversionProgressCallback, Stage};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CompileCounter(AtomicUsize);
//!
//! impl ConversionProgressCallback for CompileCounter {
//!     fn on_stage_start(&self, _source: &Path, stage: Stage) {
//!         if stage == Stage::Compile {
//!             self.0.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(CompileCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{ConversionOutcome, Stage};
use std::path::Path;
use std::sync::Arc;

/// Called by the conversion pipeline as it processes each source.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once by [`crate::convert::convert_many`] before any source starts.
    fn on_batch_start(&self, total_sources: usize) {
        let _ = total_sources;
    }

    /// Called when a source enters a pipeline stage.
    fn on_stage_start(&self, source: &Path, stage: Stage) {
        let _ = (source, stage);
    }

    /// Called for every rasterizer attempt that failed before the next is tried.
    fn on_raster_fallback(&self, source: &Path, tool: &str, error: &str) {
        let _ = (source, tool, error);
    }

    /// Called once a source reaches a terminal outcome.
    fn on_source_complete(&self, source: &Path, outcome: &ConversionOutcome) {
        let _ = (source, outcome);
    }

    /// Called once by [`crate::convert::convert_many`] after every source finished.
    ///
    /// `rastered` counts sources whose outcome was a PNG.
    fn on_batch_complete(&self, total_sources: usize, rastered: usize) {
        let _ = (total_sources, rastered);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
