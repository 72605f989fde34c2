//! Pipeline stages for PGF-to-PNG conversion.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ workspace ──▶ preamble ──▶ document ──▶ compile ──▶ raster
//! (path)    (temp dir)    (comments)   (.tex)       (pdflatex)  (pdftocairo/…)
//! ```
//!
//! 1. [`input`]     — validate the source path and make it absolute
//! 2. [`workspace`] — allocate a unique directory that outlives the call
//! 3. [`preamble`]  — recover the Matplotlib preamble from the source comments
//! 4. [`document`]  — write the wrapping `standalone` document
//! 5. [`compile`]   — run the TeX engine; bounded log excerpt on failure
//! 6. [`raster`]    — try each rasterizer in order until a PNG exists
//!
//! [`process`] is shared by the last two: one child process, bounded by a
//! timeout and raced against the cancellation token.

pub mod compile;
pub mod document;
pub mod input;
pub mod preamble;
pub mod process;
pub mod raster;
pub mod workspace;
