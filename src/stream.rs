//! Streaming batch API: emit conversions as they complete.
//!
//! Unlike [`crate::convert::convert_many`], which returns only after every
//! source finishes, [`convert_stream`] yields each result as soon as its
//! pipeline reaches a terminal outcome. Results arrive in completion order;
//! each carries the index of its source in the input slice.
//!
//! Sources never share a workspace, so running them side by side needs no
//! locking. Concurrency is bounded by
//! [`crate::config::ConversionConfig::concurrency`] because every in-flight
//! source may be running a `pdflatex` process.

use crate::config::ConversionConfig;
use crate::convert::convert;
use crate::error::PgfError;
use crate::output::Conversion;
use futures::stream::{self, Stream, StreamExt};
use std::path::Path;
use std::pin::Pin;

/// A boxed stream of `(source_index, result)` pairs.
pub type ConversionStream<'a> =
    Pin<Box<dyn Stream<Item = (usize, Result<Conversion, PgfError>)> + Send + 'a>>;

/// Convert `sources` concurrently, yielding each result as it is ready.
pub fn convert_stream<'a, P>(sources: &'a [P], config: &'a ConversionConfig) -> ConversionStream<'a>
where
    P: AsRef<Path> + Sync,
{
    let s = stream::iter(sources.iter().enumerate().map(move |(idx, source)| {
        let path = source.as_ref().to_path_buf();
        async move { (idx, convert(&path, config).await) }
    }))
    .buffer_unordered(config.concurrency);

    Box::pin(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_sources_yield_errors_with_indices() {
        let config = ConversionConfig::default();
        let sources = ["/nope/a.pgf", "/nope/b.pgf"];

        let mut results: Vec<_> = convert_stream(&sources, &config).collect().await;
        results.sort_by_key(|(i, _)| *i);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 0);
        assert_eq!(results[1].0, 1);
        assert!(results
            .iter()
            .all(|(_, r)| matches!(r, Err(PgfError::SourceNotFound { .. }))));
    }
}
