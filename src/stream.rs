//! Streaming batch API: emit each document's item as soon as it finishes.
//!
//! Unlike [`Pipeline::process_batch`], which returns only after every
//! document, [`process_batch_stream`] yields one [`BatchItem`] per entry.
//! Documents are still processed one at a time and in input order, so items
//! arrive in index order.

use crate::config::RequestOptions;
use crate::convert::Pipeline;
use crate::error::EnrichError;
use crate::model::SourceSpec;
use crate::output::BatchItem;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of batch items.
pub type BatchStream = Pin<Box<dyn Stream<Item = BatchItem> + Send>>;

/// Process `entries` lazily, one document per poll of the stream.
///
/// Progress callbacks fire per document; `on_batch_complete` is left to the
/// caller, who knows when it stopped consuming.
pub fn process_batch_stream(
    pipeline: Arc<Pipeline>,
    entries: Vec<Result<SourceSpec, EnrichError>>,
    options: RequestOptions,
) -> BatchStream {
    let total = entries.len();
    info!("Starting streaming batch of {} document(s)", total);
    if let Some(ref cb) = pipeline.config().progress_callback {
        cb.on_batch_start(total);
    }

    let s = stream::iter(entries.into_iter().enumerate()).then(move |(index, entry)| {
        let pipeline = Arc::clone(&pipeline);
        let options = options.clone();
        async move {
            pipeline
                .process_entry(index, total, entry, &options)
                .await
        }
    });
    Box::pin(s)
}
