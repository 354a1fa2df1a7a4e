//! Parallel latest-stamp reduction.
//!
//! Large stamp streams are split into chunks, each chunk is folded on tokio's blocking pool, and
//! the partial results are combined with [`LatestStamps::merge`]. Since merging is insensitive to
//! where the stream was split, the result equals a sequential fold.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::debug;

use crate::latest::LatestStamps;
use crate::relative::RelativePositionCalculator;
use crate::stamp::StampId;

#[derive(Debug, Error)]
pub enum ParallelError {
    /// A chunk fold panicked or was cancelled.
    #[error("chunk fold failed: {0}")]
    Worker(#[from] JoinError),
}

/// Folds `stamps` in chunks of `chunk_size` and merges the partial results, unfiltered.
pub async fn fold_parallel(
    calculator: Arc<RelativePositionCalculator>,
    stamps: Vec<StampId>,
    chunk_size: usize,
) -> Result<LatestStamps, ParallelError> {
    let chunk_size = chunk_size.max(1);
    let tasks: Vec<_> = stamps
        .chunks(chunk_size)
        .map(|chunk| {
            let calculator = calculator.clone();
            let chunk = chunk.to_vec();
            tokio::task::spawn_blocking(move || LatestStamps::fold(&calculator, chunk))
        })
        .collect();
    debug!(chunks = tasks.len(), stamps = stamps.len(), "folding stamp chunks");

    let mut merged = LatestStamps::new();
    for partial in join_all(tasks).await {
        merged = merged.merge(partial?, &calculator);
    }
    Ok(merged)
}

/// Parallel form of [`RelativePositionCalculator::latest_stamps`].
pub async fn latest_stamps_parallel(
    calculator: Arc<RelativePositionCalculator>,
    stamps: Vec<StampId>,
    chunk_size: usize,
) -> Result<BTreeSet<StampId>, ParallelError> {
    let merged = fold_parallel(calculator.clone(), stamps, chunk_size).await?;
    Ok(merged.into_set(&calculator))
}
