//! Coordinate → calculator cache.
//!
//! Building a segment map walks the path graph, so each distinct coordinate is flattened once and
//! its calculator reused. The cache is an ordinary value owned by whatever session or service
//! creates coordinates; there is no process-wide instance.
//!
//! Concurrency: lookups are lock-free reads on a [`DashMap`]. A miss builds the calculator
//! *outside* any shard lock and then publishes it with insert-if-absent, so two threads racing on
//! a new coordinate may both build, but only the first published calculator is ever handed out.
//!
//! The cache is append-only. When path or stamp data changes underneath it, call
//! [`CalculatorCache::reset`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::anomaly::{AnomalyLog, DEFAULT_WARNING_LIMIT};
use crate::path::PathDirectory;
use crate::position::{StampCoordinate, StampPosition};
use crate::relative::RelativePositionCalculator;
use crate::segment::{SegmentError, SegmentRevisit};
use crate::stamp::StampDirectory;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("cannot flatten history for {destination:?}: {source}")]
    Segment {
        destination: StampPosition,
        #[source]
        source: SegmentError,
    },
}

pub struct CalculatorCache {
    stamps: Arc<dyn StampDirectory>,
    paths: Arc<dyn PathDirectory>,
    revisit: SegmentRevisit,
    anomalies: Arc<AnomalyLog>,
    calculators: DashMap<StampCoordinate, Arc<RelativePositionCalculator>>,
    builds: AtomicUsize,
}

impl CalculatorCache {
    pub fn new(stamps: Arc<dyn StampDirectory>, paths: Arc<dyn PathDirectory>) -> Self {
        Self {
            stamps,
            paths,
            revisit: SegmentRevisit::default(),
            anomalies: Arc::new(AnomalyLog::new(DEFAULT_WARNING_LIMIT)),
            calculators: DashMap::new(),
            builds: AtomicUsize::new(0),
        }
    }

    /// Sets how diamond-shaped path histories are flattened. Clears cached calculators.
    pub fn with_revisit(mut self, revisit: SegmentRevisit) -> Self {
        self.revisit = revisit;
        self.calculators.clear();
        self
    }

    /// Sets how many anomalies are logged before the log goes quiet.
    pub fn with_warning_limit(mut self, limit: usize) -> Self {
        self.anomalies = Arc::new(AnomalyLog::new(limit));
        self.calculators.clear();
        self
    }

    /// Returns the calculator for `coordinate`, building it on first use.
    pub fn calculator(
        &self,
        coordinate: &StampCoordinate,
    ) -> Result<Arc<RelativePositionCalculator>, CacheError> {
        if let Some(existing) = self.calculators.get(coordinate) {
            return Ok(existing.clone());
        }

        let built = RelativePositionCalculator::new(
            coordinate.clone(),
            self.paths.as_ref(),
            self.stamps.clone(),
            self.revisit,
            self.anomalies.clone(),
        )
        .map_err(|source| CacheError::Segment {
            destination: coordinate.destination,
            source,
        })?;
        self.builds.fetch_add(1, Ordering::Relaxed);

        let published = self
            .calculators
            .entry(coordinate.clone())
            .or_insert_with(|| Arc::new(built))
            .clone();
        debug!(
            path = %coordinate.destination.path,
            time = coordinate.destination.time,
            cached = self.calculators.len(),
            "published calculator"
        );
        Ok(published)
    }

    /// Drops every cached calculator.
    pub fn reset(&self) {
        let dropped = self.calculators.len();
        self.calculators.clear();
        info!(dropped, "calculator cache reset");
    }

    pub fn len(&self) -> usize {
        self.calculators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calculators.is_empty()
    }

    /// Number of segment maps built so far, including ones lost to a publication race.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    pub fn anomalies(&self) -> &AnomalyLog {
        &self.anomalies
    }

    pub fn stamps(&self) -> &Arc<dyn StampDirectory> {
        &self.stamps
    }
}
