//! Relative positions of stamps as seen from one coordinate.
//!
//! Versions of one element live on a *partially* ordered history. Given a coordinate, two stamps
//! relate in one of five ways:
//!
//! - `Before` / `After`: one stamp is strictly earlier in the history visible from the
//!   coordinate.
//! - `Equal`: same path (or same time under time precedence) and same time.
//! - `Contradiction`: the stamps sit on divergent, unmerged paths. Neither dominates; both may be
//!   "latest" at once.
//! - `Unreachable`: at least one stamp cannot be seen from the coordinate at all.
//!
//! The calculator answers these questions in constant time per pair using the [`SegmentMap`]
//! built once for the coordinate's destination.

use std::sync::Arc;

use crate::anomaly::AnomalyLog;
use crate::latest::StampedVersion;
use crate::path::PathDirectory;
use crate::position::{StampCoordinate, StampPrecedence};
use crate::segment::{Segment, SegmentError, SegmentMap, SegmentRevisit};
use crate::stamp::{is_committed, ModuleId, PathId, Stamp, StampDirectory, StampId, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelativePosition {
    Before,
    After,
    Equal,
    Contradiction,
    Unreachable,
}

impl RelativePosition {
    /// The position of the second operand relative to the first.
    pub fn reverse(self) -> Self {
        match self {
            RelativePosition::Before => RelativePosition::After,
            RelativePosition::After => RelativePosition::Before,
            other => other,
        }
    }
}

fn compare_times(time1: Time, time2: Time) -> RelativePosition {
    match time1.cmp(&time2) {
        std::cmp::Ordering::Less => RelativePosition::Before,
        std::cmp::Ordering::Greater => RelativePosition::After,
        std::cmp::Ordering::Equal => RelativePosition::Equal,
    }
}

/// True when some chain in `lower` passes through some chain in `upper` on its way from the
/// destination, which makes `lower`'s path an ancestor of `upper`'s.
fn runs_through(lower: &[&Segment], upper: &[&Segment]) -> bool {
    lower
        .iter()
        .any(|low| upper.iter().any(|up| low.is_preceded_by(up)))
}

/// Position arithmetic for one coordinate.
///
/// Construction flattens the path graph; everything afterwards is read-only, so one calculator
/// is shared freely between threads (see [`crate::cache::CalculatorCache`]).
pub struct RelativePositionCalculator {
    coordinate: StampCoordinate,
    segments: SegmentMap,
    stamps: Arc<dyn StampDirectory>,
    anomalies: Arc<AnomalyLog>,
}

impl RelativePositionCalculator {
    pub fn new(
        coordinate: StampCoordinate,
        paths: &dyn PathDirectory,
        stamps: Arc<dyn StampDirectory>,
        revisit: SegmentRevisit,
        anomalies: Arc<AnomalyLog>,
    ) -> Result<Self, SegmentError> {
        let segments = SegmentMap::build(coordinate.destination, paths, revisit)?;
        Ok(Self {
            coordinate,
            segments,
            stamps,
            anomalies,
        })
    }

    pub fn coordinate(&self) -> &StampCoordinate {
        &self.coordinate
    }

    pub fn segments(&self) -> &SegmentMap {
        &self.segments
    }

    pub fn stamps(&self) -> &dyn StampDirectory {
        self.stamps.as_ref()
    }

    pub fn anomalies(&self) -> &AnomalyLog {
        &self.anomalies
    }

    /// True when a stamp at `(path, module, time)` is visible within `segment`.
    pub fn contains_position(
        &self,
        segment: &Segment,
        path: PathId,
        module: ModuleId,
        time: Time,
    ) -> bool {
        self.coordinate.admits_module(module)
            && segment.path == path
            && is_committed(time)
            && time <= segment.end_time
    }

    /// True when `stamp` is visible from the coordinate.
    pub fn on_route(&self, stamp: StampId) -> bool {
        self.stamps
            .stamp(stamp)
            .is_some_and(|stamp| self.chains_containing(&stamp).next().is_some())
    }

    /// Compares two stamps under an explicit precedence policy.
    ///
    /// Under [`StampPrecedence::Time`], stamps on different reachable paths are ranked by time
    /// alone; ancestry is never consulted and `Contradiction` is never returned.
    pub fn fast_relative_position(
        &self,
        stamp1: StampId,
        stamp2: StampId,
        precedence: StampPrecedence,
    ) -> RelativePosition {
        let (Some(first), Some(second)) = (self.stamps.stamp(stamp1), self.stamps.stamp(stamp2))
        else {
            return RelativePosition::Unreachable;
        };
        let chains1: Vec<&Segment> = self.chains_containing(&first).collect();
        let chains2: Vec<&Segment> = self.chains_containing(&second).collect();
        if chains1.is_empty() || chains2.is_empty() {
            return RelativePosition::Unreachable;
        }

        if first.path == second.path || precedence == StampPrecedence::Time {
            return compare_times(first.time, second.time);
        }

        if runs_through(&chains1, &chains2) {
            RelativePosition::Before
        } else if runs_through(&chains2, &chains1) {
            RelativePosition::After
        } else {
            RelativePosition::Contradiction
        }
    }

    /// Compares two stamps under the coordinate's own precedence.
    pub fn relative_position(&self, stamp1: StampId, stamp2: StampId) -> RelativePosition {
        if !self.on_route(stamp1) || !self.on_route(stamp2) {
            return RelativePosition::Unreachable;
        }
        self.fast_relative_position(stamp1, stamp2, self.coordinate.precedence)
    }

    pub fn relative_position_of_versions<V: StampedVersion + ?Sized>(
        &self,
        version1: &V,
        version2: &V,
    ) -> RelativePosition {
        self.relative_position(version1.stamp(), version2.stamp())
    }

    /// The chains of the stamp's path whose cutoff the stamp falls under.
    fn chains_containing<'a>(&'a self, stamp: &'a Stamp) -> impl Iterator<Item = &'a Segment> {
        self.segments
            .segments_for(stamp.path)
            .iter()
            .filter(move |segment| {
                self.contains_position(segment, stamp.path, stamp.module, stamp.time)
            })
    }
}
