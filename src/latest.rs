//! Latest-version resolution.
//!
//! The latest versions of an element, as seen from a coordinate, are the *maximal* on-route
//! versions: those no other on-route version is strictly after. Under a contradiction there is
//! more than one.
//!
//! All reductions in this module (version lists, raw stamp streams, parallel partial results)
//! go through one function, [`apply_candidate`], which folds one candidate into a set of
//! survivors. Because survivors are always the maximal elements of everything folded so far,
//! merging two partial results by replaying one into the other gives the same set as folding
//! the whole input in one pass, wherever the input was split.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::anomaly::Anomaly;
use crate::relative::{RelativePosition, RelativePositionCalculator};
use crate::stamp::{StampId, Status, Time};

/// Anything carrying a stamp.
pub trait StampedVersion {
    fn stamp(&self) -> StampId;
}

impl StampedVersion for StampId {
    fn stamp(&self) -> StampId {
        *self
    }
}

/// The versions of one logical element, in insertion order.
///
/// No time ordering is expected; the calculator does its own comparison.
pub trait Chronology {
    type Version: StampedVersion;

    fn versions(&self) -> &[Self::Version];
}

/// A stamped value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Version<T> {
    pub stamp: StampId,
    pub value: T,
}

impl<T> StampedVersion for Version<T> {
    fn stamp(&self) -> StampId {
        self.stamp
    }
}

/// All versions of one element.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ElementChronology<T> {
    pub element: Uuid,
    pub versions: Vec<Version<T>>,
}

impl<T> ElementChronology<T> {
    pub fn new(element: Uuid) -> Self {
        Self {
            element,
            versions: Vec::new(),
        }
    }

    pub fn push(&mut self, stamp: StampId, value: T) {
        self.versions.push(Version { stamp, value });
    }
}

impl<T> Chronology for ElementChronology<T> {
    type Version = Version<T>;

    fn versions(&self) -> &[Version<T>] {
        &self.versions
    }
}

/// Folds `candidate` into `survivors`.
///
/// - A candidate after a survivor replaces it.
/// - A candidate before any survivor is dropped.
/// - A candidate equal to (the same as) a survivor is dropped; a *different* candidate at an
///   equal position is kept alongside and reported as an anomaly.
/// - A contradicting candidate joins the survivors.
/// - An unreachable comparison is reported and the candidate is kept.
///
/// Candidates must already be on route.
pub fn apply_candidate<V>(
    survivors: &mut Vec<V>,
    candidate: V,
    calculator: &RelativePositionCalculator,
) where
    V: StampedVersion + PartialEq,
{
    let precedence = calculator.coordinate().precedence;
    let mut superseded = Vec::new();

    for (idx, kept) in survivors.iter().enumerate() {
        match calculator.fast_relative_position(candidate.stamp(), kept.stamp(), precedence) {
            RelativePosition::After => superseded.push(idx),
            RelativePosition::Before => return,
            RelativePosition::Equal => {
                if *kept == candidate {
                    return;
                }
                calculator.anomalies().report(Anomaly::EqualStamps {
                    kept: kept.stamp(),
                    candidate: candidate.stamp(),
                });
            }
            RelativePosition::Contradiction => {}
            RelativePosition::Unreachable => {
                calculator.anomalies().report(Anomaly::UnreachableOnRoute {
                    kept: kept.stamp(),
                    candidate: candidate.stamp(),
                });
            }
        }
    }

    for idx in superseded.into_iter().rev() {
        survivors.swap_remove(idx);
    }
    survivors.push(candidate);
}

/// Partial result of a latest-stamp reduction.
///
/// Holds the unfiltered survivors; state filtering happens once, at the end, in
/// [`LatestStamps::into_set`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatestStamps {
    survivors: Vec<StampId>,
}

impl LatestStamps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a stream of stamps. Off-route stamps are skipped.
    pub fn fold(
        calculator: &RelativePositionCalculator,
        stamps: impl IntoIterator<Item = StampId>,
    ) -> Self {
        let mut latest = Self::new();
        for stamp in stamps {
            latest.accumulate(calculator, stamp);
        }
        latest
    }

    pub fn accumulate(&mut self, calculator: &RelativePositionCalculator, stamp: StampId) {
        if calculator.on_route(stamp) {
            apply_candidate(&mut self.survivors, stamp, calculator);
        }
    }

    /// Combines two partial results by replaying the smaller into the larger.
    pub fn merge(self, other: Self, calculator: &RelativePositionCalculator) -> Self {
        let (mut larger, smaller) = if self.survivors.len() >= other.survivors.len() {
            (self, other)
        } else {
            (other, self)
        };
        for stamp in smaller.survivors {
            apply_candidate(&mut larger.survivors, stamp, calculator);
        }
        larger
    }

    /// Survivors before state filtering.
    pub fn unfiltered(&self) -> BTreeSet<StampId> {
        self.survivors.iter().copied().collect()
    }

    /// Survivors whose status the coordinate allows.
    pub fn into_set(self, calculator: &RelativePositionCalculator) -> BTreeSet<StampId> {
        let coordinate = calculator.coordinate();
        self.survivors
            .into_iter()
            .filter(|stamp| {
                calculator
                    .stamps()
                    .status_for_stamp(*stamp)
                    .is_some_and(|status| coordinate.admits_status(status))
            })
            .collect()
    }
}

/// The latest version of an element, plus any versions contradicting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestVersion<V> {
    primary: V,
    contradictions: Vec<V>,
}

impl<V> LatestVersion<V> {
    pub fn value(&self) -> &V {
        &self.primary
    }

    /// Versions on divergent paths that are as "latest" as [`LatestVersion::value`].
    pub fn contradictions(&self) -> &[V] {
        &self.contradictions
    }

    pub fn is_contradicted(&self) -> bool {
        !self.contradictions.is_empty()
    }

    pub fn versions(&self) -> impl Iterator<Item = &V> {
        std::iter::once(&self.primary).chain(&self.contradictions)
    }

    pub fn len(&self) -> usize {
        1 + self.contradictions.len()
    }

    pub fn into_parts(self) -> (V, Vec<V>) {
        (self.primary, self.contradictions)
    }
}

impl RelativePositionCalculator {
    /// The latest visible version(s) of `chronology`, or `None` if nothing is visible.
    ///
    /// Survivors are ordered newest first (ties by stamp id); the first is the primary value.
    pub fn latest_version<C>(&self, chronology: &C) -> Option<LatestVersion<C::Version>>
    where
        C: Chronology + ?Sized,
        C::Version: Clone + PartialEq,
    {
        let mut survivors: Vec<C::Version> = Vec::new();
        for version in chronology.versions() {
            if self.on_route(version.stamp()) {
                apply_candidate(&mut survivors, version.clone(), self);
            }
        }

        let mut ranked: Vec<(Time, StampId, C::Version)> = survivors
            .into_iter()
            .filter_map(|version| {
                let stamp = self.stamps().stamp(version.stamp())?;
                self.coordinate()
                    .admits_status(stamp.status)
                    .then(|| (stamp.time, version.stamp(), version))
            })
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let mut versions = ranked.into_iter().map(|(_, _, version)| version);
        let primary = versions.next()?;
        Some(LatestVersion {
            primary,
            contradictions: versions.collect(),
        })
    }

    /// The latest visible stamps among `stamps`, filtered to the allowed states.
    pub fn latest_stamps(&self, stamps: impl IntoIterator<Item = StampId>) -> BTreeSet<StampId> {
        LatestStamps::fold(self, stamps).into_set(self)
    }

    /// Statuses of the latest stamps, before state filtering.
    ///
    /// More than one status means contradicting latest stamps disagree.
    pub fn latest_status(&self, stamps: impl IntoIterator<Item = StampId>) -> BTreeSet<Status> {
        LatestStamps::fold(self, stamps)
            .unfiltered()
            .into_iter()
            .filter_map(|stamp| self.stamps().status_for_stamp(stamp))
            .collect()
    }

    /// True when any latest stamp among `stamps` is active.
    pub fn is_latest_active(&self, stamps: impl IntoIterator<Item = StampId>) -> bool {
        self.latest_status(stamps).contains(&Status::Active)
    }
}
