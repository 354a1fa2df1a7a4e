//! Positions and coordinates: the caller's view onto a path-branched history.
//!
//! A [`StampPosition`] names "as of `time` on `path`". Through the path's origins it transitively
//! also names every ancestor path at the time that path was branched from.
//!
//! A [`StampCoordinate`] is a full view specification. It is an immutable value with structural
//! equality and hashing because it is the cache key for the segment map built for it. Changing
//! any part of a view means deriving a new coordinate through one of the `with_*` analogs.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::stamp::{ModuleId, PathId, Status, Time, LATEST};

/// A point on one path: "as of `time` on `path`".
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StampPosition {
    pub path: PathId,
    pub time: Time,
}

impl StampPosition {
    pub fn new(path: PathId, time: Time) -> Self {
        Self { path, time }
    }
}

impl PartialOrd for StampPosition {
    /// Positions on one path are ordered by time. Positions on different paths have no order
    /// without the path graph, so they compare as `None`.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.path != other.path {
            return None;
        }
        Some(self.time.cmp(&other.time))
    }
}

/// How two stamps on different paths are ranked.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum StampPrecedence {
    /// Compare timestamps first, across any two reachable paths.
    ///
    /// Two edits on divergent, unmerged paths are ranked by their times and are never reported
    /// as a contradiction under this policy.
    Time,
    /// Compare path ancestry first; time only orders stamps within one path.
    #[default]
    Path,
}

/// A full view specification.
///
/// Equality and hashing cover, in order: destination position, allowed states, module filter,
/// precedence. An empty module filter admits every module.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct StampCoordinate {
    pub destination: StampPosition,
    pub allowed_states: BTreeSet<Status>,
    #[serde(default)]
    pub modules: BTreeSet<ModuleId>,
    #[serde(default)]
    pub precedence: StampPrecedence,
}

impl StampCoordinate {
    pub fn new(
        destination: StampPosition,
        allowed_states: impl IntoIterator<Item = Status>,
        modules: impl IntoIterator<Item = ModuleId>,
        precedence: StampPrecedence,
    ) -> Self {
        Self {
            destination,
            allowed_states: allowed_states.into_iter().collect(),
            modules: modules.into_iter().collect(),
            precedence,
        }
    }

    /// The latest active content on `path`, any module, path precedence.
    pub fn latest_on(path: PathId) -> Self {
        Self::new(
            StampPosition::new(path, LATEST),
            [Status::Active],
            [],
            StampPrecedence::Path,
        )
    }

    /// True when the view admits `module`.
    pub fn admits_module(&self, module: ModuleId) -> bool {
        self.modules.is_empty() || self.modules.contains(&module)
    }

    pub fn admits_status(&self, status: Status) -> bool {
        self.allowed_states.contains(&status)
    }

    pub fn with_time(&self, time: Time) -> Self {
        Self {
            destination: StampPosition::new(self.destination.path, time),
            ..self.clone()
        }
    }

    pub fn with_path(&self, path: PathId) -> Self {
        Self {
            destination: StampPosition::new(path, self.destination.time),
            ..self.clone()
        }
    }

    pub fn with_allowed_states(&self, states: impl IntoIterator<Item = Status>) -> Self {
        Self {
            allowed_states: states.into_iter().collect(),
            ..self.clone()
        }
    }

    pub fn with_modules(&self, modules: impl IntoIterator<Item = ModuleId>) -> Self {
        Self {
            modules: modules.into_iter().collect(),
            ..self.clone()
        }
    }

    pub fn with_precedence(&self, precedence: StampPrecedence) -> Self {
        Self {
            precedence,
            ..self.clone()
        }
    }
}
