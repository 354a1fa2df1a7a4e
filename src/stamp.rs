//! Stamps: the immutable attribution attached to every version.
//!
//! A stamp records *when* (time), *who* (author), *under which module* and *on which path* a
//! version was committed, plus the status (active, inactive, ...) the version carries. Stamps are
//! referenced by a dense integer [`StampId`]; the [`StampDirectory`] maps ids back to their
//! contents.
//!
//! The resolution engine never mutates stamps. It only reads them through the directory while
//! comparing positions.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

macro_rules! dense_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", stringify!($name), self.0)
            }
        }
    };
}

dense_id!(
    /// Identity of one stamp (one `(status, time, author, module, path)` tuple).
    StampId
);
dense_id!(
    /// Identity of a path (a branch of editing history).
    PathId
);
dense_id!(
    /// Identity of a module. Coordinates may restrict visibility to a set of modules.
    ModuleId
);
dense_id!(
    /// Identity of an author. Never part of the ordering.
    AuthorId
);

/// Epoch milliseconds.
pub type Time = i64;

/// Time carried by versions that have been written but not yet committed.
pub const UNCOMMITTED: Time = i64::MAX;

/// Time carried by versions whose commit was canceled.
pub const CANCELED: Time = i64::MIN;

/// The latest committed time a position can name. Sits just below [`UNCOMMITTED`].
pub const LATEST: Time = i64::MAX - 1;

/// Returns `true` unless `time` is one of the uncommitted/canceled sentinels.
pub fn is_committed(time: Time) -> bool {
    time != UNCOMMITTED && time != CANCELED
}

/// Lifecycle status carried by a stamp.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Active,
    Inactive,
    /// Bootstrap content loaded before any commit.
    Primordial,
    Canceled,
}

impl Status {
    pub fn is_active(self) -> bool {
        matches!(self, Status::Active)
    }
}

/// The contents of a stamp.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stamp {
    pub status: Status,
    pub time: Time,
    pub author: AuthorId,
    pub module: ModuleId,
    pub path: PathId,
}

/// Read access to stamps, as consumed by the resolution engine.
///
/// Implementations are shared across threads (parallel reductions query the directory from the
/// blocking pool), hence the `Send + Sync` bound.
pub trait StampDirectory: Send + Sync {
    /// Looks up a stamp. `None` means the id was never issued.
    fn stamp(&self, id: StampId) -> Option<Stamp>;

    /// Issues the inactive twin of `id`: same author, module and path, status
    /// [`Status::Inactive`], time `max(time, original time)`.
    fn retired_stamp_for(&self, id: StampId, time: Time) -> Option<StampId>;

    fn time_for_stamp(&self, id: StampId) -> Option<Time> {
        self.stamp(id).map(|s| s.time)
    }

    fn module_for_stamp(&self, id: StampId) -> Option<ModuleId> {
        self.stamp(id).map(|s| s.module)
    }

    fn path_for_stamp(&self, id: StampId) -> Option<PathId> {
        self.stamp(id).map(|s| s.path)
    }

    fn status_for_stamp(&self, id: StampId) -> Option<Status> {
        self.stamp(id).map(|s| s.status)
    }
}

/// In-memory stamp directory.
///
/// Identical tuples share one id: asking twice for the same `(status, time, author, module,
/// path)` returns the id issued the first time.
pub struct StampStore {
    stamps: DashMap<StampId, Stamp>,
    index: DashMap<Stamp, StampId>,
    next: AtomicU32,
}

impl StampStore {
    pub fn new() -> Self {
        Self {
            stamps: DashMap::new(),
            index: DashMap::new(),
            next: AtomicU32::new(1),
        }
    }

    /// Returns the id for `stamp`, issuing a new one if this tuple has not been seen.
    pub fn stamp_for(&self, stamp: Stamp) -> StampId {
        *self.index.entry(stamp).or_insert_with(|| {
            let id = StampId(self.next.fetch_add(1, Ordering::Relaxed));
            self.stamps.insert(id, stamp);
            debug!(%id, time = stamp.time, path = %stamp.path, "issued stamp");
            id
        })
    }

    /// Convenience form of [`StampStore::stamp_for`].
    pub fn issue(
        &self,
        status: Status,
        time: Time,
        author: AuthorId,
        module: ModuleId,
        path: PathId,
    ) -> StampId {
        self.stamp_for(Stamp {
            status,
            time,
            author,
            module,
            path,
        })
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}

impl Default for StampStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StampDirectory for StampStore {
    fn stamp(&self, id: StampId) -> Option<Stamp> {
        self.stamps.get(&id).map(|s| *s)
    }

    fn retired_stamp_for(&self, id: StampId, time: Time) -> Option<StampId> {
        let original = self.stamp(id)?;
        Some(self.stamp_for(Stamp {
            status: Status::Inactive,
            time: time.max(original.time),
            ..original
        }))
    }
}
