//! Stampview: latest-version resolution for a bitemporal, path-branched content store.
//!
//! Every version of every content element carries a *stamp*: time, author, module and path.
//! Paths are branches of editing history; each path may originate from positions on other paths.
//! Callers look at the store through a *coordinate* (destination position, visible states,
//! module filter, precedence policy) and ask which versions are the latest ones visible.
//!
//! Architectural overview:
//! - `stamp` and `path` hold the collaborator contracts (stamp and path directories) plus
//!   in-memory implementations.
//! - `segment` flattens the path graph relative to one destination position.
//! - `relative` compares two stamps in constant time against that flattening.
//! - `latest` reduces version lists and stamp streams to their latest elements. The answer may
//!   be plural: edits on divergent, unmerged paths are *contradictions*, and the engine reports
//!   them instead of picking a winner.
//! - `cache` memoizes calculators per coordinate; `parallel` runs reductions on the tokio
//!   blocking pool.

pub mod anomaly;
pub mod cache;
pub mod latest;
pub mod parallel;
pub mod path;
pub mod position;
pub mod relative;
pub mod scenario;
pub mod segment;
pub mod stamp;

pub use cache::{CacheError, CalculatorCache};
pub use latest::{
    apply_candidate, Chronology, ElementChronology, LatestStamps, LatestVersion, StampedVersion,
    Version,
};
pub use path::{PathDirectory, PathError, PathGraph};
pub use position::{StampCoordinate, StampPosition, StampPrecedence};
pub use relative::{RelativePosition, RelativePositionCalculator};
pub use segment::{Segment, SegmentError, SegmentMap, SegmentRevisit};
pub use stamp::{
    AuthorId, ModuleId, PathId, Stamp, StampDirectory, StampId, StampStore, Status, Time,
    CANCELED, LATEST, UNCOMMITTED,
};
