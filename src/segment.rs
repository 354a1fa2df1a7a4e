//! Segment maps: the path graph flattened relative to one destination position.
//!
//! Comparing two stamps on different paths asks "is one path an ancestor of the other, as seen
//! from here?". Walking the path graph for every comparison would be far too slow for latest
//! version reductions over large histories, so the graph is flattened once per coordinate:
//!
//! - Every path reachable from the destination gets a [`Segment`] with a sequence number
//!   assigned in depth-first pre-order (the destination itself is sequence 0).
//! - A segment's `end_time` is the cutoff inherited from the position that reached it: the
//!   destination time for the destination path, the origin time for every origin path.
//! - A segment's `preceding` set holds the sequences of every segment on the chain from the
//!   destination down to (and including) itself.
//!
//! With that, "path of segment S2 lies between the destination and S1" is a single bit test:
//! `S1.preceding.contains(S2.sequence)`.
//!
//! Diamonds (a path reachable through more than one origin chain) are handled according to
//! [`SegmentRevisit`]. The default keeps only the last visit, which loses the ancestry recorded
//! by earlier chains. `Merge` keeps one segment per chain, each with its own cutoff, so a stamp
//! only precedes the chains whose cutoff it falls under.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::path::PathDirectory;
use crate::position::StampPosition;
use crate::stamp::{PathId, Time};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SegmentError {
    /// The path graph reached `path` again while already below it on the current chain.
    #[error("path {0} is its own ancestor")]
    Cycle(PathId),
}

/// What to do when a path is reached through a second origin chain.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SegmentRevisit {
    /// Replace the earlier segment with a fresh one for the latest visit.
    #[default]
    Overwrite,
    /// Keep a segment for every chain; the path's ancestry is the union over its chains.
    Merge,
}

/// Fixed-width bitset of segment sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentSet {
    words: Vec<u64>,
}

impl SegmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sequence: u32) {
        let (word, bit) = Self::locate(sequence);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << bit;
    }

    pub fn contains(&self, sequence: u32) -> bool {
        let (word, bit) = Self::locate(sequence);
        self.words
            .get(word)
            .is_some_and(|bits| bits & (1u64 << bit) != 0)
    }

    pub fn union_with(&mut self, other: &SegmentSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (mine, theirs) in self.words.iter_mut().zip(&other.words) {
            *mine |= theirs;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.words.iter().enumerate().flat_map(|(word, bits)| {
            (0..64u32)
                .filter(move |bit| bits & (1u64 << bit) != 0)
                .map(move |bit| word as u32 * 64 + bit)
        })
    }

    fn locate(sequence: u32) -> (usize, u32) {
        ((sequence / 64) as usize, sequence % 64)
    }
}

/// One path's slice of the flattened graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub sequence: u32,
    pub path: PathId,
    /// Latest time on `path` visible from the destination.
    pub end_time: Time,
    /// Sequences of every segment from the destination down to this one, inclusive.
    pub preceding: SegmentSet,
}

impl Segment {
    /// True when `other` lies on the chain between the destination and this segment, which makes
    /// this segment's path an ancestor of `other`'s.
    pub fn is_preceded_by(&self, other: &Segment) -> bool {
        self.preceding.contains(other.sequence)
    }
}

/// Immutable segment index for one destination position.
#[derive(Debug, Clone)]
pub struct SegmentMap {
    destination: StampPosition,
    /// One segment per chain reaching the path, in visit order. Overwrite keeps only the last.
    segments: HashMap<PathId, Vec<Segment>>,
}

struct Frame {
    position: StampPosition,
    /// Preceding set accumulated by the caller chain, not yet including this frame's segment.
    preceding: SegmentSet,
}

impl SegmentMap {
    /// Flattens the history visible from `destination`.
    ///
    /// Traversal is depth-first pre-order over origins in their recorded order, driven by an
    /// explicit stack so deep path histories cannot exhaust the call stack.
    pub fn build(
        destination: StampPosition,
        paths: &(impl PathDirectory + ?Sized),
        revisit: SegmentRevisit,
    ) -> Result<Self, SegmentError> {
        let mut segments: HashMap<PathId, Vec<Segment>> = HashMap::new();
        // Every sequence ever issued for a path, so a revisit can be told apart from a cycle.
        let mut visits: HashMap<PathId, Vec<u32>> = HashMap::new();
        let mut next_sequence = 0u32;
        let mut stack = vec![Frame {
            position: destination,
            preceding: SegmentSet::new(),
        }];

        while let Some(frame) = stack.pop() {
            let path = frame.position.path;
            let on_own_chain = visits
                .get(&path)
                .is_some_and(|seqs| seqs.iter().any(|seq| frame.preceding.contains(*seq)));
            if on_own_chain {
                return Err(SegmentError::Cycle(path));
            }

            let sequence = next_sequence;
            next_sequence += 1;
            visits.entry(path).or_default().push(sequence);
            let mut preceding = frame.preceding;
            preceding.insert(sequence);
            let segment = Segment {
                sequence,
                path,
                end_time: frame.position.time,
                preceding: preceding.clone(),
            };

            let chains = segments.entry(path).or_default();
            if let Some(previous) = chains.last() {
                debug!(
                    %path,
                    previous = previous.sequence,
                    ?revisit,
                    "path reached through another chain"
                );
            }
            if revisit == SegmentRevisit::Overwrite {
                chains.clear();
            }
            chains.push(segment);

            for origin in paths.origins_of(path).into_iter().rev() {
                stack.push(Frame {
                    position: origin,
                    preceding: preceding.clone(),
                });
            }
        }

        debug!(
            path = %destination.path,
            time = destination.time,
            paths = segments.len(),
            segments = next_sequence,
            "built segment map"
        );

        Ok(Self {
            destination,
            segments,
        })
    }

    pub fn destination(&self) -> StampPosition {
        self.destination
    }

    /// The segment of the last chain that reached `path`.
    pub fn segment_for(&self, path: PathId) -> Option<&Segment> {
        self.segments.get(&path).and_then(|chains| chains.last())
    }

    /// Every kept segment for `path`, one per chain.
    pub fn segments_for(&self, path: PathId) -> &[Segment] {
        self.segments.get(&path).map_or(&[], Vec::as_slice)
    }

    /// Number of distinct paths visible from the destination.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments ordered by sequence.
    pub fn segments(&self) -> Vec<&Segment> {
        let mut all: Vec<&Segment> = self.segments.values().flatten().collect();
        all.sort_by_key(|segment| segment.sequence);
        all
    }
}
