//! The path graph: branches of editing history and where they were branched from.
//!
//! Every path has zero or more *origins*. An origin is a [`StampPosition`] on another path: the
//! content of that parent path as of the origin time is visible on the child path. Origins chain,
//! so a path's full history is the recursive closure over its origins.
//!
//! The origin relation must stay acyclic. A cycle would make "as of" questions unanswerable
//! (every path would be its own ancestor), so [`PathGraph::add_origin`] refuses any edge that
//! closes one.

use std::collections::BTreeSet;

use dashmap::DashMap;
use petgraph::algo::has_path_connecting;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::Dfs;
use thiserror::Error;
use tracing::debug;

use crate::position::StampPosition;
use crate::stamp::PathId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// An origin references a path this graph does not know.
    #[error("unknown path {0}")]
    MissingPath(PathId),
    #[error("path {0} cannot originate from itself")]
    SelfOrigin(PathId),
    /// Adding the origin would make `path` its own ancestor.
    #[error("origin {origin} of path {path} would create a cycle")]
    Cycle { path: PathId, origin: PathId },
}

/// Read access to path origins, as consumed by the segment map builder.
pub trait PathDirectory: Send + Sync {
    /// Origins of `path` in the order they were recorded. Unknown paths have no origins.
    fn origins_of(&self, path: PathId) -> Vec<StampPosition>;
}

/// A path and its ordered origins.
#[derive(Debug, Clone)]
pub struct PathNode {
    pub id: PathId,
    pub origins: Vec<StampPosition>,
}

/// In-memory path directory.
///
/// Nodes are paths; an edge points from a path to each of its origin paths, weighted by the
/// origin time. The graph is append-only.
pub struct PathGraph {
    pub graph: StableDiGraph<PathNode, i64>,
    /// Maps path ids to node indices.
    pub index_map: DashMap<PathId, NodeIndex>,
}

impl PathGraph {
    pub fn new() -> Self {
        Self {
            graph: StableDiGraph::new(),
            index_map: DashMap::new(),
        }
    }

    /// Registers a path with no origins. Registering a known path is a no-op.
    pub fn add_path(&mut self, id: PathId) -> NodeIndex {
        if let Some(idx) = self.index_map.get(&id) {
            return *idx;
        }
        let idx = self.graph.add_node(PathNode {
            id,
            origins: Vec::new(),
        });
        self.index_map.insert(id, idx);
        idx
    }

    /// Appends `origin` to the origins of `path`.
    ///
    /// Both paths must already be registered.
    pub fn add_origin(&mut self, path: PathId, origin: StampPosition) -> Result<(), PathError> {
        if path == origin.path {
            return Err(PathError::SelfOrigin(path));
        }
        let path_idx = self.node(path)?;
        let origin_idx = self.node(origin.path)?;

        if has_path_connecting(&self.graph, origin_idx, path_idx, None) {
            return Err(PathError::Cycle {
                path,
                origin: origin.path,
            });
        }

        self.graph.add_edge(path_idx, origin_idx, origin.time);
        self.graph[path_idx].origins.push(origin);
        debug!(%path, origin = %origin.path, time = origin.time, "added path origin");
        Ok(())
    }

    /// Registers `id` and all of its origins in one step.
    pub fn add_path_with_origins(
        &mut self,
        id: PathId,
        origins: impl IntoIterator<Item = StampPosition>,
    ) -> Result<(), PathError> {
        self.add_path(id);
        for origin in origins {
            self.add_origin(id, origin)?;
        }
        Ok(())
    }

    pub fn contains(&self, id: PathId) -> bool {
        self.index_map.contains_key(&id)
    }

    /// Every path reachable through origins from `id`, excluding `id` itself.
    pub fn ancestors_of(&self, id: PathId) -> BTreeSet<PathId> {
        let mut ancestors = BTreeSet::new();
        let Ok(start) = self.node(id) else {
            return ancestors;
        };
        let mut dfs = Dfs::new(&self.graph, start);
        while let Some(idx) = dfs.next(&self.graph) {
            if idx != start {
                ancestors.insert(self.graph[idx].id);
            }
        }
        ancestors
    }

    fn node(&self, id: PathId) -> Result<NodeIndex, PathError> {
        self.index_map
            .get(&id)
            .map(|idx| *idx)
            .ok_or(PathError::MissingPath(id))
    }
}

impl Default for PathGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl PathDirectory for PathGraph {
    fn origins_of(&self, path: PathId) -> Vec<StampPosition> {
        match self.index_map.get(&path) {
            Some(idx) => self.graph[*idx].origins.clone(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(path: u32, time: i64) -> StampPosition {
        StampPosition::new(PathId(path), time)
    }

    #[test]
    fn origins_keep_insertion_order() {
        let mut paths = PathGraph::new();
        for id in 1..=3 {
            paths.add_path(PathId(id));
        }
        paths.add_origin(PathId(1), pos(3, 30)).expect("origin");
        paths.add_origin(PathId(1), pos(2, 20)).expect("origin");

        assert_eq!(paths.origins_of(PathId(1)), vec![pos(3, 30), pos(2, 20)]);
        assert!(paths.origins_of(PathId(99)).is_empty());
    }

    #[test]
    fn cycles_are_rejected() {
        let mut paths = PathGraph::new();
        paths.add_path(PathId(1));
        paths
            .add_path_with_origins(PathId(2), [pos(1, 10)])
            .expect("2 branches from 1");
        paths
            .add_path_with_origins(PathId(3), [pos(2, 20)])
            .expect("3 branches from 2");

        assert_eq!(
            paths.add_origin(PathId(1), pos(3, 30)),
            Err(PathError::Cycle {
                path: PathId(1),
                origin: PathId(3)
            })
        );
        assert_eq!(
            paths.add_origin(PathId(1), pos(1, 30)),
            Err(PathError::SelfOrigin(PathId(1)))
        );
        assert_eq!(
            paths.add_origin(PathId(1), pos(7, 30)),
            Err(PathError::MissingPath(PathId(7)))
        );
        assert!(paths.origins_of(PathId(1)).is_empty());
    }

    #[test]
    fn ancestors_are_transitive() {
        let mut paths = PathGraph::new();
        paths.add_path(PathId(1));
        paths
            .add_path_with_origins(PathId(2), [pos(1, 10)])
            .expect("origin");
        paths
            .add_path_with_origins(PathId(3), [pos(2, 20)])
            .expect("origin");
        paths.add_path(PathId(4));

        assert_eq!(
            paths.ancestors_of(PathId(3)),
            BTreeSet::from([PathId(1), PathId(2)])
        );
        assert!(paths.ancestors_of(PathId(1)).is_empty());
        assert!(paths.contains(PathId(4)));
        assert!(paths.ancestors_of(PathId(42)).is_empty());
    }
}
