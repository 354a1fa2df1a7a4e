//! TOML scenario files for the `stampview` binary.
//!
//! A scenario declares named paths (with origins), named stamps, elements with their versions,
//! and the views (coordinates) to resolve them from:
//!
//! ```toml
//! [[paths]]
//! name = "main"
//!
//! [[paths]]
//! name = "dev"
//! origins = [{ path = "main", time = 100 }]
//!
//! [[stamps]]
//! name = "v1"
//! path = "main"
//! time = 10
//!
//! [[elements]]
//! name = "heart"
//! versions = [{ stamp = "v1", value = "Heart structure" }]
//!
//! [[views]]
//! name = "dev, latest"
//! path = "dev"
//! ```
//!
//! Names are resolved to dense ids in declaration order.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::latest::ElementChronology;
use crate::path::{PathError, PathGraph};
use crate::position::{StampCoordinate, StampPosition, StampPrecedence};
use crate::segment::SegmentRevisit;
use crate::stamp::{
    AuthorId, ModuleId, PathId, StampDirectory, StampId, StampStore, Status, Time, LATEST,
};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("cannot read scenario: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed scenario: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown path `{0}`")]
    UnknownPath(String),
    #[error("unknown stamp `{0}`")]
    UnknownStamp(String),
    #[error("`{0}` is declared twice")]
    Duplicate(String),
    #[error(transparent)]
    Path(#[from] PathError),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// How paths reached through several origin chains are flattened.
    #[serde(default)]
    pub revisit: SegmentRevisit,
    #[serde(default)]
    pub paths: Vec<PathConfig>,
    #[serde(default)]
    pub stamps: Vec<StampConfig>,
    #[serde(default)]
    pub retirements: Vec<RetirementConfig>,
    #[serde(default)]
    pub elements: Vec<ElementConfig>,
    #[serde(default)]
    pub views: Vec<ViewConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathConfig {
    pub name: String,
    #[serde(default)]
    pub origins: Vec<OriginConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OriginConfig {
    pub path: String,
    pub time: Time,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StampConfig {
    pub name: String,
    pub path: String,
    pub time: Time,
    #[serde(default = "default_status")]
    pub status: Status,
    #[serde(default = "default_id")]
    pub author: u32,
    #[serde(default = "default_id")]
    pub module: u32,
}

/// Issues the inactive twin of an existing stamp.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetirementConfig {
    pub name: String,
    pub stamp: String,
    pub time: Time,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElementConfig {
    pub name: String,
    pub id: Option<Uuid>,
    #[serde(default)]
    pub versions: Vec<VersionConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VersionConfig {
    pub stamp: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewConfig {
    pub name: String,
    pub path: String,
    #[serde(default = "default_time")]
    pub time: Time,
    #[serde(default = "default_states")]
    pub states: BTreeSet<Status>,
    #[serde(default)]
    pub modules: BTreeSet<u32>,
    #[serde(default)]
    pub precedence: StampPrecedence,
}

fn default_status() -> Status {
    Status::Active
}

fn default_id() -> u32 {
    1
}

fn default_time() -> Time {
    LATEST
}

fn default_states() -> BTreeSet<Status> {
    BTreeSet::from([Status::Active])
}

/// A loaded scenario: populated directories plus the elements and views to resolve.
pub struct Scenario {
    pub revisit: SegmentRevisit,
    pub paths: Arc<PathGraph>,
    pub stamps: Arc<StampStore>,
    pub path_names: BTreeMap<PathId, String>,
    pub elements: Vec<(String, ElementChronology<String>)>,
    pub views: Vec<(String, StampCoordinate)>,
}

impl Scenario {
    pub fn load(file: &Path) -> Result<Self, ScenarioError> {
        let text = std::fs::read_to_string(file)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ScenarioError> {
        let config: ScenarioConfig = toml::from_str(text)?;
        Self::from_config(config)
    }

    pub fn from_config(config: ScenarioConfig) -> Result<Self, ScenarioError> {
        let mut graph = PathGraph::new();
        let mut path_ids: BTreeMap<String, PathId> = BTreeMap::new();
        for (n, path) in config.paths.iter().enumerate() {
            let id = PathId(n as u32 + 1);
            if path_ids.insert(path.name.clone(), id).is_some() {
                return Err(ScenarioError::Duplicate(path.name.clone()));
            }
            graph.add_path(id);
        }
        let path_id = |name: &str| {
            path_ids
                .get(name)
                .copied()
                .ok_or_else(|| ScenarioError::UnknownPath(name.to_string()))
        };
        for path in &config.paths {
            let id = path_id(&path.name)?;
            for origin in &path.origins {
                graph.add_origin(id, StampPosition::new(path_id(&origin.path)?, origin.time))?;
            }
        }

        let stamps = StampStore::new();
        let mut stamp_ids: BTreeMap<String, StampId> = BTreeMap::new();
        for stamp in &config.stamps {
            let id = stamps.issue(
                stamp.status,
                stamp.time,
                AuthorId(stamp.author),
                ModuleId(stamp.module),
                path_id(&stamp.path)?,
            );
            if stamp_ids.insert(stamp.name.clone(), id).is_some() {
                return Err(ScenarioError::Duplicate(stamp.name.clone()));
            }
        }
        for retirement in &config.retirements {
            let original = stamp_ids
                .get(&retirement.stamp)
                .copied()
                .ok_or_else(|| ScenarioError::UnknownStamp(retirement.stamp.clone()))?;
            let id = stamps
                .retired_stamp_for(original, retirement.time)
                .ok_or_else(|| ScenarioError::UnknownStamp(retirement.stamp.clone()))?;
            if stamp_ids.insert(retirement.name.clone(), id).is_some() {
                return Err(ScenarioError::Duplicate(retirement.name.clone()));
            }
        }

        let mut elements = Vec::with_capacity(config.elements.len());
        for element in config.elements {
            let mut chronology = ElementChronology::new(element.id.unwrap_or_else(Uuid::new_v4));
            for version in element.versions {
                let stamp = stamp_ids
                    .get(&version.stamp)
                    .copied()
                    .ok_or_else(|| ScenarioError::UnknownStamp(version.stamp.clone()))?;
                chronology.push(stamp, version.value);
            }
            elements.push((element.name, chronology));
        }

        let mut views = Vec::with_capacity(config.views.len());
        for view in config.views {
            let coordinate = StampCoordinate::new(
                StampPosition::new(path_id(&view.path)?, view.time),
                view.states,
                view.modules.into_iter().map(ModuleId),
                view.precedence,
            );
            views.push((view.name, coordinate));
        }

        let path_names = path_ids.into_iter().map(|(name, id)| (id, name)).collect();
        Ok(Self {
            revisit: config.revisit,
            paths: Arc::new(graph),
            stamps: Arc::new(stamps),
            path_names,
            elements,
            views,
        })
    }

    pub fn path_name(&self, id: PathId) -> String {
        self.path_names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CalculatorCache;

    const SIBLINGS: &str = r#"
        [[paths]]
        name = "p"

        [[paths]]
        name = "q"

        [[paths]]
        name = "release"
        origins = [{ path = "p", time = 100 }, { path = "q", time = 100 }]

        [[stamps]]
        name = "v1"
        path = "p"
        time = 10

        [[stamps]]
        name = "v2"
        path = "p"
        time = 20

        [[stamps]]
        name = "v3"
        path = "q"
        time = 15

        [[retirements]]
        name = "v3-retired"
        stamp = "v3"
        time = 40

        [[elements]]
        name = "heart"
        versions = [
            { stamp = "v1", value = "first" },
            { stamp = "v2", value = "second" },
            { stamp = "v3", value = "divergent" },
        ]

        [[elements]]
        name = "lung"
        versions = [
            { stamp = "v3", value = "created" },
            { stamp = "v3-retired", value = "retired" },
        ]

        [[views]]
        name = "release"
        path = "release"

        [[views]]
        name = "release by time"
        path = "release"
        precedence = "time"
        states = ["active", "inactive"]
    "#;

    #[test]
    fn scenario_resolves_contradictions() {
        let scenario = Scenario::parse(SIBLINGS).expect("valid scenario");
        let cache = CalculatorCache::new(scenario.stamps.clone(), scenario.paths.clone());
        assert_eq!(scenario.views.len(), 2);
        assert_eq!(scenario.path_name(PathId(3)), "release");

        let (_, by_path) = &scenario.views[0];
        let calculator = cache.calculator(by_path).expect("acyclic");
        let (_, heart) = &scenario.elements[0];
        let latest = calculator.latest_version(heart).expect("visible");
        assert_eq!(latest.value().value, "second");
        assert_eq!(latest.contradictions()[0].value, "divergent");

        let (_, lung) = &scenario.elements[1];
        assert!(calculator.latest_version(lung).is_none());

        let (_, by_time) = &scenario.views[1];
        let calculator = cache.calculator(by_time).expect("acyclic");
        let latest = calculator.latest_version(heart).expect("visible");
        assert_eq!(latest.value().value, "second");
        assert!(!latest.is_contradicted());
        let latest = calculator.latest_version(lung).expect("retirement visible");
        assert_eq!(latest.value().value, "retired");
    }

    #[test]
    fn unknown_names_are_rejected() {
        let missing_path = r#"
            [[stamps]]
            name = "v1"
            path = "nowhere"
            time = 1
        "#;
        assert!(matches!(
            Scenario::parse(missing_path),
            Err(ScenarioError::UnknownPath(name)) if name == "nowhere"
        ));

        let cyclic = r#"
            [[paths]]
            name = "a"
            origins = [{ path = "b", time = 1 }]

            [[paths]]
            name = "b"
            origins = [{ path = "a", time = 1 }]
        "#;
        assert!(matches!(
            Scenario::parse(cyclic),
            Err(ScenarioError::Path(PathError::Cycle { .. }))
        ));

        assert!(matches!(
            Scenario::parse("[[views]]\nname = 1"),
            Err(ScenarioError::Parse(_))
        ));
    }
}
