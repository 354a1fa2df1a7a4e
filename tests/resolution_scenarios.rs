//! End-to-end resolution through the public API and the calculator cache.

use std::path::PathBuf;
use std::sync::Arc;

use stampview::scenario::Scenario;
use stampview::{
    AuthorId, CalculatorCache, ElementChronology, ModuleId, PathGraph, PathId, RelativePosition,
    SegmentRevisit, StampCoordinate, StampPosition, StampPrecedence, StampStore, Status,
};
use uuid::Uuid;

const RELEASE: PathId = PathId(1);
const P: PathId = PathId(2);
const Q: PathId = PathId(3);

fn siblings() -> (Arc<PathGraph>, Arc<StampStore>) {
    let mut paths = PathGraph::new();
    paths.add_path(P);
    paths.add_path(Q);
    paths
        .add_path_with_origins(
            RELEASE,
            [StampPosition::new(P, 100), StampPosition::new(Q, 100)],
        )
        .expect("release branches from p and q");
    (Arc::new(paths), Arc::new(StampStore::new()))
}

#[test]
fn branch_edit_is_before_destination_edit() {
    let mut paths = PathGraph::new();
    paths.add_path(Q);
    paths
        .add_path_with_origins(P, [StampPosition::new(Q, 100)])
        .expect("p branches from q");
    let stamps = Arc::new(StampStore::new());
    let a = stamps.issue(Status::Active, 50, AuthorId(1), ModuleId(1), Q);
    let b = stamps.issue(Status::Active, 150, AuthorId(1), ModuleId(1), P);

    let cache = CalculatorCache::new(stamps, Arc::new(paths));
    let calculator = cache
        .calculator(&StampCoordinate::latest_on(P).with_time(200))
        .expect("acyclic");

    assert!(calculator.on_route(a));
    assert!(calculator.on_route(b));
    assert_eq!(calculator.relative_position(a, b), RelativePosition::Before);
}

#[test]
fn sibling_edits_contradict_under_path_precedence_only() {
    let (paths, stamps) = siblings();
    let a = stamps.issue(Status::Active, 10, AuthorId(1), ModuleId(1), P);
    let b = stamps.issue(Status::Active, 20, AuthorId(1), ModuleId(1), Q);
    let cache = CalculatorCache::new(stamps, paths);

    let by_path = StampCoordinate::latest_on(RELEASE).with_time(200);
    let calculator = cache.calculator(&by_path).expect("acyclic");
    assert_eq!(calculator.relative_position(a, b), RelativePosition::Contradiction);
    assert_eq!(calculator.relative_position(b, a), RelativePosition::Contradiction);

    let calculator = cache
        .calculator(&by_path.with_precedence(StampPrecedence::Time))
        .expect("acyclic");
    assert_eq!(calculator.relative_position(a, b), RelativePosition::Before);
    assert_eq!(cache.len(), 2);
}

#[test]
fn equal_tuples_with_different_authors_are_equal() {
    let (paths, stamps) = siblings();
    let a = stamps.issue(Status::Active, 30, AuthorId(1), ModuleId(1), P);
    let b = stamps.issue(Status::Active, 30, AuthorId(2), ModuleId(1), P);
    let cache = CalculatorCache::new(stamps, paths);
    let calculator = cache
        .calculator(&StampCoordinate::latest_on(RELEASE))
        .expect("acyclic");

    assert_eq!(calculator.relative_position(a, a), RelativePosition::Equal);
    assert_eq!(calculator.relative_position(a, b), RelativePosition::Equal);
    assert_eq!(cache.anomalies().count(), 0);

    // Only distinct versions of one element sharing a position count as an anomaly.
    let mut chronology = ElementChronology::new(Uuid::new_v4());
    chronology.push(a, "by author 1");
    chronology.push(b, "by author 2");
    let latest = calculator.latest_version(&chronology).expect("visible");
    assert_eq!(latest.len(), 2);
    assert_eq!(cache.anomalies().count(), 1);
}

#[test]
fn divergent_version_is_a_contradiction_of_the_latest() {
    let (paths, stamps) = siblings();
    let v1 = stamps.issue(Status::Active, 10, AuthorId(1), ModuleId(1), P);
    let v2 = stamps.issue(Status::Active, 20, AuthorId(1), ModuleId(1), P);
    let v3 = stamps.issue(Status::Active, 15, AuthorId(1), ModuleId(1), Q);
    let cache = CalculatorCache::new(stamps, paths);
    let calculator = cache
        .calculator(&StampCoordinate::latest_on(RELEASE))
        .expect("acyclic");

    let mut chronology = ElementChronology::new(Uuid::new_v4());
    chronology.push(v1, "v1");
    chronology.push(v2, "v2");
    chronology.push(v3, "v3");

    let latest = calculator.latest_version(&chronology).expect("visible");
    let (primary, contradictions) = latest.into_parts();
    assert_eq!(primary.stamp, v2);
    assert_eq!(
        contradictions.iter().map(|v| v.stamp).collect::<Vec<_>>(),
        vec![v3]
    );
}

#[test]
fn bundled_release_scenario_loads_and_resolves() {
    let file = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios/release.toml");
    let scenario = Scenario::load(&file).expect("bundled scenario is valid");
    assert_eq!(scenario.revisit, SegmentRevisit::Merge);
    let cache = CalculatorCache::new(scenario.stamps.clone(), scenario.paths.clone())
        .with_revisit(scenario.revisit);

    let find = |name: &str| {
        scenario
            .elements
            .iter()
            .find(|(element, _)| element == name)
            .map(|(_, chronology)| chronology)
            .expect("element declared")
    };
    let (_, release) = &scenario.views[0];
    let calculator = cache.calculator(release).expect("acyclic");

    let main = calculator.segments().segments_for(PathId(1));
    let authoring = calculator.segments().segment_for(PathId(2)).expect("branch");
    let qa = calculator.segments().segment_for(PathId(3)).expect("branch");
    assert_eq!(main.len(), 2, "one segment per chain reaching main");
    assert!(main.iter().any(|chain| chain.is_preceded_by(authoring)));
    assert!(main.iter().any(|chain| chain.is_preceded_by(qa)));

    let heart = calculator.latest_version(find("heart")).expect("visible");
    assert_eq!(heart.value().value, "Hearth");
    assert_eq!(heart.contradictions()[0].value, "Heart structure");

    let aorta = calculator.latest_version(find("aorta"));
    assert!(aorta.is_none(), "primordial content is not active");

    let (_, main_latest) = scenario.views.last().expect("views declared");
    let calculator = cache.calculator(main_latest).expect("acyclic");
    let valve = calculator
        .latest_version(find("heart valve"))
        .expect("retirement visible");
    assert_eq!(
        calculator.stamps().status_for_stamp(valve.value().stamp),
        Some(Status::Inactive)
    );
}
