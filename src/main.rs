//! Stampview demo entrypoint.
//!
//! Loads a TOML scenario (paths, stamps, elements, views), resolves every element from every
//! view and prints the latest version(s). Contradictions are printed as conflicting edits that
//! need review; the engine never picks a winner among them.
//!
//! Usage: `stampview <scenario.toml> [chunk-size]`. Logging follows `RUST_LOG` (default `info`).

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stampview::parallel::latest_stamps_parallel;
use stampview::scenario::Scenario;
use stampview::{CalculatorCache, RelativePositionCalculator, StampId, Version};

const DEFAULT_CHUNK: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let Some(file) = env::args().nth(1).map(PathBuf::from) else {
        bail!("usage: stampview <scenario.toml> [chunk-size]");
    };
    let chunk = env::args()
        .nth(2)
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(DEFAULT_CHUNK);

    let scenario = Scenario::load(&file)
        .with_context(|| format!("loading scenario {}", file.display()))?;
    info!(
        paths = scenario.path_names.len(),
        stamps = scenario.stamps.len(),
        elements = scenario.elements.len(),
        views = scenario.views.len(),
        "scenario loaded"
    );

    let cache = CalculatorCache::new(scenario.stamps.clone(), scenario.paths.clone())
        .with_revisit(scenario.revisit);

    for (view, coordinate) in &scenario.views {
        let calculator = cache
            .calculator(coordinate)
            .with_context(|| format!("building view `{view}`"))?;
        println!(
            "== {view} (path {}, {} visible paths)",
            scenario.path_name(coordinate.destination.path),
            calculator.segments().len()
        );

        for (element, chronology) in &scenario.elements {
            match calculator.latest_version(chronology) {
                None => println!("  {element}: not visible"),
                Some(latest) => {
                    println!(
                        "  {element}: {}",
                        describe(&scenario, &calculator, latest.value())
                    );
                    for conflict in latest.contradictions() {
                        println!(
                            "    conflicting edit, needs review: {}",
                            describe(&scenario, &calculator, conflict)
                        );
                    }
                }
            }

            let stamps: Vec<StampId> = chronology.versions.iter().map(|v| v.stamp).collect();
            let latest = latest_stamps_parallel(calculator.clone(), stamps, chunk).await?;
            let sequential = calculator.latest_stamps(chronology.versions.iter().map(|v| v.stamp));
            if latest != sequential {
                warn!(%element, ?latest, ?sequential, "parallel and sequential reductions disagree");
            }
        }
    }

    info!(
        calculators = cache.len(),
        anomalies = cache.anomalies().count(),
        "done"
    );
    Ok(())
}

fn describe(
    scenario: &Scenario,
    calculator: &RelativePositionCalculator,
    version: &Version<String>,
) -> String {
    match calculator.stamps().stamp(version.stamp) {
        Some(stamp) => format!(
            "{:?} ({:?} on {} at {})",
            version.value,
            stamp.status,
            scenario.path_name(stamp.path),
            stamp.time
        ),
        None => format!("{:?} (unknown {})", version.value, version.stamp),
    }
}
