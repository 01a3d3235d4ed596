pub mod context;
pub mod events;
pub mod executor;
pub mod recorder;
pub mod state;

pub use events::{ConsoleEventListener, EventEmitter, RunEvent};
pub use state::{ResultRecord, RunLog, RunReport, Verdict};

use anyhow::{bail, Result};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::driver::{HttpDriver, RequestDriver};
use crate::parser::{collect_suite_files, parse_suite_file, ScenarioSpec, SuiteSpec};
use crate::report::types::RunResults;

/// Load scenario suites from a file or directory; the built-in smoke suite
/// when no path is given
pub fn load_suites(path: Option<&Path>) -> Result<Vec<SuiteSpec>> {
    match path {
        Some(path) => {
            let files = collect_suite_files(path);
            if files.is_empty() {
                bail!("no suite files found under {}", path.display());
            }
            files.iter().map(|file| parse_suite_file(file)).collect()
        }
        None => Ok(vec![crate::suites::builtin_suite()?]),
    }
}

/// Run suites against the configured target and return the completed
/// results envelope
pub async fn run_suites(
    suites: &[SuiteSpec],
    config: &Config,
    categories: Option<&[String]>,
    cancel: Arc<AtomicBool>,
) -> Result<RunResults> {
    let base_url = config.validated_base_url()?;
    let driver = Arc::new(HttpDriver::new(
        base_url,
        Duration::from_millis(config.timeout_ms),
    )?);
    run_suites_with_driver(driver, suites, config, categories, cancel).await
}

/// Same as [`run_suites`] with an injected driver (tests, alternate
/// transports)
pub async fn run_suites_with_driver(
    driver: Arc<dyn RequestDriver>,
    suites: &[SuiteSpec],
    config: &Config,
    categories: Option<&[String]>,
    cancel: Arc<AtomicBool>,
) -> Result<RunResults> {
    let scenarios = select_scenarios(suites, categories);
    if scenarios.is_empty() {
        bail!("no scenarios selected");
    }

    let mut executor = executor::SuiteExecutor::new(driver, config, cancel);
    let run_id = executor.run_id().to_string();
    executor.run(&scenarios).await;
    let records = executor.finish().await;

    Ok(RunResults::new(run_id, config.base_url.clone(), records))
}

/// Flatten suites into one ordered scenario list, honoring a category
/// filter
fn select_scenarios(suites: &[SuiteSpec], categories: Option<&[String]>) -> Vec<ScenarioSpec> {
    let selected = |category: &str| {
        categories.map_or(true, |wanted| wanted.iter().any(|c| c == category))
    };

    suites
        .iter()
        .flat_map(|suite| suite.scenarios.iter())
        .filter(|scenario| selected(&scenario.category))
        .cloned()
        .collect()
}
