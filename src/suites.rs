use anyhow::{Context, Result};

use crate::parser::{parse_suite_content, SuiteSpec};

/// The built-in smoke suite, used when `run` is given no suite path.
/// Also serves as the reference example for the suite format.
pub const SMOKE_SUITE_YAML: &str = include_str!("../suites/smoke.yaml");

pub fn builtin_suite() -> Result<SuiteSpec> {
    parse_suite_content(SMOKE_SUITE_YAML).context("built-in smoke suite is invalid")
}
