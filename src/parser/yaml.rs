use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::types::{ScenarioSpec, SuiteSpec};

/// Parse a YAML suite file into a SuiteSpec
pub fn parse_suite_file(path: &Path) -> Result<SuiteSpec> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let mut suite = parse_suite_content(&content)
        .with_context(|| format!("Failed to parse suite: {}", path.display()))?;

    if suite.suite == "unnamed" {
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            suite.suite = stem.to_string();
        }
    }
    Ok(suite)
}

/// Parse YAML content into a SuiteSpec. Accepts either a full suite map or
/// a bare scenario list.
pub fn parse_suite_content(content: &str) -> Result<SuiteSpec> {
    let suite = match serde_yaml::from_str::<SuiteSpec>(content) {
        Ok(suite) => suite,
        Err(map_err) => match serde_yaml::from_str::<Vec<ScenarioSpec>>(content) {
            Ok(scenarios) => SuiteSpec {
                suite: "unnamed".to_string(),
                description: None,
                scenarios,
            },
            Err(_) => return Err(map_err).context("Invalid suite YAML"),
        },
    };

    validate(&suite)?;
    Ok(suite)
}

/// Structural validation: names unique within the suite, no empty scenarios
fn validate(suite: &SuiteSpec) -> Result<()> {
    let mut seen = HashSet::new();
    for scenario in &suite.scenarios {
        if scenario.name.trim().is_empty() {
            bail!("scenario with empty name in suite '{}'", suite.suite);
        }
        if !seen.insert(scenario.name.as_str()) {
            bail!(
                "duplicate scenario name '{}' in suite '{}'",
                scenario.name,
                suite.suite
            );
        }
        if scenario.steps.is_empty() {
            bail!(
                "scenario '{}' in suite '{}' has no steps",
                scenario.name,
                suite.suite
            );
        }
    }
    Ok(())
}

/// Collect suite files from a path: the file itself, or every .yaml/.yml
/// under a directory
pub fn collect_suite_files(path: &Path) -> Vec<PathBuf> {
    if !path.is_dir() {
        return vec![path.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map_or(false, |ext| ext == "yaml" || ext == "yml")
        })
        .map(|e| e.path().to_path_buf())
        .collect();

    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUITE: &str = r#"
suite: auth-smoke
description: authentication surface
scenarios:
  - name: signup-missing-fields
    category: auth
    steps:
      - method: POST
        path: /api/auth/signup
        body: {}
        expect: 400
  - name: trinity-miracles
    category: god-tier
    steps:
      - method: POST
        path: /api/trinity/miracles
        body:
          miracle_type: workflow_optimization
        tolerate: [500]
"#;

    #[test]
    fn parses_full_suite_map() {
        let suite = parse_suite_content(SUITE).unwrap();
        assert_eq!(suite.suite, "auth-smoke");
        assert_eq!(suite.scenarios.len(), 2);

        let signup = &suite.scenarios[0];
        assert_eq!(signup.category, "auth");
        assert_eq!(signup.steps[0].expect, 400);

        let trinity = &suite.scenarios[1];
        assert_eq!(trinity.steps[0].expect, 200);
        assert_eq!(trinity.steps[0].tolerate, vec![500]);
    }

    #[test]
    fn parses_bare_scenario_list() {
        let content = r#"
- name: health-check
  steps:
    - path: /api/health
"#;
        let suite = parse_suite_content(content).unwrap();
        assert_eq!(suite.suite, "unnamed");
        assert_eq!(suite.scenarios.len(), 1);
    }

    #[test]
    fn rejects_duplicate_scenario_names() {
        let content = r#"
scenarios:
  - name: twin
    steps:
      - path: /a
  - name: twin
    steps:
      - path: /b
"#;
        let err = parse_suite_content(content).unwrap_err();
        assert!(err.to_string().contains("duplicate scenario name"));
    }

    #[test]
    fn rejects_stepless_scenarios() {
        let content = "scenarios:\n  - name: hollow\n";
        assert!(parse_suite_content(content).is_err());
    }
}
