use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A parsed scenario suite
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteSpec {
    #[serde(default = "default_suite_name", alias = "name")]
    pub suite: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub scenarios: Vec<ScenarioSpec>,
}

fn default_suite_name() -> String {
    "unnamed".to_string()
}

/// One named unit of test behavior: one or more HTTP calls plus assertions.
/// Constructed at run-definition time, executed exactly once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSpec {
    pub name: String,

    /// Grouping tag for the report breakdown
    #[serde(default = "default_category")]
    pub category: String,

    /// Login-style scenario that writes session state. Always scheduled
    /// before session consumers, even in concurrent mode.
    #[serde(default)]
    pub produces_session: bool,

    /// Skipped (no network call) when no session state is available
    #[serde(default)]
    pub requires_session: bool,

    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

fn default_category() -> String {
    "general".to_string()
}

impl ScenarioSpec {
    /// Eligible for concurrent dispatch: touches no shared session state
    pub fn is_session_free(&self) -> bool {
        !self.produces_session && !self.requires_session
    }
}

/// One HTTP call plus its assertion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSpec {
    #[serde(default = "default_method")]
    pub method: String,

    pub path: String,

    #[serde(default)]
    pub body: Option<serde_yaml::Value>,

    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,

    /// Expected status. Always explicit; the harness never guesses an
    /// endpoint's contract.
    #[serde(default = "default_expect")]
    pub expect: u16,

    /// Statuses accepted as a degraded (non-failing, non-passing) outcome,
    /// e.g. 500 from an endpoint that needs backend setup
    #[serde(default)]
    pub tolerate: Vec<u16>,

    /// Response captures: variable name -> dotted body path ("user.id")
    #[serde(default)]
    pub save: Option<HashMap<String, String>>,

    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_expect() -> u16 {
    200
}

impl StepSpec {
    pub fn label(&self) -> String {
        format!("{} {}", self.method.to_uppercase(), self.path)
    }
}
