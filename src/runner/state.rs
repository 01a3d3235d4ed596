use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;

/// Verdict for one recorded assertion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    Fail,
    Skip,
    /// Tolerated non-success status (e.g. a 500 from an endpoint pending
    /// backend setup). Reported separately; never counted as PASS or FAIL.
    AcceptedDegraded,
}

impl Verdict {
    /// Whether this verdict counts toward the pass/fail ratio
    pub fn is_counted(self) -> bool {
        matches!(self, Verdict::Pass | Verdict::Fail)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
            Verdict::Skip => "SKIP",
            Verdict::AcceptedDegraded => "DEGRADED",
        };
        write!(f, "{label}")
    }
}

/// One row of the run log. Created by the recorder, never mutated after
/// append.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub scenario: String,
    pub category: String,
    pub verdict: Verdict,
    pub elapsed_ms: u64,
    pub detail: String,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metrics: HashMap<String, f64>,
}

/// Append-only, insertion-ordered record log for one run.
/// Insertion order = chronological = report order.
#[derive(Debug, Default)]
pub struct RunLog {
    records: Vec<ResultRecord>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: ResultRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ResultRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Pass/fail rollup for one category tag
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub category: String,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub degraded: usize,
}

/// Latency statistics over PASS records only
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LatencyStats {
    pub min_ms: u64,
    pub max_ms: u64,
    pub mean_ms: f64,
}

/// Aggregate over all records in a run. Derived, not stored: recomputed
/// from the log at report time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub degraded: usize,
    pub categories: Vec<CategorySummary>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencyStats>,
}

impl RunReport {
    pub fn from_records(records: &[ResultRecord]) -> Self {
        let mut passed = 0;
        let mut failed = 0;
        let mut skipped = 0;
        let mut degraded = 0;
        let mut by_category: BTreeMap<String, CategorySummary> = BTreeMap::new();

        for record in records {
            let entry = by_category
                .entry(record.category.clone())
                .or_insert_with(|| CategorySummary {
                    category: record.category.clone(),
                    passed: 0,
                    failed: 0,
                    skipped: 0,
                    degraded: 0,
                });

            match record.verdict {
                Verdict::Pass => {
                    passed += 1;
                    entry.passed += 1;
                }
                Verdict::Fail => {
                    failed += 1;
                    entry.failed += 1;
                }
                Verdict::Skip => {
                    skipped += 1;
                    entry.skipped += 1;
                }
                Verdict::AcceptedDegraded => {
                    degraded += 1;
                    entry.degraded += 1;
                }
            }
        }

        let pass_times: Vec<u64> = records
            .iter()
            .filter(|r| r.verdict == Verdict::Pass)
            .map(|r| r.elapsed_ms)
            .collect();

        let latency = if pass_times.is_empty() {
            None
        } else {
            let min_ms = pass_times.iter().copied().min().unwrap_or(0);
            let max_ms = pass_times.iter().copied().max().unwrap_or(0);
            let mean_ms = pass_times.iter().sum::<u64>() as f64 / pass_times.len() as f64;
            Some(LatencyStats {
                min_ms,
                max_ms,
                mean_ms,
            })
        };

        Self {
            total: records.len(),
            passed,
            failed,
            skipped,
            degraded,
            categories: by_category.into_values().collect(),
            latency,
        }
    }

    /// Success rate over counted (PASS/FAIL) records; None when nothing
    /// was counted
    pub fn success_rate(&self) -> Option<f64> {
        let counted = self.passed + self.failed;
        if counted == 0 {
            None
        } else {
            Some(self.passed as f64 / counted as f64 * 100.0)
        }
    }

    /// Exit code policy: success only with zero failures
    pub fn exit_code(&self) -> i32 {
        if self.failed == 0 {
            0
        } else {
            1
        }
    }
}
