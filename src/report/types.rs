use serde::{Deserialize, Serialize};

use crate::runner::state::{ResultRecord, RunReport};

/// Completed results of one run, as persisted to results.json and consumed
/// by the `report` subcommand.
///
/// The summary is derived from the records; `recompute` re-derives it after
/// deserialization so stored aggregates can never drift from the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResults {
    pub run_id: String,
    pub base_url: String,
    pub records: Vec<ResultRecord>,
    pub summary: RunReport,
    pub generated_at: String,
}

impl RunResults {
    pub fn new(run_id: String, base_url: String, records: Vec<ResultRecord>) -> Self {
        let summary = RunReport::from_records(&records);
        Self {
            run_id,
            base_url,
            records,
            summary,
            generated_at: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        }
    }

    /// Re-derive the summary from the record log
    pub fn recompute(&mut self) {
        self.summary = RunReport::from_records(&self.records);
    }
}
