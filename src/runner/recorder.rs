use std::sync::{Arc, Mutex};

use super::events::{EventEmitter, RunEvent};
use super::state::{ResultRecord, RunLog, Verdict};
use crate::driver::Outcome;
use crate::parser::StepSpec;

/// Cap on body excerpts embedded in failure details, to keep reports bounded
const BODY_EXCERPT_MAX: usize = 200;

/// Classifies outcomes into result records and appends them to the shared
/// run log.
///
/// Every method appends exactly one record and never fails; internal faults
/// are downgraded to FAIL records.
#[derive(Clone)]
pub struct Recorder {
    log: Arc<Mutex<RunLog>>,
    emitter: EventEmitter,
}

impl Recorder {
    pub fn new(log: Arc<Mutex<RunLog>>, emitter: EventEmitter) -> Self {
        Self { log, emitter }
    }

    /// Compare an outcome against a step's expectation and record the
    /// verdict
    pub fn check(
        &self,
        scenario: &str,
        category: &str,
        step: &StepSpec,
        outcome: &Outcome,
    ) -> Verdict {
        let label = step.label();

        let (verdict, detail) = if let Some(message) = &outcome.transport_error {
            (Verdict::Fail, format!("{label}: transport error: {message}"))
        } else {
            match outcome.status {
                Some(status) if status == step.expect => (Verdict::Pass, pass_detail(&label, outcome)),
                Some(status) if step.tolerate.contains(&status) => (
                    Verdict::AcceptedDegraded,
                    format!("{label}: HTTP {status} tolerated (endpoint degraded)"),
                ),
                Some(status) => {
                    let excerpt = outcome.excerpt(BODY_EXCERPT_MAX);
                    let detail = if excerpt.is_empty() {
                        format!("{label}: expected {}, got {status}", step.expect)
                    } else {
                        format!("{label}: expected {}, got {status} - {excerpt}", step.expect)
                    };
                    (Verdict::Fail, detail)
                }
                // A driver outcome always carries either a status or a
                // transport error; treat anything else as a fault.
                None => (
                    Verdict::Fail,
                    format!("{label}: no status and no transport error in outcome"),
                ),
            }
        };

        let mut record = ResultRecord {
            scenario: scenario.to_string(),
            category: category.to_string(),
            verdict,
            elapsed_ms: outcome.elapsed_ms(),
            detail,
            metrics: Default::default(),
        };
        if let Some(status) = outcome.status {
            record.metrics.insert("httpStatus".to_string(), f64::from(status));
        }

        self.append(record);
        verdict
    }

    /// Record a SKIP without touching the network
    pub fn skip(&self, scenario: &str, category: &str, reason: &str) {
        self.append(ResultRecord {
            scenario: scenario.to_string(),
            category: category.to_string(),
            verdict: Verdict::Skip,
            elapsed_ms: 0,
            detail: reason.to_string(),
            metrics: Default::default(),
        });
    }

    /// Record an unexpected scenario fault as a single FAIL
    pub fn crash(&self, scenario: &str, category: &str, message: &str) {
        self.append(ResultRecord {
            scenario: scenario.to_string(),
            category: category.to_string(),
            verdict: Verdict::Fail,
            elapsed_ms: 0,
            detail: format!("scenario crashed: {message}"),
            metrics: Default::default(),
        });
    }

    fn append(&self, record: ResultRecord) {
        self.emitter.emit(RunEvent::RecordLogged {
            record: record.clone(),
        });
        // A poisoned lock means a holder panicked mid-append; the log data
        // itself is still usable.
        let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        log.append(record);
    }
}

/// PASS detail: status line plus the response `message` field when present
fn pass_detail(label: &str, outcome: &Outcome) -> String {
    let status = outcome.status.unwrap_or_default();
    match outcome
        .payload
        .as_json()
        .and_then(|body| body.get("message"))
        .and_then(|m| m.as_str())
    {
        Some(message) => format!("{label} -> HTTP {status} - {message}"),
        None => format!("{label} -> HTTP {status}"),
    }
}
