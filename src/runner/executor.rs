use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use super::context::RunContext;
use super::events::{ConsoleEventListener, EventEmitter, RunEvent};
use super::recorder::Recorder;
use super::state::{ResultRecord, RunLog, RunReport, Verdict};
use crate::config::Config;
use crate::driver::{Outcome, RequestDriver, SessionContext, StepRequest};
use crate::parser::{ScenarioSpec, StepSpec};

/// Executes an ordered scenario list against one target.
///
/// Sequential by default. With `concurrent` enabled, scenarios that touch no
/// session state are dispatched as tasks after the session-dependent prefix
/// completes; the run log is the only shared resource and all appends go
/// through the synchronized recorder.
pub struct SuiteExecutor {
    driver: Arc<dyn RequestDriver>,
    context: RunContext,
    session: SessionContext,
    log: Arc<Mutex<RunLog>>,
    recorder: Recorder,
    emitter: EventEmitter,
    listener: Option<tokio::task::JoinHandle<()>>,
    cancel: Arc<AtomicBool>,
    concurrent: bool,
    run_id: String,
    base_url: String,
}

impl SuiteExecutor {
    pub fn new(driver: Arc<dyn RequestDriver>, config: &Config, cancel: Arc<AtomicBool>) -> Self {
        let (emitter, receiver) = EventEmitter::new();
        let listener = tokio::spawn(ConsoleEventListener::listen(receiver));
        let log = Arc::new(Mutex::new(RunLog::new()));
        let recorder = Recorder::new(Arc::clone(&log), emitter.clone());

        Self {
            driver,
            context: RunContext::new(config),
            session: SessionContext::new(),
            log,
            recorder,
            emitter,
            listener: Some(listener),
            cancel,
            concurrent: config.concurrent,
            run_id: Uuid::new_v4().to_string(),
            base_url: config.base_url.clone(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Execute every scenario, strictly in list order for the sequential
    /// set. Faults never abort the run; cancellation is honored between
    /// scenario boundaries.
    pub async fn run(&mut self, scenarios: &[ScenarioSpec]) {
        self.emitter.emit(RunEvent::RunStarted {
            run_id: self.run_id.clone(),
            base_url: self.base_url.clone(),
            scenario_count: scenarios.len(),
        });

        let (sequential, concurrent): (Vec<&ScenarioSpec>, Vec<&ScenarioSpec>) =
            if self.concurrent {
                scenarios.iter().partition(|s| !s.is_session_free())
            } else {
                (scenarios.iter().collect(), Vec::new())
            };

        for (index, scenario) in sequential.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                self.emitter.emit(RunEvent::RunCancelled {
                    remaining: sequential.len() - index + concurrent.len(),
                });
                return;
            }
            self.run_scenario(scenario).await;
        }

        if concurrent.is_empty() {
            return;
        }
        if self.cancel.load(Ordering::SeqCst) {
            self.emitter.emit(RunEvent::RunCancelled {
                remaining: concurrent.len(),
            });
            return;
        }
        self.run_concurrent(&concurrent).await;
    }

    /// Run one scenario inside a fault boundary: an Err or panic becomes a
    /// single FAIL record and the run moves on.
    async fn run_scenario(&mut self, scenario: &ScenarioSpec) {
        self.emitter.emit(RunEvent::ScenarioStarted {
            name: scenario.name.clone(),
            category: scenario.category.clone(),
        });

        let handle = tokio::spawn(run_scenario_steps(
            Arc::clone(&self.driver),
            scenario.clone(),
            self.context.clone(),
            self.session.clone(),
            self.recorder.clone(),
        ));

        match handle.await {
            Ok(Ok((context, session))) => {
                // Commit captures and session mutations for later scenarios
                self.context = context;
                self.session = session;
            }
            Ok(Err(e)) => {
                self.recorder
                    .crash(&scenario.name, &scenario.category, &format!("{e:#}"));
            }
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    "panic in scenario logic".to_string()
                } else {
                    join_error.to_string()
                };
                self.recorder
                    .crash(&scenario.name, &scenario.category, &message);
            }
        }

        self.emitter.emit(RunEvent::ScenarioFinished {
            name: scenario.name.clone(),
        });
    }

    /// Dispatch session-free scenarios as tasks and join them all. Each task
    /// gets a fresh session (the scenario declared no dependency on session
    /// state, and some probe its absence); mutations are discarded.
    async fn run_concurrent(&self, scenarios: &[&ScenarioSpec]) {
        let mut handles = Vec::with_capacity(scenarios.len());

        for scenario in scenarios {
            let driver = Arc::clone(&self.driver);
            let recorder = self.recorder.clone();
            let emitter = self.emitter.clone();
            let context = self.context.clone();
            let session = SessionContext::new();
            let scenario = (*scenario).clone();

            handles.push(tokio::spawn(async move {
                emitter.emit(RunEvent::ScenarioStarted {
                    name: scenario.name.clone(),
                    category: scenario.category.clone(),
                });
                let name = scenario.name.clone();
                let category = scenario.category.clone();

                if let Err(e) =
                    run_scenario_steps(driver, scenario, context, session, recorder.clone()).await
                {
                    recorder.crash(&name, &category, &format!("{e:#}"));
                }
                emitter.emit(RunEvent::ScenarioFinished { name });
            }));
        }

        let joined = futures::future::join_all(handles).await;
        for (result, scenario) in joined.into_iter().zip(scenarios) {
            if let Err(join_error) = result {
                let message = if join_error.is_panic() {
                    "panic in scenario logic".to_string()
                } else {
                    join_error.to_string()
                };
                self.recorder
                    .crash(&scenario.name, &scenario.category, &message);
            }
        }
    }

    /// Close out the run: emit the final event, wait for the console
    /// listener to drain, and hand back the completed record log.
    pub async fn finish(self) -> Vec<ResultRecord> {
        let Self {
            log,
            recorder,
            emitter,
            listener,
            ..
        } = self;

        let records = log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .records()
            .to_vec();

        emitter.emit(RunEvent::RunFinished {
            report: RunReport::from_records(&records),
        });

        // Dropping every sender closes the channel; the listener drains
        // remaining events and exits.
        drop(recorder);
        drop(emitter);
        if let Some(handle) = listener {
            let _ = handle.await;
        }

        records
    }
}

/// Scenario body: the precondition gate plus each step's call, capture, and
/// assertion. Returns the (possibly mutated) context and session for the
/// executor to commit.
async fn run_scenario_steps(
    driver: Arc<dyn RequestDriver>,
    scenario: ScenarioSpec,
    mut context: RunContext,
    mut session: SessionContext,
    recorder: Recorder,
) -> Result<(RunContext, SessionContext)> {
    if scenario.requires_session && !session.is_authenticated() {
        recorder.skip(
            &scenario.name,
            &scenario.category,
            "no session state available",
        );
        return Ok((context, session));
    }

    for step in &scenario.steps {
        let request = prepare_request(step, &context)?;
        let outcome = driver.call(&request, &mut session).await;

        capture_saves(step, &outcome, &mut context);

        let verdict = recorder.check(&scenario.name, &scenario.category, step, &outcome);
        if verdict == Verdict::Fail {
            // Later steps depend on this one; stop the scenario. The run
            // continues with the next scenario.
            break;
        }
    }

    Ok((context, session))
}

/// Resolve a step descriptor into a wire-ready request
fn prepare_request(step: &StepSpec, context: &RunContext) -> Result<StepRequest> {
    let mut request = StepRequest::new(&step.method, &context.substitute(&step.path));

    if let Some(body) = &step.body {
        request.body = Some(context.substitute_body(body)?);
    }
    if let Some(headers) = &step.headers {
        request.headers = headers
            .iter()
            .map(|(name, value)| (name.clone(), context.substitute(value)))
            .collect();
    }
    request.timeout = step.timeout_ms.map(Duration::from_millis);

    Ok(request)
}

/// Store `save:` captures from a structured response body
fn capture_saves(step: &StepSpec, outcome: &Outcome, context: &mut RunContext) {
    let Some(save) = &step.save else {
        return;
    };
    for (var, path) in save {
        match outcome.field(path) {
            Some(value) => context.set_var(var, &value),
            None => log::warn!("response field '{path}' not found for capture '{var}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Payload;
    use async_trait::async_trait;

    /// Scripted driver standing in for the wire
    struct MockDriver {
        mode: MockMode,
    }

    enum MockMode {
        /// 200 with a decodable body for every call; signin calls also set
        /// a session cookie
        AllOk,
        /// Transport timeout for every call
        AllTimeout,
        /// Panics when the given path is requested, 200 otherwise
        PanicOn(&'static str),
        /// Returns the given status for every call
        Always(u16),
    }

    #[async_trait]
    impl RequestDriver for MockDriver {
        async fn call(&self, request: &StepRequest, session: &mut SessionContext) -> Outcome {
            match &self.mode {
                MockMode::AllOk => {
                    if request.path.contains("signin") {
                        session.absorb_set_cookie("session=mock-token; Path=/");
                    }
                    ok_outcome(200)
                }
                MockMode::AllTimeout => {
                    Outcome::transport("request timeout".to_string(), Duration::from_millis(5))
                }
                MockMode::PanicOn(path) => {
                    if request.path == *path {
                        panic!("scripted failure");
                    }
                    ok_outcome(200)
                }
                MockMode::Always(status) => ok_outcome(*status),
            }
        }
    }

    fn ok_outcome(status: u16) -> Outcome {
        Outcome {
            status: Some(status),
            elapsed: Duration::from_millis(7),
            payload: Payload::Json(serde_json::json!({"success": status < 400})),
            transport_error: None,
        }
    }

    fn scenario(name: &str, path: &str, expect: u16) -> ScenarioSpec {
        ScenarioSpec {
            name: name.to_string(),
            category: "test".to_string(),
            produces_session: false,
            requires_session: false,
            steps: vec![StepSpec {
                method: "GET".to_string(),
                path: path.to_string(),
                body: None,
                headers: None,
                expect,
                tolerate: Vec::new(),
                save: None,
                timeout_ms: None,
            }],
        }
    }

    fn executor(mode: MockMode, concurrent: bool) -> SuiteExecutor {
        let config = Config {
            concurrent,
            ..Config::default()
        };
        SuiteExecutor::new(
            Arc::new(MockDriver { mode }),
            &config,
            Arc::new(AtomicBool::new(false)),
        )
    }

    #[tokio::test]
    async fn all_ok_driver_yields_one_pass_per_scenario() {
        let scenarios: Vec<ScenarioSpec> = (0..5)
            .map(|i| scenario(&format!("scenario-{i}"), "/api/health", 200))
            .collect();

        let mut exec = executor(MockMode::AllOk, false);
        exec.run(&scenarios).await;
        let records = exec.finish().await;

        assert_eq!(records.len(), 5);
        assert!(records.iter().all(|r| r.verdict == Verdict::Pass));
        // Insertion order is chronological list order
        assert_eq!(records[0].scenario, "scenario-0");
        assert_eq!(records[4].scenario, "scenario-4");
    }

    #[tokio::test]
    async fn timeouts_fail_every_scenario_but_run_completes() {
        let scenarios = vec![
            scenario("a", "/api/health", 200),
            scenario("b", "/api/auth/me", 401),
        ];

        let mut exec = executor(MockMode::AllTimeout, false);
        exec.run(&scenarios).await;
        let records = exec.finish().await;

        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record.verdict, Verdict::Fail);
            assert!(record.detail.contains("transport error"), "{}", record.detail);
        }
    }

    #[tokio::test]
    async fn panicking_scenario_yields_one_fail_and_run_continues() {
        let scenarios = vec![
            scenario("before", "/api/health", 200),
            scenario("explosive", "/api/boom", 200),
            scenario("after", "/api/health", 200),
        ];

        let mut exec = executor(MockMode::PanicOn("/api/boom"), false);
        exec.run(&scenarios).await;
        let records = exec.finish().await;

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].verdict, Verdict::Pass);
        assert_eq!(records[1].verdict, Verdict::Fail);
        assert_eq!(records[1].scenario, "explosive");
        assert!(records[1].detail.contains("scenario crashed"));
        assert_eq!(records[2].verdict, Verdict::Pass);
    }

    #[tokio::test]
    async fn session_gate_skips_until_a_producer_ran() {
        let mut needs_session = scenario("me-authenticated", "/api/auth/me", 200);
        needs_session.requires_session = true;

        let mut producer = scenario("demo-signin", "/api/auth/signin", 200);
        producer.produces_session = true;
        producer.steps[0].method = "POST".to_string();

        // Consumer first: skipped. Producer, then consumer again: runs.
        let mut late_consumer = needs_session.clone();
        late_consumer.name = "me-after-signin".to_string();
        let scenarios = vec![needs_session, producer, late_consumer];

        let mut exec = executor(MockMode::AllOk, false);
        exec.run(&scenarios).await;
        let records = exec.finish().await;

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].verdict, Verdict::Skip);
        assert!(records[0].detail.contains("no session state available"));
        assert_eq!(records[1].verdict, Verdict::Pass);
        assert_eq!(records[2].verdict, Verdict::Pass);
    }

    #[tokio::test]
    async fn failed_step_short_circuits_remaining_steps_of_the_scenario() {
        let mut multi = scenario("auth-flow", "/api/auth/signup", 200);
        multi.steps.push(StepSpec {
            method: "GET".to_string(),
            path: "/api/auth/me".to_string(),
            body: None,
            headers: None,
            expect: 200,
            tolerate: Vec::new(),
            save: None,
            timeout_ms: None,
        });

        // Every call returns 500: first step FAILs, second never executes
        let mut exec = executor(MockMode::Always(500), false);
        exec.run(std::slice::from_ref(&multi)).await;
        let records = exec.finish().await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].verdict, Verdict::Fail);
    }

    #[tokio::test]
    async fn concurrent_mode_still_accounts_for_every_scenario() {
        let scenarios: Vec<ScenarioSpec> = (0..8)
            .map(|i| scenario(&format!("independent-{i}"), "/api/health", 200))
            .collect();

        let mut exec = executor(MockMode::AllOk, true);
        exec.run(&scenarios).await;
        let records = exec.finish().await;

        assert_eq!(records.len(), 8);
        assert!(records.iter().all(|r| r.verdict == Verdict::Pass));
    }

    #[tokio::test]
    async fn concurrent_mode_runs_session_scenarios_before_independent_ones() {
        let mut producer = scenario("demo-signin", "/api/auth/signin", 200);
        producer.produces_session = true;
        let mut consumer = scenario("me-authenticated", "/api/auth/me", 200);
        consumer.requires_session = true;
        let scenarios = vec![
            scenario("independent", "/api/health", 200),
            producer,
            consumer,
        ];

        let mut exec = executor(MockMode::AllOk, true);
        exec.run(&scenarios).await;
        let records = exec.finish().await;

        assert_eq!(records.len(), 3);
        // Producer ran before the consumer, so nothing was skipped
        assert!(records.iter().all(|r| r.verdict == Verdict::Pass));
        // Session-bound scenarios come first in the log
        assert_eq!(records[0].scenario, "demo-signin");
        assert_eq!(records[1].scenario, "me-authenticated");
    }

    #[tokio::test]
    async fn pre_set_cancellation_runs_nothing() {
        let scenarios = vec![scenario("a", "/api/health", 200)];
        let config = Config::default();
        let cancel = Arc::new(AtomicBool::new(true));
        let mut exec = SuiteExecutor::new(
            Arc::new(MockDriver {
                mode: MockMode::AllOk,
            }),
            &config,
            cancel,
        );
        exec.run(&scenarios).await;
        let records = exec.finish().await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn saved_fields_flow_into_later_requests() {
        struct CaptureDriver {
            seen: Mutex<Vec<String>>,
        }

        #[async_trait]
        impl RequestDriver for CaptureDriver {
            async fn call(&self, request: &StepRequest, _session: &mut SessionContext) -> Outcome {
                self.seen
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(request.path.clone());
                Outcome {
                    status: Some(200),
                    elapsed: Duration::from_millis(1),
                    payload: Payload::Json(serde_json::json!({"user": {"id": "u-42"}})),
                    transport_error: None,
                }
            }
        }

        let mut sc = scenario("capture", "/api/auth/me", 200);
        sc.steps[0].save = Some(
            [("userId".to_string(), "user.id".to_string())]
                .into_iter()
                .collect(),
        );
        sc.steps.push(StepSpec {
            method: "GET".to_string(),
            path: "/api/users/${userId}".to_string(),
            body: None,
            headers: None,
            expect: 200,
            tolerate: Vec::new(),
            save: None,
            timeout_ms: None,
        });

        let driver = Arc::new(CaptureDriver {
            seen: Mutex::new(Vec::new()),
        });
        let config = Config::default();
        let driver_dyn: Arc<dyn RequestDriver> = driver.clone();
        let mut exec = SuiteExecutor::new(driver_dyn, &config, Arc::new(AtomicBool::new(false)));
        exec.run(std::slice::from_ref(&sc)).await;
        let records = exec.finish().await;

        assert_eq!(records.len(), 2);
        let seen = driver.seen.lock().unwrap();
        assert_eq!(seen[1], "/api/users/u-42");
    }
}
