use tokio::sync::broadcast;

use super::state::{ResultRecord, RunReport, Verdict};

/// Run execution events for real-time console updates
#[derive(Debug, Clone)]
pub enum RunEvent {
    RunStarted {
        run_id: String,
        base_url: String,
        scenario_count: usize,
    },
    ScenarioStarted {
        name: String,
        category: String,
    },
    RecordLogged {
        record: ResultRecord,
    },
    ScenarioFinished {
        name: String,
    },
    RunCancelled {
        remaining: usize,
    },
    RunFinished {
        report: RunReport,
    },
    Log {
        message: String,
    },
}

/// Event emitter for broadcasting run events
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<RunEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<RunEvent>) {
        let (sender, receiver) = broadcast::channel(256);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }
}

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::time::Duration as StdDuration;

/// Console event listener printing real-time progress
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<RunEvent>) {
        use indicatif::ProgressDrawTarget;
        use std::io::IsTerminal;

        // Hidden draw target when output is piped, to avoid escape codes
        let multi = if std::io::stdout().is_terminal() {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        // In-flight spinners keyed by scenario name (concurrent mode may
        // have several alive at once)
        let mut spinners: HashMap<String, ProgressBar> = HashMap::new();

        while let Ok(event) = receiver.recv().await {
            match event {
                RunEvent::RunStarted {
                    run_id,
                    base_url,
                    scenario_count,
                } => {
                    // Direct println so the line survives piped output
                    println!(
                        "\n{} Run {} against {} ({} scenarios)",
                        "▶".green().bold(),
                        run_id.cyan(),
                        base_url.cyan(),
                        scenario_count
                    );
                }

                RunEvent::ScenarioStarted { name, category } => {
                    let pb = multi.add(ProgressBar::new_spinner());
                    let style = ProgressStyle::default_spinner()
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .template("    {spinner} {msg}")
                        .unwrap();
                    pb.set_style(style);
                    pb.set_message(format!("{} {}...", name.clone().dimmed(), format!("[{category}]").dimmed()));
                    pb.enable_steady_tick(StdDuration::from_millis(100));
                    spinners.insert(name, pb);
                }

                RunEvent::RecordLogged { record } => {
                    let tag = match record.verdict {
                        Verdict::Pass => "✓".green().to_string(),
                        Verdict::Fail => "✗".red().to_string(),
                        Verdict::Skip => "○".yellow().to_string(),
                        Verdict::AcceptedDegraded => "~".yellow().to_string(),
                    };
                    println!(
                        "    {} [{}] {} - {} ({}ms)",
                        tag,
                        record.verdict,
                        record.scenario,
                        record.detail,
                        record.elapsed_ms
                    );
                }

                RunEvent::ScenarioFinished { name } => {
                    if let Some(pb) = spinners.remove(&name) {
                        pb.finish_and_clear();
                    }
                }

                RunEvent::RunCancelled { remaining } => {
                    println!(
                        "\n{} Run cancelled, {} scenario(s) not executed",
                        "⏹".yellow(),
                        remaining
                    );
                }

                RunEvent::RunFinished { .. } => {
                    // Final summary is rendered by the report module; just
                    // make sure no spinner is left ticking.
                    for (_, pb) in spinners.drain() {
                        pb.finish_and_clear();
                    }
                }

                RunEvent::Log { message } => {
                    multi.println(format!("    {message}")).ok();
                }
            }
        }
    }
}
