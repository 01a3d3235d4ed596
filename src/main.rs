use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use api_smoke::config::Config;
use api_smoke::{report, runner, suites};

#[derive(Parser)]
#[command(name = "api-smoke")]
#[command(version = "0.1.0")]
#[command(about = "HTTP API smoke-test harness CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario suite (built-in smoke suite when no path is given)
    Run {
        /// Path to a suite YAML file or a directory of suites
        suite: Option<PathBuf>,

        /// Target base URL
        #[arg(short, long)]
        base_url: Option<String>,

        /// Per-request timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Dispatch session-independent scenarios concurrently
        #[arg(long, default_value = "false")]
        concurrent: bool,

        /// Output directory for reports and artifacts
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write results.json and junit.xml under the output directory
        #[arg(long, default_value = "false")]
        report: bool,

        /// Path to a YAML config file (credentials, base URL, timeout)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Filter scenarios by category (comma-separated)
        #[arg(long, value_delimiter = ',')]
        category: Option<Vec<String>>,
    },

    /// Generate a report from saved run results
    Report {
        /// Path to a results.json produced by `run --report`
        results: PathBuf,

        /// Output format (console, json, junit)
        #[arg(short, long, default_value = "console")]
        format: String,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the built-in smoke scenarios
    Suites,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();
    std::process::exit(execute(cli).await);
}

async fn execute(cli: Cli) -> i32 {
    match cli.command {
        Commands::Run {
            suite,
            base_url,
            timeout,
            concurrent,
            output,
            report,
            config,
            category,
        } => {
            let mut cfg = match Config::load(config.as_deref()) {
                Ok(cfg) => cfg,
                Err(e) => {
                    eprintln!("{} {e}", "✗".red().bold());
                    return 2;
                }
            };

            // CLI flags win over file and environment
            if let Some(url) = base_url {
                cfg.base_url = url;
            }
            if let Some(secs) = timeout {
                cfg.timeout_ms = secs * 1000;
            }
            if concurrent {
                cfg.concurrent = true;
            }
            if let Some(dir) = output {
                cfg.output_dir = dir;
            }

            if let Err(e) = cfg.validated_base_url() {
                eprintln!("{} {e}", "✗".red().bold());
                return 2;
            }

            println!(
                "{} Running smoke scenarios against: {}",
                "▶".green().bold(),
                cfg.base_url.cyan()
            );
            if let Some(ref path) = suite {
                println!("  Suite: {}", path.display().to_string().cyan());
            } else {
                println!("  Suite: {}", "built-in smoke".cyan());
            }
            println!("  Timeout: {}ms", cfg.timeout_ms.to_string().cyan());
            if cfg.concurrent {
                println!("  Concurrent: {}", "Enabled".yellow());
            }
            if let Some(ref categories) = category {
                println!("  Categories: {}", categories.join(", ").yellow());
            }
            if report {
                println!("  Reports: {}", cfg.output_dir.display().to_string().cyan());
            }

            let suites = match runner::load_suites(suite.as_deref()) {
                Ok(suites) => suites,
                Err(e) => {
                    eprintln!("{} {e:#}", "✗".red().bold());
                    return 2;
                }
            };

            let cancel = Arc::new(AtomicBool::new(false));
            let handler_flag = Arc::clone(&cancel);
            if let Err(e) = ctrlc::set_handler(move || {
                println!("\n{} Stopping after the current scenario...", "⏹".yellow());
                handler_flag.store(true, Ordering::SeqCst);
            }) {
                log::warn!("could not install Ctrl+C handler: {e}");
            }

            let results =
                match runner::run_suites(&suites, &cfg, category.as_deref(), cancel).await {
                    Ok(results) => results,
                    Err(e) => {
                        eprintln!("{} run aborted: {e:#}", "✗".red().bold());
                        return 2;
                    }
                };

            if report {
                if let Err(e) = report::write_reports(&results, &cfg.output_dir) {
                    eprintln!("{} failed to write reports: {e:#}", "⚠".yellow());
                }
            }

            print!("{}", report::render_console(&results));
            report::exit_code(&results)
        }

        Commands::Report {
            results,
            format,
            output,
        } => {
            println!(
                "{} Generating {} report from: {}",
                "📊".blue(),
                format.cyan(),
                results.display()
            );
            match report::generate_report(&results, &format, output.as_deref()) {
                Ok(()) => 0,
                Err(e) => {
                    eprintln!("{} {e:#}", "✗".red().bold());
                    2
                }
            }
        }

        Commands::Suites => match suites::builtin_suite() {
            Ok(suite) => {
                println!(
                    "{} {} ({} scenarios)",
                    "▶".green().bold(),
                    suite.suite.cyan(),
                    suite.scenarios.len()
                );
                if let Some(description) = &suite.description {
                    println!("  {description}");
                }
                for scenario in &suite.scenarios {
                    let mut flags = Vec::new();
                    if scenario.produces_session {
                        flags.push("produces session");
                    }
                    if scenario.requires_session {
                        flags.push("requires session");
                    }
                    let flags = if flags.is_empty() {
                        String::new()
                    } else {
                        format!(" ({})", flags.join(", "))
                    };
                    println!(
                        "  [{}] {}{}",
                        scenario.category.yellow(),
                        scenario.name,
                        flags.dimmed()
                    );
                }
                0
            }
            Err(e) => {
                eprintln!("{} {e:#}", "✗".red().bold());
                2
            }
        },
    }
}
