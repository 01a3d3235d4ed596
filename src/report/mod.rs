pub mod json;
pub mod junit;
pub mod types;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::fmt::Write as _;
use std::path::Path;

use crate::runner::state::Verdict;
use types::RunResults;

/// Render the console summary for a completed run.
///
/// Pure over the results envelope: rendering the same results twice yields
/// identical text (the timestamp lives inside the envelope, not here).
pub fn render_console(results: &RunResults) -> String {
    let summary = &results.summary;
    let mut out = String::new();
    let rule = "=".repeat(80);

    let _ = writeln!(out, "\n{rule}");
    let _ = writeln!(out, "RUN SUMMARY");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Target: {}", results.base_url.cyan());
    let _ = writeln!(out, "Run ID: {}", results.run_id);
    let _ = writeln!(out, "Generated: {}", results.generated_at);
    let _ = writeln!(out, "Total Checks: {}", summary.total);
    let _ = writeln!(out, "Passed: {}", summary.passed.to_string().green());
    let _ = writeln!(out, "Failed: {}", summary.failed.to_string().red());
    let _ = writeln!(out, "Skipped: {}", summary.skipped.to_string().yellow());
    let _ = writeln!(out, "Degraded: {}", summary.degraded.to_string().yellow());

    if let Some(rate) = summary.success_rate() {
        let _ = writeln!(out, "Success Rate: {rate:.1}%");
    }

    if !summary.categories.is_empty() {
        let _ = writeln!(out, "\nCATEGORY BREAKDOWN:");
        for category in &summary.categories {
            let counted = category.passed + category.failed;
            let mut line = format!("  {}: {}/{} passed", category.category, category.passed, counted);
            if category.skipped > 0 {
                let _ = write!(line, ", {} skipped", category.skipped);
            }
            if category.degraded > 0 {
                let _ = write!(line, ", {} degraded", category.degraded);
            }
            let _ = writeln!(out, "{line}");
        }
    }

    if summary.failed > 0 {
        let _ = writeln!(out, "\nFAILED CHECKS:");
        for record in results
            .records
            .iter()
            .filter(|r| r.verdict == Verdict::Fail)
        {
            let _ = writeln!(out, "  - {}: {}", record.scenario.red(), record.detail);
        }
    }

    if let Some(latency) = &summary.latency {
        let _ = writeln!(out, "\nPERFORMANCE METRICS:");
        let _ = writeln!(out, "  Average Response Time: {:.2}ms", latency.mean_ms);
        let _ = writeln!(out, "  Fastest Response: {}ms", latency.min_ms);
        let _ = writeln!(out, "  Slowest Response: {}ms", latency.max_ms);
    }

    let _ = writeln!(out, "{rule}");
    out
}

/// Process exit status for a completed run: 0 only with zero failures
pub fn exit_code(results: &RunResults) -> i32 {
    results.summary.exit_code()
}

/// Write results.json and junit.xml under the output directory
pub fn write_reports(results: &RunResults, output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("cannot create output dir {}", output_dir.display()))?;

    json::generate(results, Some(&output_dir.join("results.json")))?;
    junit::write_report(results, output_dir)?;
    Ok(())
}

/// Regenerate a report from a saved results file
pub fn generate_report(results_path: &Path, format: &str, output: Option<&Path>) -> Result<()> {
    let content = std::fs::read_to_string(results_path)
        .with_context(|| format!("Failed to read results: {}", results_path.display()))?;
    let mut results: RunResults =
        serde_json::from_str(&content).context("Failed to parse results JSON")?;
    // Aggregates are derived, never trusted from disk
    results.recompute();

    match format {
        "json" => json::generate(&results, output),
        "junit" => {
            let xml = junit::generate_junit_xml(&results)?;
            match output {
                Some(path) => {
                    std::fs::write(path, xml)?;
                    println!("JUnit report saved to: {}", path.display());
                }
                None => println!("{xml}"),
            }
            Ok(())
        }
        "console" => {
            print!("{}", render_console(&results));
            Ok(())
        }
        _ => bail!("Unknown format: {format}"),
    }
}
