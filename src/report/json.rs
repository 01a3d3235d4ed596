use anyhow::Result;
use std::path::Path;

use super::types::RunResults;

/// Write (or print) the JSON results envelope
pub fn generate(results: &RunResults, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(results)?;

    if let Some(path) = output {
        std::fs::write(path, json)?;
        println!("JSON report saved to: {}", path.display());
    } else {
        println!("{json}");
    }

    Ok(())
}
