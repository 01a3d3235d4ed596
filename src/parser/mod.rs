pub mod types;
pub mod yaml;

pub use types::{ScenarioSpec, StepSpec, SuiteSpec};
pub use yaml::{collect_suite_files, parse_suite_content, parse_suite_file};
