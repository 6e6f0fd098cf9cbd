use crate::config::PipelineConfig;
use crate::pipeline::{run_build, PipelineError};

/// Builds the tree for the configured dataset and returns a printable summary.
pub fn run_build_tree(config: &PipelineConfig) -> Result<String, PipelineError> {
    let summary = run_build(config)?;
    Ok(summary.to_string())
}
