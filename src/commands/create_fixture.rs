use crate::artifact::write_json_atomic;
use crate::config::{ConfigError, PipelineConfig};
use crate::fixture::{generate, FixtureShape, SeededBalances};
use crate::keys::{read_key_file, KeyRing};
use crate::leaf::build_leaves;
use crate::ledger::records_from_entries;
use crate::pipeline::PipelineError;
use tracing::info;

/// Generates the fixture ledger from the configured key material and writes
/// it as the dataset's `balances.json`.
///
/// The ledger is validated the same way a build would load it before
/// anything is written.
pub fn run_create_fixture(config: &PipelineConfig) -> Result<String, PipelineError> {
    let keys_path = config.keys_path.as_ref().ok_or(ConfigError::MissingKeys)?;
    let key_entries = read_key_file(keys_path)?;
    KeyRing::from_entries(&key_entries)?;

    let shape = FixtureShape::default();
    let mut balances = SeededBalances::new(config.fixture_seed);
    let entries = generate(&key_entries, &shape, &mut balances)?;
    build_leaves(records_from_entries(&entries)?)?;

    let output = config.balances_path();
    write_json_atomic(&output, &entries)?;
    info!(
        path = %output.display(),
        accounts = entries.len(),
        seed = config.fixture_seed,
        "fixture ledger written"
    );
    Ok(format!(
        "fixture ledger with {} accounts written to {}",
        entries.len(),
        output.display()
    ))
}
