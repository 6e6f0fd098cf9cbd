//! Run configuration: dataset selection, file locations and overrides.
//!
//! The dataset switch picks a directory under the data root; environment
//! variables override the individual knobs:
//!
//! | variable                 | default                                       |
//! |--------------------------|-----------------------------------------------|
//! | `MIGRATION_DATA_ROOT`    | `./data`                                      |
//! | `MIGRATION_RECIPIENT`    | `0x34A1D3fff3958843C43aD80F30b94c510645C316`  |
//! | `MIGRATION_KEYS`         | `<dataset>/dev-validators.json` (example only) |
//! | `MIGRATION_FIXTURE_SEED` | `0`                                           |

use crate::codec::from_hex_array;
use crate::signing::Recipient;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Data root used when `MIGRATION_DATA_ROOT` is unset.
pub const DEFAULT_DATA_ROOT: &str = "data";
/// Recipient bound into every commitment unless overridden.
pub const DEFAULT_RECIPIENT: &str = "0x34A1D3fff3958843C43aD80F30b94c510645C316";

/// Ledger input file name.
pub const BALANCES_FILE: &str = "balances.json";
/// Full artifact file name.
pub const TREE_RESULT_FILE: &str = "merkle-tree-result.json";
/// Reduced artifact file name.
pub const SIMPLE_TREE_RESULT_FILE: &str = "merkle-tree-result-simple.json";
/// Development key-material file name.
pub const DEV_KEYS_FILE: &str = "dev-validators.json";

/// Environment variable overriding the data root.
pub const ENV_DATA_ROOT: &str = "MIGRATION_DATA_ROOT";
/// Environment variable overriding the recipient.
pub const ENV_RECIPIENT: &str = "MIGRATION_RECIPIENT";
/// Environment variable overriding the key-material path.
pub const ENV_KEYS: &str = "MIGRATION_KEYS";
/// Environment variable overriding the fixture seed.
pub const ENV_FIXTURE_SEED: &str = "MIGRATION_FIXTURE_SEED";

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid recipient '{0}': expected 20 bytes of hex")]
    /// The recipient override is not a 20-byte hex address.
    InvalidRecipient(String),
    #[error("invalid fixture seed '{0}'")]
    /// The seed override is not an unsigned integer.
    InvalidSeed(String),
    #[error("no key material configured; set MIGRATION_KEYS")]
    /// A run that needs key material has no key path.
    MissingKeys,
}

/// Which ledger a run operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    /// Development fixture with signed authorizations.
    Example,
    /// Production snapshot.
    Mainnet,
}

impl Dataset {
    /// Directory name under the data root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Example => "example",
            Self::Mainnet => "mainnet",
        }
    }
}

/// Everything a build, fixture or verify run needs to locate its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Selected dataset.
    pub dataset: Dataset,
    /// Dataset directory holding the ledger and the artifacts.
    pub data_dir: PathBuf,
    /// Recipient bound into commitments.
    pub recipient: Recipient,
    /// Key material; signatures are skipped when `None`.
    pub keys_path: Option<PathBuf>,
    /// Seed for fixture balances.
    pub fixture_seed: u64,
    /// Whether the reduced artifact is written.
    pub emit_simple: bool,
}

impl PipelineConfig {
    /// Defaults for `dataset` under `data_root`.
    pub fn for_dataset(dataset: Dataset, data_root: &Path) -> Self {
        let data_dir = data_root.join(dataset.dir_name());
        let example = dataset == Dataset::Example;
        Self {
            dataset,
            keys_path: example.then(|| data_dir.join(DEV_KEYS_FILE)),
            data_dir,
            recipient: default_recipient(),
            fixture_seed: 0,
            emit_simple: example,
        }
    }

    /// Configuration from the dataset switch and the process environment.
    pub fn from_env(dataset: Dataset) -> Result<Self, ConfigError> {
        Self::from_lookup(dataset, |name| std::env::var(name).ok())
    }

    /// Configuration from the dataset switch and an arbitrary variable source.
    pub fn from_lookup(
        dataset: Dataset,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let root = lookup(ENV_DATA_ROOT)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_ROOT));
        let mut config = Self::for_dataset(dataset, &root);
        if let Some(raw) = lookup(ENV_RECIPIENT) {
            config.recipient = parse_recipient(&raw)?;
        }
        if let Some(path) = lookup(ENV_KEYS) {
            config.keys_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = lookup(ENV_FIXTURE_SEED) {
            config.fixture_seed = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidSeed(raw.clone()))?;
        }
        Ok(config)
    }

    /// Ledger input path.
    pub fn balances_path(&self) -> PathBuf {
        self.data_dir.join(BALANCES_FILE)
    }

    /// Full artifact path.
    pub fn tree_result_path(&self) -> PathBuf {
        self.data_dir.join(TREE_RESULT_FILE)
    }

    /// Reduced artifact path.
    pub fn simple_tree_result_path(&self) -> PathBuf {
        self.data_dir.join(SIMPLE_TREE_RESULT_FILE)
    }
}

/// Parses a `0x`-prefixed 20-byte recipient address.
pub fn parse_recipient(raw: &str) -> Result<Recipient, ConfigError> {
    from_hex_array(raw.trim()).map_err(|_| ConfigError::InvalidRecipient(raw.to_string()))
}

fn default_recipient() -> Recipient {
    // Constant input, checked by `default_recipient_parses`.
    parse_recipient(DEFAULT_RECIPIENT).unwrap_or([0u8; 20])
}
