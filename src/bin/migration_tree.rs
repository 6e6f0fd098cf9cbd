//! Command-line entry point for building and checking the migration tree.
//!
//! `migration-tree` builds the artifacts for the production dataset;
//! `migration-tree --example` does the same for the signed development
//! fixture.  `fixture` regenerates the fixture ledger and `verify` re-checks a
//! written artifact offline.

use anyhow::Context;
use clap::{Parser, Subcommand};
use migration_tree::commands::{
    build_tree::run_build_tree, create_fixture::run_create_fixture, verify_tree::run_verify_tree,
};
use migration_tree::config::{Dataset, PipelineConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "migration-tree",
    about = "Merkle commitment and redemption signatures for a balance migration",
    version
)]
struct Cli {
    /// Use the development fixture dataset instead of mainnet.
    #[arg(long, global = true)]
    example: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Build the Merkle tree and, when keys are configured, the signatures
    Build,
    /// Generate the fixture ledger from the configured key material
    Fixture,
    /// Re-check a written tree artifact
    Verify,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let dataset = if cli.example {
        Dataset::Example
    } else {
        Dataset::Mainnet
    };
    let config = PipelineConfig::from_env(dataset).context("invalid configuration")?;

    let summary = match cli.command.unwrap_or(Command::Build) {
        Command::Build => run_build_tree(&config).context("tree build failed")?,
        Command::Fixture => run_create_fixture(&config).context("fixture generation failed")?,
        Command::Verify => run_verify_tree(&config).context("verification failed")?,
    };
    println!("{summary}");
    Ok(())
}
