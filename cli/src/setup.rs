use anyhow::{Context, Result};
use clap::Parser;
use model::Kubectl;

/// The setup subcommand prepares a clean, labeled test namespace. Checks must not run against a
/// namespace this failed to prepare, so a failure exits non-zero.
#[derive(Debug, Parser)]
pub(crate) struct Setup {}

impl Setup {
    pub(crate) fn run(self, kubectl: &Kubectl) -> Result<()> {
        kubectl
            .setup_env()
            .context("Unable to set up the test environment")?;

        println!("Namespace '{}' is ready.", kubectl.namespace());

        Ok(())
    }
}
