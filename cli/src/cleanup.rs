use anyhow::Result;
use clap::Parser;
use model::Kubectl;

/// The cleanup subcommand removes the test namespace and its deployments. Failures are logged
/// and never change the exit status.
#[derive(Debug, Parser)]
pub(crate) struct Cleanup {}

impl Cleanup {
    pub(crate) fn run(self, kubectl: &Kubectl) -> Result<()> {
        kubectl.cleanup_env();

        println!("Namespace '{}' was cleaned up.", kubectl.namespace());

        Ok(())
    }
}
