use crate::checks::{Check, Env};
use anyhow::{Error, Result};
use clap::Parser;
use log::{error, info};
use model::Kubectl;
use std::path::PathBuf;

/// The verify subcommand runs the built-in checks in order, skipping those whose add-on is
/// disabled in the configuration, and fails if any check failed.
#[derive(Debug, Parser)]
pub(crate) struct Verify {
    /// A check to run [cluster|deployment|storage|prometheus]. May be repeated. All checks run
    /// when none is given.
    #[clap(long = "check")]
    checks: Vec<Check>,

    /// The directory holding the manifest templates.
    #[clap(long, parse(from_os_str), default_value = "assets")]
    assets: PathBuf,

    /// The storage class used by the storage check. The cluster's default class when omitted.
    #[clap(long)]
    storage_class: Option<String>,
}

impl Verify {
    pub(crate) fn run(self, kubectl: &Kubectl) -> Result<()> {
        let checks = if self.checks.is_empty() {
            Check::ALL.to_vec()
        } else {
            self.checks
        };
        let env = Env {
            kubectl,
            assets: &self.assets,
            storage_class: self.storage_class.as_deref(),
        };

        let mut passed = 0;
        let mut skipped = 0;
        let mut failed = Vec::new();
        for check in checks {
            if let Some(feature) = check.feature() {
                if !kubectl.config().enabled(feature) {
                    info!("Skipping '{}', '{}' is disabled", check, feature);
                    skipped += 1;
                    continue;
                }
            }
            info!("Running '{}'", check);
            match check.run(&env) {
                Ok(()) => {
                    info!("'{}' passed", check);
                    passed += 1;
                }
                Err(e) => {
                    error!("'{}' failed: {:?}", check, e);
                    failed.push(check.to_string());
                }
            }
        }

        println!(
            "{} passed, {} failed, {} skipped",
            passed,
            failed.len(),
            skipped
        );
        if !failed.is_empty() {
            return Err(Error::msg(format!(
                "Failed checks: {}",
                failed.join(", ")
            )));
        }
        Ok(())
    }
}
