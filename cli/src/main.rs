/*!

This is the command line interface for preparing a cluster for verification, running the
built-in checks against it and cleaning up afterwards.

!*/

mod checks;
mod cleanup;
mod setup;
mod verify;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Builder;
use log::{debug, LevelFilter};
use model::{Config, Kubectl};
use std::path::{Path, PathBuf};

/// Used when `--config` is not given and the file exists in the working directory.
const DEFAULT_CONFIG: &str = "config.yml";

/// The command line interface for verifying a Kubernetes cluster with `kubectl`.
#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Args {
    /// Set logging verbosity [trace|debug|info|warn|error]. If the environment variable `RUST_LOG`
    /// is present, it overrides the default logging behavior. See https://docs.rs/env_logger/latest
    #[clap(long = "log-level", default_value = "info")]
    log_level: LevelFilter,
    /// Path to the configuration file. Defaults to `config.yml` if it exists.
    #[clap(long, parse(from_os_str), env = "KUBETEST_CONFIG")]
    config: Option<PathBuf>,
    /// Path or name of the `kubectl` binary, overriding the configuration file.
    #[clap(long, env = "KUBETEST_KUBECTL")]
    kubectl: Option<String>,
    /// The test namespace, overriding the configuration file.
    #[clap(long)]
    namespace: Option<String>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Parser)]
enum Command {
    /// Remove leftovers of earlier runs, then create and label the test namespace.
    Setup(setup::Setup),
    /// Delete the test namespace and every deployment in it.
    Cleanup(cleanup::Cleanup),
    /// Run the built-in checks against the cluster.
    Verify(verify::Verify),
}

fn main() {
    let args = Args::parse();
    init_logger(args.log_level);
    if let Err(e) = run(args) {
        eprintln!("{:?}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(kubectl) = args.kubectl {
        config = config.with_kubectl(kubectl);
    }
    if let Some(namespace) = args.namespace {
        config = config.with_namespace(namespace);
    }
    debug!("Using configuration {:?}", config);

    let kubectl = Kubectl::new(config);
    match args.command {
        Command::Setup(setup) => setup.run(&kubectl),
        Command::Cleanup(cleanup) => cleanup.run(&kubectl),
        Command::Verify(verify) => verify.run(&kubectl),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_path(path)
            .with_context(|| format!("Unable to load configuration from '{}'", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => Config::from_path(DEFAULT_CONFIG)
            .with_context(|| format!("Unable to load configuration from '{}'", DEFAULT_CONFIG)),
        None => Ok(Config::default()),
    }
}

/// Initialize the logger with the value passed by `--log-level` (or its default) when the
/// `RUST_LOG` environment variable is not present. If present, the `RUST_LOG` environment variable
/// overrides `--log-level`/`level`.
fn init_logger(level: LevelFilter) {
    match std::env::var(env_logger::DEFAULT_FILTER_ENV).ok() {
        Some(_) => {
            // RUST_LOG exists; env_logger will use it.
            Builder::from_default_env().init();
        }
        None => {
            // RUST_LOG does not exist; use the default log level for this crate and the library.
            Builder::new()
                .filter(Some(env!("CARGO_CRATE_NAME")), level)
                .filter(Some("model"), level)
                .init();
        }
    }
}
