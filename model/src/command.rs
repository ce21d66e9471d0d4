use crate::error::{self, Result};
use log::{debug, trace};
use snafu::{ensure, ResultExt};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::io::Read;
use std::process::{Child, Command, Stdio};

/// A fully specified external command: the program, its arguments and the environment variables
/// to layer over the ambient process environment.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
}

impl CommandLine {
    pub fn new<S>(program: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg<S>(mut self, arg: S) -> Self
    where
        S: Into<String>,
    {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Build a `std::process::Command`. The environment is merged over the inherited one, which
    /// is left untouched.
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).envs(&self.env).stdin(Stdio::null());
        command
    }
}

/// Renders as a shell would show it, e.g. `TERM=dumb kubectl -n ns get pod -o yaml`.
impl Display for CommandLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{}={} ", key, value)?;
        }
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// The captured result of running a [`CommandLine`] to completion.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CommandResult {
    /// The command as displayed in diagnostics.
    pub command: String,
    /// `stdout` and `stderr`, interleaved in the order they were written.
    pub output: String,
    /// The exit code. A process killed by a signal has no code and is reported as `-1`.
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executes external commands. [`ProcessRunner`] is the real implementation; tests substitute
/// their own to run the cluster client without a cluster.
pub trait Runner {
    /// Run `command` to completion. When `allow_failure` is `false` a non-zero exit is returned
    /// as [`ErrorKind::CommandFailed`](crate::ErrorKind::CommandFailed); otherwise the result is
    /// returned whatever the exit code.
    fn run(&self, command: &CommandLine, allow_failure: bool) -> Result<CommandResult>;

    /// Start `command` in the background and return without waiting for it.
    fn spawn(&self, command: &CommandLine) -> Result<Child> {
        command
            .to_command()
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context(error::CommandSpawnSnafu {
                command: command.to_string(),
            })
    }
}

/// Runs commands as child processes of this one, blocking the calling thread until they exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl Runner for ProcessRunner {
    fn run(&self, command_line: &CommandLine, allow_failure: bool) -> Result<CommandResult> {
        let display = command_line.to_string();
        debug!("Running '{}'", display);

        // Both streams share one pipe so the output keeps its original interleaving.
        let (mut reader, writer) = std::io::pipe().context(error::CommandSpawnSnafu {
            command: &display,
        })?;
        let stderr_writer = writer.try_clone().context(error::CommandSpawnSnafu {
            command: &display,
        })?;
        let mut command = command_line.to_command();
        command.stdout(writer).stderr(stderr_writer);
        let mut child = command.spawn().context(error::CommandSpawnSnafu {
            command: &display,
        })?;
        // The `Command` holds our copies of the write end; the read below only sees EOF once
        // they are closed.
        drop(command);

        let mut raw = Vec::new();
        reader
            .read_to_end(&mut raw)
            .context(error::CommandOutputSnafu { command: &display })?;
        let status = child
            .wait()
            .context(error::CommandOutputSnafu { command: &display })?;
        let output = String::from_utf8_lossy(&raw).to_string();
        trace!("Output of '{}':\n{}", display, output);

        let exit_code = status.code().unwrap_or(-1);
        ensure!(
            allow_failure || status.success(),
            error::CommandFailedSnafu {
                command: &display,
                output: &output,
                exit_code,
            }
        );

        Ok(CommandResult {
            command: display,
            output,
            exit_code,
        })
    }
}
