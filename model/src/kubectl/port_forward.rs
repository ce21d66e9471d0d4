use crate::error::{self, Result};
use log::{debug, info, warn};
use snafu::ResultExt;
use std::process::Child;

/// A running `kubectl port-forward` process.
///
/// The process is killed by [`PortForward::stop`], or when the handle is dropped if it was never
/// stopped. Stopping consumes the handle so a tunnel cannot be stopped twice.
#[derive(Debug)]
pub struct PortForward {
    child: Option<Child>,
    pid: u32,
    command: String,
    local_port: u16,
}

impl PortForward {
    pub(crate) fn new(child: Child, command: String, local_port: u16) -> Self {
        Self {
            pid: child.id(),
            child: Some(child),
            command,
            local_port,
        }
    }

    /// The process id of the `kubectl` process.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// `http://127.0.0.1:<local_port>`
    pub fn local_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.local_port)
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Kill the process and wait for it to exit.
    pub fn stop(mut self) -> Result<()> {
        match self.child.take() {
            Some(child) => {
                info!("Stopping port-forward (pid {})", self.pid);
                terminate(child, self.pid)
            }
            None => Ok(()),
        }
    }
}

fn terminate(mut child: Child, pid: u32) -> Result<()> {
    // `kill` fails if the process already exited and was reaped; `wait` still reaps it otherwise.
    if let Err(e) = child.kill() {
        debug!("Unable to kill port-forward (pid {}): {}", pid, e);
    }
    let status = child.wait().context(error::PortForwardStopSnafu { pid })?;
    debug!("Port-forward (pid {}) exited: {}", pid, status);
    Ok(())
}

impl Drop for PortForward {
    fn drop(&mut self) {
        if let Some(child) = self.child.take() {
            if let Err(e) = terminate(child, self.pid) {
                warn!("Unable to stop port-forward '{}': {}", self.command, e);
            }
        }
    }
}
