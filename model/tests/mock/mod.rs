/*!

A mock [`Runner`] that lets the cluster client be tested without a cluster or a `kubectl`
binary. It records every command line it is given and answers with canned output chosen by
matching the command's arguments.

!*/

use model::{CommandLine, CommandResult, Error, Result, Runner};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

struct Response {
    pattern: String,
    /// Answers in order; the last one repeats.
    answers: VecDeque<(String, i32)>,
}

/// A manifest file as it was on disk while a command referenced it.
#[derive(Debug, Clone)]
pub struct SeenManifest {
    pub path: PathBuf,
    pub contents: String,
}

#[derive(Default)]
pub struct MockRunner {
    responses: RefCell<Vec<Response>>,
    calls: RefCell<Vec<CommandLine>>,
    manifests: RefCell<Vec<SeenManifest>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands whose arguments contain `pattern` with `output`.
    pub fn respond(self, pattern: &str, output: &str) -> Self {
        self.respond_seq(pattern, &[(output, 0)])
    }

    /// Answer commands whose arguments contain `pattern` with `output` and `exit_code`.
    pub fn fail(self, pattern: &str, output: &str, exit_code: i32) -> Self {
        self.respond_seq(pattern, &[(output, exit_code)])
    }

    /// Answer successive matching commands with successive answers, repeating the last one.
    pub fn respond_seq(self, pattern: &str, answers: &[(&str, i32)]) -> Self {
        self.responses.borrow_mut().push(Response {
            pattern: pattern.to_string(),
            answers: answers
                .iter()
                .map(|(output, code)| (output.to_string(), *code))
                .collect(),
        });
        self
    }

    /// The arguments of every command run or spawned so far, space separated.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|command| command.get_args().join(" "))
            .collect()
    }

    pub fn commands(&self) -> Vec<CommandLine> {
        self.calls.borrow().clone()
    }

    pub fn manifests(&self) -> Vec<SeenManifest> {
        self.manifests.borrow().clone()
    }

    fn answer(&self, args: &str) -> (String, i32) {
        let mut responses = self.responses.borrow_mut();
        match responses.iter_mut().find(|r| args.contains(&r.pattern)) {
            Some(response) if response.answers.len() > 1 => {
                response.answers.pop_front().unwrap_or_default()
            }
            Some(response) => response.answers.front().cloned().unwrap_or_default(),
            None => (String::new(), 0),
        }
    }

    fn record_manifest(&self, command: &CommandLine) {
        let args = command.get_args();
        if let Some(i) = args.iter().position(|arg| arg == "-f") {
            if let Some(path) = args.get(i + 1) {
                let path = PathBuf::from(path);
                let contents = std::fs::read_to_string(&path).unwrap_or_default();
                self.manifests
                    .borrow_mut()
                    .push(SeenManifest { path, contents });
            }
        }
    }
}

impl Runner for MockRunner {
    fn run(&self, command: &CommandLine, allow_failure: bool) -> Result<CommandResult> {
        self.calls.borrow_mut().push(command.clone());
        self.record_manifest(command);
        let (output, exit_code) = self.answer(&command.get_args().join(" "));
        if exit_code != 0 && !allow_failure {
            return Err(Error::CommandFailed {
                command: command.to_string(),
                output,
                exit_code,
            });
        }
        Ok(CommandResult {
            command: command.to_string(),
            output,
            exit_code,
        })
    }

    fn spawn(&self, command: &CommandLine) -> Result<Child> {
        self.calls.borrow_mut().push(command.clone());
        Ok(Command::new("sleep")
            .arg("30")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap())
    }
}

/// A list of deployments as `kubectl get deploy -o yaml` prints it.
pub fn deployment_list(names: &[&str]) -> String {
    let mut yaml = String::from("apiVersion: v1\nkind: List\nitems:\n");
    for name in names {
        yaml.push_str(&format!(
            "- apiVersion: apps/v1\n  kind: Deployment\n  metadata:\n    name: {}\n    \
             labels:\n      app: {}\n  status:\n    availableReplicas: 2\n",
            name, name
        ));
    }
    if names.is_empty() {
        yaml = String::from("apiVersion: v1\nkind: List\nitems: []\n");
    }
    yaml
}
