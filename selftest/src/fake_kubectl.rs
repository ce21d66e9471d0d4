use anyhow::{Context, Result};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tempfile::TempDir;

const SCRIPT_NAME: &str = "kubectl";
const CALLS_LOG: &str = "calls.log";

/// A shell script standing in for `kubectl`.
///
/// Every invocation appends its arguments, space separated, as one line to a log. The output and
/// exit code come from the first response whose pattern is a substring of the arguments; when no
/// pattern matches the script prints nothing and exits `0`. The script and its log live in a
/// temporary directory removed on drop.
#[derive(Debug)]
pub struct FakeKubectl {
    dir: TempDir,
}

#[derive(Debug, Default)]
pub struct FakeKubectlBuilder {
    responses: Vec<Response>,
}

#[derive(Debug)]
struct Response {
    pattern: String,
    output: String,
    exit_code: i32,
}

impl FakeKubectl {
    pub fn builder() -> FakeKubectlBuilder {
        FakeKubectlBuilder::default()
    }

    /// The path to hand to `kubetest` as its `kubectl` binary.
    pub fn path(&self) -> PathBuf {
        self.dir.path().join(SCRIPT_NAME)
    }

    /// The arguments of every invocation so far, oldest first.
    pub fn calls(&self) -> Result<Vec<String>> {
        let log = self.dir.path().join(CALLS_LOG);
        if !log.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&log)
            .with_context(|| format!("unable to read '{}'", log.display()))?;
        Ok(text.lines().map(String::from).collect())
    }
}

impl FakeKubectlBuilder {
    /// Answer invocations whose arguments contain `pattern` with `output` and exit `0`.
    pub fn respond<P, O>(self, pattern: P, output: O) -> Self
    where
        P: Into<String>,
        O: Into<String>,
    {
        self.respond_with(pattern, output, 0)
    }

    /// Answer invocations whose arguments contain `pattern` with `output` and `exit_code`.
    pub fn respond_with<P, O>(mut self, pattern: P, output: O, exit_code: i32) -> Self
    where
        P: Into<String>,
        O: Into<String>,
    {
        self.responses.push(Response {
            pattern: pattern.into(),
            output: output.into(),
            exit_code,
        });
        self
    }

    pub fn build(self) -> Result<FakeKubectl> {
        let dir = TempDir::new()?;
        let mut script = format!(
            "#!/bin/sh\necho \"$*\" >> '{}'\ncase \"$*\" in\n",
            dir.path().join(CALLS_LOG).display()
        );
        for (i, response) in self.responses.iter().enumerate() {
            let output = dir.path().join(format!("response-{}", i));
            std::fs::write(&output, &response.output)
                .with_context(|| format!("unable to write '{}'", output.display()))?;
            script.push_str(&format!(
                "  *\"{}\"*) cat '{}'; exit {} ;;\n",
                escape(&response.pattern),
                output.display(),
                response.exit_code
            ));
        }
        script.push_str("esac\nexit 0\n");

        let path = dir.path().join(SCRIPT_NAME);
        std::fs::write(&path, script)
            .with_context(|| format!("unable to write '{}'", path.display()))?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .with_context(|| format!("unable to make '{}' executable", path.display()))?;
        Ok(FakeKubectl { dir })
    }
}

/// Escape the characters that stay special inside a double-quoted shell word.
fn escape(pattern: &str) -> String {
    pattern
        .chars()
        .flat_map(|c| match c {
            '"' | '$' | '`' | '\\' => vec!['\\', c],
            c => vec![c],
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use std::process::Command;

    #[test]
    fn answers_by_pattern_and_logs_calls() {
        let fake = FakeKubectl::builder()
            .respond("get deploy", "items: []\n")
            .respond_with("create namespace", "AlreadyExists\n", 1)
            .build()
            .unwrap();

        let output = Command::new(fake.path())
            .args(["-n", "ns", "get", "deploy", "-o", "yaml"])
            .output()
            .unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), "items: []\n");

        let output = Command::new(fake.path())
            .args(["create", "namespace", "ns"])
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(1));

        let output = Command::new(fake.path()).arg("version").output().unwrap();
        assert!(output.status.success());
        assert!(output.stdout.is_empty());

        assert_eq!(
            fake.calls().unwrap(),
            vec![
                "-n ns get deploy -o yaml",
                "create namespace ns",
                "version"
            ]
        );
    }

    #[test]
    fn patterns_are_literal() {
        assert_eq!(escape(r#"a "b" $c"#), r#"a \"b\" \$c"#);
    }
}
