use crate::test_settings::TestSettings;
use anyhow::{format_err, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

pub const KUBECONFIG_FILENAME: &str = "kubeconfig.yaml";

/// Represents a `kind` cluster. The `Drop` trait is implemented deleting the `kind` cluster when it
/// goes out of scope.
#[derive(Debug)]
pub struct Cluster {
    name: String,
    kubeconfig_dir: TempDir,
}

impl Cluster {
    /// Creates a `Cluster` while initializing a kind cluster. If a cluster named `cluster_name`
    /// already exists, it will be deleted.
    pub fn new(cluster_name: &str) -> Result<Cluster> {
        let kubeconfig_dir = TempDir::new()?;
        Self::delete_kind_cluster(cluster_name)?;
        Self::create_kind_cluster(
            cluster_name,
            &kubeconfig_dir.path().join(KUBECONFIG_FILENAME),
        )?;
        Ok(Self {
            name: cluster_name.into(),
            kubeconfig_dir,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the path to the kubeconfig file in the `TempDir` created for the cluster.
    pub fn kubeconfig(&self) -> PathBuf {
        self.kubeconfig_dir.path().join(KUBECONFIG_FILENAME)
    }

    /// Returns `true` once `kubectl get nodes` lists a node whose `Ready` condition is `True`.
    pub fn is_node_ready(&self, kubectl: &str) -> Result<bool> {
        let output = Command::new(kubectl)
            .env("KUBECONFIG", self.kubeconfig())
            .args([
                "get",
                "nodes",
                "-o",
                r#"jsonpath={.items[*].status.conditions[?(@.type=="Ready")].status}"#,
            ])
            .output()
            .with_context(|| format!("unable to run '{}'", kubectl))?;
        Ok(output.status.success() && String::from_utf8_lossy(&output.stdout).contains("True"))
    }

    fn create_kind_cluster(name: &str, kubeconfig: &Path) -> Result<()> {
        let kubeconfig = kubeconfig
            .to_str()
            .ok_or_else(|| format_err!("non utf-8 path '{}'", kubeconfig.to_string_lossy()))?;
        kind(&["--kubeconfig", kubeconfig, "create", "cluster", "--name", name])
    }

    fn delete_kind_cluster(name: &str) -> Result<()> {
        kind(&["delete", "cluster", "--name", name])
    }
}

fn kind(args: &[&str]) -> Result<()> {
    let output = Command::new(TestSettings::kind_path())
        .args(args)
        .output()
        .with_context(|| format!("unable to run '{}'", TestSettings::kind_path()))?;
    if !output.status.success() {
        return Err(format_err!(
            "'kind {}' failed with exit status '{}'\n\n{}\n\n{}",
            args.join(" "),
            output.status.code().unwrap_or(1),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        ));
    }
    Ok(())
}

impl Drop for Cluster {
    fn drop(&mut self) {
        if let Err(e) = Self::delete_kind_cluster(&self.name) {
            eprintln!("unable to delete kind cluster '{}': {}", self.name, e)
        }
    }
}
