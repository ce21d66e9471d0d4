/*!

Runs the `kubetest` binary against a scripted fake `kubectl`, so these tests need no cluster.

!*/

#![cfg(unix)]

use assert_cmd::Command;
use selftest::FakeKubectl;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const FEATURES: [&str; 11] = [
    "deployment",
    "dashboard",
    "grafana",
    "hubble",
    "ingress",
    "lets_encrypt",
    "prometheus",
    "loki",
    "longhorn",
    "vcloud_csi",
    "storage",
];

const CLUSTER_INFO: &str = "\
Kubernetes control plane is running at https://127.0.0.1:6443
CoreDNS is running at https://127.0.0.1:6443/api/v1/namespaces/kube-system/services/kube-dns:dns/proxy
";

fn namespaces(names: &[&str]) -> String {
    let mut yaml = String::from("apiVersion: v1\nkind: List\nitems:\n");
    for name in names {
        yaml.push_str(&format!(
            "- apiVersion: v1\n  kind: Namespace\n  metadata:\n    name: {}\n  status:\n    \
             phase: Active\n",
            name
        ));
    }
    yaml
}

/// Write a configuration with every add-on disabled except `enabled`.
fn write_config(dir: &TempDir, enabled: &[&str], extra: &str) -> PathBuf {
    let mut config = String::from(extra);
    for feature in FEATURES {
        config.push_str(&format!(
            "{}:\n  enabled: {}\n",
            feature,
            enabled.contains(&feature)
        ));
    }
    let path = dir.path().join("config.yml");
    std::fs::write(&path, config).unwrap();
    path
}

fn kubetest(fake: &FakeKubectl, config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("kubetest").unwrap();
    cmd.env_remove("RUST_LOG")
        .arg("--config")
        .arg(config)
        .arg("--kubectl")
        .arg(fake.path());
    cmd
}

#[test]
fn setup_creates_and_labels_the_namespace() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &[], "");
    let fake = FakeKubectl::builder()
        .respond("get deploy", "apiVersion: v1\nitems: []\nkind: List\n")
        .build()
        .unwrap();

    let output = kubetest(&fake, &config).arg("setup").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout)
        .contains("Namespace 'kubernetes-testing' is ready."));
    assert_eq!(
        fake.calls().unwrap(),
        vec![
            "-n kubernetes-testing get deploy -o yaml",
            "delete namespace kubernetes-testing --timeout=180s --grace-period=60 --wait=true",
            "create namespace kubernetes-testing",
            "label namespace kubernetes-testing app=kubernetes-testing",
            "label namespace kubernetes-testing namespace.kubernetes.io/name=kubernetes-testing",
        ]
    );
}

#[test]
fn setup_failure_exits_non_zero() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &[], "");
    let fake = FakeKubectl::builder()
        .respond_with(
            "create namespace",
            "Error from server (Forbidden): namespaces is forbidden\n",
            1,
        )
        .build()
        .unwrap();

    let output = kubetest(&fake, &config).arg("setup").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unable to set up the test environment"));
    assert!(stderr.contains("Forbidden"));
    assert!(!fake
        .calls()
        .unwrap()
        .iter()
        .any(|call| call.starts_with("label")));
}

#[test]
fn cleanup_always_succeeds() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &[], "");
    let fake = FakeKubectl::builder()
        .respond_with("get deploy", "The connection to the server was refused\n", 1)
        .respond_with(
            "delete namespace",
            "Error from server (NotFound): namespaces \"kubernetes-testing\" not found\n",
            1,
        )
        .build()
        .unwrap();

    let output = kubetest(&fake, &config).arg("cleanup").output().unwrap();
    assert!(output.status.success());
    assert_eq!(fake.calls().unwrap().len(), 2);
}

#[test]
fn cluster_check_passes() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &[], "");
    let fake = FakeKubectl::builder()
        .respond("cluster-info", CLUSTER_INFO)
        .respond(
            "get namespaces",
            &namespaces(&["default", "kube-system", "kubernetes-testing"]),
        )
        .build()
        .unwrap();

    let output = kubetest(&fake, &config)
        .args(["verify", "--check", "cluster"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("1 passed, 0 failed, 0 skipped"));
}

#[test]
fn cluster_check_requires_add_on_namespaces() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &["grafana"], "");
    let fake = FakeKubectl::builder()
        .respond("cluster-info", CLUSTER_INFO)
        .respond(
            "get namespaces",
            &namespaces(&["default", "kube-system", "kubernetes-testing"]),
        )
        .build()
        .unwrap();

    let output = kubetest(&fake, &config)
        .args(["verify", "--check", "cluster"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("0 passed, 1 failed, 0 skipped"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed checks: cluster"));
}

#[test]
fn disabled_checks_are_skipped() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &[], "");
    let fake = FakeKubectl::builder().build().unwrap();

    let output = kubetest(&fake, &config)
        .args(["verify", "--check", "deployment", "--check", "storage"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("0 passed, 0 failed, 2 skipped"));
    assert!(fake.calls().unwrap().is_empty());
}

#[test]
fn unknown_checks_are_rejected() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &[], "");
    let fake = FakeKubectl::builder().build().unwrap();

    let output = kubetest(&fake, &config)
        .args(["verify", "--check", "grafana"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown check 'grafana'"));
}

#[test]
fn kubectl_can_come_from_the_environment() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &[], "namespace: other\n");
    let fake = FakeKubectl::builder().build().unwrap();

    let output = Command::cargo_bin("kubetest")
        .unwrap()
        .env_remove("RUST_LOG")
        .env("KUBETEST_KUBECTL", fake.path())
        .env("KUBETEST_CONFIG", &config)
        .arg("cleanup")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Namespace 'other' was cleaned up."));
    assert_eq!(
        fake.calls().unwrap().last().map(String::as_str),
        Some("delete namespace other --timeout=180s --grace-period=60 --wait=true")
    );
}
