/*!

Runs `kubetest` against a real `kind` cluster. These tests need `docker` and `kind` and are only
built with the `integ` feature:

```text
cargo test --features integ
```

!*/

#![cfg(feature = "integ")]

use assert_cmd::Command;
use selftest::{Cluster, TestSettings};
use std::path::Path;
use std::time::{Duration, Instant};

const NODE_READY_TIMEOUT: Duration = Duration::from_secs(120);

fn kubetest(cluster: &Cluster, config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("kubetest").unwrap();
    cmd.env("KUBECONFIG", cluster.kubeconfig())
        .arg("--config")
        .arg(config)
        .arg("--kubectl")
        .arg(TestSettings::kubectl_path());
    cmd
}

#[test]
fn setup_verify_cleanup() {
    let cluster = Cluster::new(TestSettings::cluster_name()).unwrap();
    let start = Instant::now();
    while !cluster.is_node_ready(TestSettings::kubectl_path()).unwrap() {
        assert!(
            start.elapsed() < NODE_READY_TIMEOUT,
            "the kind node never became ready"
        );
        std::thread::sleep(Duration::from_secs(5));
    }

    let dir = tempfile::TempDir::new().unwrap();
    let config = dir.path().join("config.yml");
    let disabled: String = [
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
    ]
    .iter()
    .map(|feature| format!("{}:\n  enabled: false\n", feature))
    .collect();
    std::fs::write(
        &config,
        format!("namespace: kubetest-integ\ntmp_path: {}\n{}", dir.path().display(), disabled),
    )
    .unwrap();

    kubetest(&cluster, &config).arg("setup").assert().success();
    kubetest(&cluster, &config)
        .args(["verify", "--check", "cluster"])
        .assert()
        .success();
    kubetest(&cluster, &config).arg("cleanup").assert().success();
    // A second cleanup finds nothing to delete and still succeeds.
    kubetest(&cluster, &config).arg("cleanup").assert().success();
}
