use super::Env;
use anyhow::{ensure, Context, Result};
use log::info;
use model::Feature;

const CONTROL_PLANE_RUNNING: [&str; 2] = [
    "Kubernetes control plane is running at",
    "Kubernetes master is running",
];
const COREDNS_RUNNING: &str = "CoreDNS is running";

/// The control plane answers and the expected namespaces exist.
pub(crate) fn run(env: &Env<'_>) -> Result<()> {
    let info = env
        .kubectl
        .cluster_info()
        .context("Unable to connect to the cluster")?;
    ensure!(
        CONTROL_PLANE_RUNNING.iter().any(|s| info.contains(s)),
        "The control plane is not reported as running:\n{}",
        info
    );
    ensure!(
        info.contains(COREDNS_RUNNING),
        "CoreDNS is not reported as running:\n{}",
        info
    );

    let namespaces = env
        .kubectl
        .get_namespaces()
        .context("Unable to list namespaces")?;
    let names = namespaces.names()?;
    ensure!(
        names.len() > 1,
        "Expected more than one namespace, got {:?}",
        names
    );
    info!("Found namespaces {:?}", names);

    let missing: Vec<&str> = expected_namespaces(env)
        .into_iter()
        .filter(|expected| !names.contains(expected))
        .collect();
    ensure!(missing.is_empty(), "Missing namespaces {:?}", missing);
    Ok(())
}

fn expected_namespaces<'a>(env: &'a Env<'_>) -> Vec<&'a str> {
    let mut expected = vec!["kube-system", "default", env.namespace()];
    for feature in Feature::ALL {
        if env.config().enabled(feature) {
            expected.extend(feature.namespaces().iter().copied());
        }
    }
    expected
}
