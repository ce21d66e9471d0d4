use super::{expect_pods_running, pod_name_pattern, Env};
use anyhow::{Context, Result};
use model::{expect_at_least, expect_contains, expect_excludes, wait_until, Manifest};
use std::time::Duration;

const TEMPLATE: &str = "deployment.yml";

/// The template runs this many replicas.
const REPLICAS: usize = 2;

const LISTED_TIMEOUT: Duration = Duration::from_secs(60);
const LISTED_INTERVAL: Duration = Duration::from_secs(10);
const PODS_TIMEOUT: Duration = Duration::from_secs(240);
const PODS_INTERVAL: Duration = Duration::from_secs(15);
const GONE_TIMEOUT: Duration = Duration::from_secs(60);
const GONE_INTERVAL: Duration = Duration::from_secs(5);

/// Deploy a plain workload, check its pods come up, then delete it.
pub(crate) fn run(env: &Env<'_>) -> Result<()> {
    let name = env.workload_name("deployment");
    let manifest = Manifest::new(&name, env.assets.join(TEMPLATE));
    env.kubectl
        .deploy(&manifest)
        .with_context(|| format!("Unable to deploy '{}'", name))?;

    let verified = verify(env, &name);
    let deleted = delete(env, &manifest);
    verified.and(deleted)
}

fn verify(env: &Env<'_>, name: &str) -> Result<()> {
    wait_until_listed(env, name)?;

    env.kubectl
        .wait_for_deployment_default(name, env.namespace())
        .with_context(|| format!("Deployment '{}' never became available", name))?;

    let pattern = pod_name_pattern(name)?;
    let label = format!("app={}", name);
    wait_until(PODS_TIMEOUT, PODS_INTERVAL, || {
        let pods = env.kubectl.get_pods_by_label(&label, env.namespace())?;
        expect_at_least("pod count", pods.len(), REPLICAS)?;
        expect_pods_running(&pods, &pattern)
    })
    .with_context(|| format!("The pods of '{}' are not running", name))
}

/// Poll until the deployment `name` is listed in the test namespace.
pub(crate) fn wait_until_listed(env: &Env<'_>, name: &str) -> Result<()> {
    wait_until(LISTED_TIMEOUT, LISTED_INTERVAL, || {
        let deployments = env.kubectl.get_deployments(env.namespace())?;
        expect_contains("deployments", deployments.names()?, &name)
    })
    .with_context(|| format!("Deployment '{}' is not listed", name))
}

/// Delete what `manifest` created and poll until its deployment is no longer listed.
pub(crate) fn delete(env: &Env<'_>, manifest: &Manifest) -> Result<()> {
    env.kubectl
        .delete(manifest)
        .with_context(|| format!("Unable to delete '{}'", manifest.name))?;
    wait_until(GONE_TIMEOUT, GONE_INTERVAL, || {
        let deployments = env.kubectl.get_deployments(env.namespace())?;
        expect_excludes("deployments", deployments.names()?, &manifest.name.as_str())
    })
    .with_context(|| format!("Deployment '{}' is still listed", manifest.name))
}
