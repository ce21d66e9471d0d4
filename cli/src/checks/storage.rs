use super::deployment::{delete, wait_until_listed};
use super::{expect_pods_running, pod_name_pattern, Env};
use anyhow::{Context, Result};
use log::info;
use model::{expect_contains, expect_eq, wait_until, Kubectl, Manifest, Resource};
use std::time::Duration;

const TEMPLATE: &str = "deployment-with-pvc.yml";
const MOUNT_PATH: &str = "/var/www";

const DEFAULT_CLASS_ANNOTATION: &str = "storageclass.kubernetes.io/is-default-class";
const BIND_COMPLETED: &str = "pv.kubernetes.io/bind-completed";
const BOUND_BY_CONTROLLER: &str = "pv.kubernetes.io/bound-by-controller";
const STORAGE_PROVISIONER: &str = "volume.kubernetes.io/storage-provisioner";
const PROVISIONED_BY: &str = "pv.kubernetes.io/provisioned-by";

const PODS_TIMEOUT: Duration = Duration::from_secs(240);
const PODS_INTERVAL: Duration = Duration::from_secs(15);
const MOUNT_TIMEOUT: Duration = Duration::from_secs(60);
const MOUNT_INTERVAL: Duration = Duration::from_secs(15);
const BOUND_TIMEOUT: Duration = Duration::from_secs(240);
const BOUND_INTERVAL: Duration = Duration::from_secs(15);

/// Deploy a workload with a persistent volume claim, check the volume is provisioned, bound and
/// mounted, then delete it.
pub(crate) fn run(env: &Env<'_>) -> Result<()> {
    let storage_class = match env.storage_class {
        Some(storage_class) => storage_class.to_string(),
        None => default_storage_class(env.kubectl)?,
    };
    let name = env.workload_name("storage");
    info!("Claiming a volume of storage class '{}'", storage_class);
    let manifest =
        Manifest::new(&name, env.assets.join(TEMPLATE)).storage_class(storage_class.as_str());
    env.kubectl
        .deploy(&manifest)
        .with_context(|| format!("Unable to deploy '{}'", name))?;

    let verified = verify(env, &name);
    let deleted = delete(env, &manifest);
    verified.and(deleted)
}

fn default_storage_class(kubectl: &Kubectl) -> Result<String> {
    let classes = kubectl
        .get_objects("storageclass", kubectl.namespace())
        .context("Unable to list storage classes")?;
    let default = classes
        .iter()
        .find(|class| {
            class
                .str_at(&["metadata", "annotations", DEFAULT_CLASS_ANNOTATION])
                .ok()
                == Some("true")
        })
        .context("The cluster has no default storage class, pass one with --storage-class")?;
    Ok(default.name()?.to_string())
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
        expect_eq("pod count", pods.len(), 1_usize)?;
        expect_pods_running(&pods, &pattern)
    })
    .with_context(|| format!("The pod of '{}' is not running", name))?;

    wait_until(MOUNT_TIMEOUT, MOUNT_INTERVAL, || {
        let pods = env.kubectl.get_pods_by_label(&label, env.namespace())?;
        for pod in &pods {
            let containers = pod.resources_at(&["spec", "containers"])?;
            expect_eq("container count", containers.len(), 1_usize)?;
            let mounts = containers[0].resources_at(&["volumeMounts"])?;
            let paths = mounts
                .iter()
                .map(|mount| mount.str_at(&["mountPath"]))
                .collect::<Result<Vec<_>, _>>()?;
            expect_contains("mount paths", paths, &MOUNT_PATH)?;
        }
        Ok(())
    })
    .with_context(|| format!("The volume of '{}' is not mounted", name))?;

    wait_until(BOUND_TIMEOUT, BOUND_INTERVAL, || {
        let claim = env.kubectl.get_object("pvc", name, env.namespace())?;
        let volume = expect_claim_bound(&claim, name)?;
        let pv = env.kubectl.get_object("pv", volume, env.namespace())?;
        expect_volume_matches_claim(&pv, &claim, name)
    })
    .with_context(|| format!("The claim of '{}' is not bound", name))
}

/// Returns the name of the volume the claim is bound to.
fn expect_claim_bound<'a>(claim: &'a Resource, name: &str) -> model::Result<&'a str> {
    expect_eq("claim name", claim.name()?, name)?;
    expect_eq(
        BIND_COMPLETED,
        claim.str_at(&["metadata", "annotations", BIND_COMPLETED])?,
        "yes",
    )?;
    expect_eq(
        BOUND_BY_CONTROLLER,
        claim.str_at(&["metadata", "annotations", BOUND_BY_CONTROLLER])?,
        "yes",
    )?;
    claim.str_at(&["spec", "storageClassName"])?;
    expect_eq("claim phase", claim.str_at(&["status", "phase"])?, "Bound")?;
    Ok(claim.str_at(&["spec", "volumeName"])?)
}

fn expect_volume_matches_claim(pv: &Resource, claim: &Resource, name: &str) -> model::Result<()> {
    let volume = pv.name()?;
    let provisioner = claim.str_at(&["metadata", "annotations", STORAGE_PROVISIONER])?;
    expect_eq(
        &format!("provisioner of '{}'", volume),
        pv.str_at(&["metadata", "annotations", PROVISIONED_BY])?,
        provisioner,
    )?;
    expect_eq(
        &format!("storage class of '{}'", volume),
        pv.str_at(&["spec", "storageClassName"])?,
        claim.str_at(&["spec", "storageClassName"])?,
    )?;
    expect_eq(
        &format!("claim of '{}'", volume),
        pv.str_at(&["spec", "claimRef", "name"])?,
        name,
    )?;
    expect_eq(
        &format!("CSI driver of '{}'", volume),
        pv.str_at(&["spec", "csi", "driver"])?,
        provisioner,
    )?;
    expect_eq(
        &format!("phase of '{}'", volume),
        pv.str_at(&["status", "phase"])?,
        "Bound",
    )
}

#[cfg(test)]
mod test {
    use super::*;

    fn resource(yaml: &str) -> Resource {
        Resource::from_value(serde_yaml::from_str(yaml).unwrap()).unwrap()
    }

    const CLAIM: &str = r#"
metadata:
  name: test-storage
  annotations:
    pv.kubernetes.io/bind-completed: "yes"
    pv.kubernetes.io/bound-by-controller: "yes"
    volume.kubernetes.io/storage-provisioner: driver.longhorn.io
spec:
  storageClassName: longhorn
  volumeName: pvc-0d2c
status:
  phase: Bound
"#;

    const VOLUME: &str = r#"
metadata:
  name: pvc-0d2c
  annotations:
    pv.kubernetes.io/provisioned-by: driver.longhorn.io
spec:
  storageClassName: longhorn
  claimRef:
    name: test-storage
  csi:
    driver: driver.longhorn.io
    volumeHandle: pvc-0d2c
status:
  phase: Bound
"#;

    #[test]
    fn bound_claim_and_matching_volume() {
        let claim = resource(CLAIM);
        let pv = resource(VOLUME);
        assert_eq!(expect_claim_bound(&claim, "test-storage").unwrap(), "pvc-0d2c");
        expect_volume_matches_claim(&pv, &claim, "test-storage").unwrap();
    }

    #[test]
    fn pending_claim_is_retried() {
        let claim = resource(&CLAIM.replace("phase: Bound", "phase: Pending"));
        let e = expect_claim_bound(&claim, "test-storage").unwrap_err();
        assert!(e.is_retryable());
    }

    #[test]
    fn volume_of_another_driver_is_rejected() {
        let claim = resource(CLAIM);
        let pv = resource(&VOLUME.replace("driver: driver.longhorn.io", "driver: other.csi.io"));
        let e = expect_volume_matches_claim(&pv, &claim, "test-storage").unwrap_err();
        assert!(e.to_string().contains("CSI driver of 'pvc-0d2c'"));
    }
}
