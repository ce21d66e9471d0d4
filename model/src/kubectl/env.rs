use super::Kubectl;
use crate::command::Runner;
use crate::constants::{
    DEPLOYMENT_DELETE_GRACE_PERIOD, DEPLOYMENT_DELETE_TIMEOUT, LABEL_APP, LABEL_APP_VALUE,
    LABEL_NAMESPACE_NAME, NAMESPACE_DELETE_GRACE_PERIOD, NAMESPACE_DELETE_TIMEOUT,
};
use crate::error::{self, Result};
use log::{info, warn};
use snafu::ResultExt;

impl<R> Kubectl<R>
where
    R: Runner,
{
    /// Prepare a clean test namespace: remove whatever a previous run left behind, then create
    /// the namespace and label it.
    ///
    /// Any failure after the cleanup is returned as
    /// [`ErrorKind::EnvironmentSetup`](crate::ErrorKind::EnvironmentSetup). Nothing should run
    /// against a half-prepared namespace, so callers are expected to terminate on it.
    pub fn setup_env(&self) -> Result<()> {
        self.cleanup_env();

        let namespace = self.namespace();
        info!("Creating namespace [{}]", namespace);
        self.create_namespace(namespace)
            .context(error::EnvironmentSetupSnafu {
                step: "create",
                namespace,
            })?;

        info!("Labelling namespace [{}]", namespace);
        for (key, value) in [(LABEL_APP, LABEL_APP_VALUE), (LABEL_NAMESPACE_NAME, namespace)] {
            self.label_namespace(key, value, namespace)
                .context(error::EnvironmentSetupSnafu {
                    step: "label",
                    namespace,
                })?;
        }
        Ok(())
    }

    /// Delete every deployment in the test namespace, then the namespace itself.
    ///
    /// Each step is attempted regardless of earlier failures and no failure is reported, so this
    /// is safe to call on an already clean cluster.
    pub fn cleanup_env(&self) {
        let namespace = self.namespace();
        info!("Cleaning up namespace [{}]", namespace);

        match self.get_deployments(namespace) {
            Ok(deployments) => {
                for deployment in &deployments {
                    let name = match deployment.name() {
                        Ok(name) => name,
                        Err(e) => {
                            warn!("Skipping deployment without a name: {}", e);
                            continue;
                        }
                    };
                    info!("Deleting deployment '{}'", name);
                    if let Err(e) = self.delete_deployment(
                        name,
                        namespace,
                        DEPLOYMENT_DELETE_TIMEOUT,
                        DEPLOYMENT_DELETE_GRACE_PERIOD,
                    ) {
                        warn!("Unable to delete deployment '{}': {}", name, e);
                    }
                }
            }
            Err(e) => warn!("Unable to list deployments in [{}]: {}", namespace, e),
        }

        info!("Deleting namespace [{}]", namespace);
        if let Err(e) = self.delete_namespace(
            namespace,
            NAMESPACE_DELETE_TIMEOUT,
            NAMESPACE_DELETE_GRACE_PERIOD,
        ) {
            warn!("Unable to delete namespace [{}]: {}", namespace, e);
        }
    }
}
