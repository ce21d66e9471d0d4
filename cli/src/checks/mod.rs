/*!

The built-in verification scenarios. Each one drives the cluster through [`Kubectl`] and polls
with [`wait_until`](model::wait_until) until the cluster reaches the expected state.

!*/

mod cluster;
mod deployment;
mod prometheus;
mod storage;

use anyhow::{Error, Result};
use model::{
    expect_at_least, expect_eq, expect_match, random_name, Config, Feature, Kubectl, ResourceList,
};
use regex::Regex;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum Check {
    Cluster,
    Deployment,
    Storage,
    Prometheus,
}

impl Check {
    pub(crate) const ALL: [Check; 4] = [
        Check::Cluster,
        Check::Deployment,
        Check::Storage,
        Check::Prometheus,
    ];

    /// The add-on a check depends on. The check is skipped when it is disabled.
    pub(crate) fn feature(&self) -> Option<Feature> {
        match self {
            Check::Cluster => None,
            Check::Deployment => Some(Feature::Deployment),
            Check::Storage => Some(Feature::Storage),
            Check::Prometheus => Some(Feature::Prometheus),
        }
    }

    pub(crate) fn run(&self, env: &Env<'_>) -> Result<()> {
        match self {
            Check::Cluster => cluster::run(env),
            Check::Deployment => deployment::run(env),
            Check::Storage => storage::run(env),
            Check::Prometheus => prometheus::run(env),
        }
    }
}

impl FromStr for Check {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Check::ALL
            .iter()
            .find(|check| check.to_string() == s)
            .copied()
            .ok_or_else(|| Error::msg(format!("Unknown check '{}'", s)))
    }
}

impl Display for Check {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Check::Cluster => "cluster",
            Check::Deployment => "deployment",
            Check::Storage => "storage",
            Check::Prometheus => "prometheus",
        };
        Display::fmt(name, f)
    }
}

/// What every check needs.
pub(crate) struct Env<'a> {
    pub(crate) kubectl: &'a Kubectl,
    pub(crate) assets: &'a Path,
    pub(crate) storage_class: Option<&'a str>,
}

impl Env<'_> {
    pub(crate) fn config(&self) -> &Config {
        self.kubectl.config()
    }

    pub(crate) fn namespace(&self) -> &str {
        self.kubectl.namespace()
    }

    /// The name of the workload a check deploys, e.g. `test-deployment`.
    pub(crate) fn workload_name(&self, base: &str) -> String {
        if self.config().random_names() {
            random_name(base)
        } else {
            format!("test-{}", base)
        }
    }
}

/// Matches the names of the pods a workload named `name` owns.
pub(crate) fn pod_name_pattern(name: &str) -> Result<Regex> {
    Ok(Regex::new(&format!("^{}-[-a-z0-9]+$", regex::escape(name)))?)
}

/// Every pod in `pods` is named after its workload, is `Running` and has started all of its
/// containers.
pub(crate) fn expect_pods_running(pods: &ResourceList, pattern: &Regex) -> model::Result<()> {
    for pod in pods {
        let name = pod.name()?;
        expect_match("pod name", name, pattern)?;
        expect_eq(
            &format!("phase of pod '{}'", name),
            pod.str_at(&["status", "phase"])?,
            "Running",
        )?;
        let containers = pod.resources_at(&["status", "containerStatuses"])?;
        expect_at_least(
            &format!("container count of pod '{}'", name),
            containers.len(),
            1,
        )?;
        for container in containers {
            expect_eq(
                &format!("containers of pod '{}' to be started", name),
                container.bool_at(&["started"])?,
                true,
            )?;
        }
    }
    Ok(())
}
