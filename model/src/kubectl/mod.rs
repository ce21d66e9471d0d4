/*!

`Kubectl` drives the cluster through the `kubectl` binary. Every query is issued fresh (nothing
is cached or watched) and structured output is requested as YAML and decoded into [`Resource`]
and [`ResourceList`] values.

!*/

mod env;
mod port_forward;

pub use port_forward::PortForward;

use crate::command::{CommandLine, CommandResult, ProcessRunner, Runner};
use crate::configuration::Config;
use crate::constants::DEPLOYMENT_WAIT_TIMEOUT;
use crate::error::Result;
use crate::manifest::Manifest;
use crate::resource::{Resource, ResourceList};
use crate::Feature;
use log::info;
use std::collections::BTreeMap;
use std::time::Duration;

/// The cluster client. `R` decides how commands are executed; it is [`ProcessRunner`] except in
/// tests.
#[derive(Debug, Clone)]
pub struct Kubectl<R = ProcessRunner> {
    config: Config,
    runner: R,
}

impl Kubectl<ProcessRunner> {
    pub fn new(config: Config) -> Self {
        Self::with_runner(config, ProcessRunner)
    }
}

impl<R> Kubectl<R>
where
    R: Runner,
{
    pub fn with_runner(config: Config, runner: R) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// The test namespace from the configuration.
    pub fn namespace(&self) -> &str {
        self.config.namespace()
    }

    /// Build a `kubectl` invocation with `args`. Output is requested without terminal styling.
    pub fn command<I, S>(&self, args: I) -> CommandLine
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandLine::new(self.config.kubectl())
            .env("TERM", "dumb")
            .args(args)
    }

    /// Run `kubectl` with `args` and return its combined output. See [`Runner::run`] for the
    /// meaning of `allow_failure`.
    pub fn run<I, S>(&self, args: I, allow_failure: bool) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(self
            .runner
            .run(&self.command(args), allow_failure)?
            .output)
    }

    /// Like [`Kubectl::run`] with extra environment variables for the `kubectl` process, e.g.
    /// `KUBECONFIG`.
    pub fn run_with_env<I, S, E, K, V>(&self, args: I, env: E, allow_failure: bool) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        E: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let command = self.command(args).envs(env);
        Ok(self.runner.run(&command, allow_failure)?.output)
    }

    fn query<I, S>(&self, args: I) -> Result<CommandResult>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.runner.run(&self.command(args), false)
    }

    pub fn cluster_info(&self) -> Result<String> {
        self.run(["cluster-info"], false)
    }

    /// `kubectl -n <namespace> get <kind> <name> -o yaml`
    pub fn get_object(&self, kind: &str, name: &str, namespace: &str) -> Result<Resource> {
        let result = self.query(["-n", namespace, "get", kind, name, "-o", "yaml"])?;
        Resource::decode(&result.command, &result.output)
    }

    /// `kubectl -n <namespace> get <kind> -o yaml`
    pub fn get_objects(&self, kind: &str, namespace: &str) -> Result<ResourceList> {
        let result = self.query(["-n", namespace, "get", kind, "-o", "yaml"])?;
        ResourceList::decode(&result.command, &result.output)
    }

    /// `kubectl -n <namespace> get <kind> -l <label> -o yaml`
    pub fn get_objects_by_label(
        &self,
        kind: &str,
        label: &str,
        namespace: &str,
    ) -> Result<ResourceList> {
        let result = self.query(["-n", namespace, "get", kind, "-l", label, "-o", "yaml"])?;
        ResourceList::decode(&result.command, &result.output)
    }

    fn get_cluster_objects(&self, kind: &str) -> Result<ResourceList> {
        let result = self.query(["get", kind, "-o", "yaml"])?;
        ResourceList::decode(&result.command, &result.output)
    }

    pub fn get_namespaces(&self) -> Result<ResourceList> {
        self.get_cluster_objects("namespaces")
    }

    pub fn get_nodes(&self) -> Result<ResourceList> {
        self.get_cluster_objects("nodes")
    }

    pub fn get_deployments(&self, namespace: &str) -> Result<ResourceList> {
        self.get_objects("deploy", namespace)
    }

    pub fn get_pods(&self, namespace: &str) -> Result<ResourceList> {
        self.get_objects("pod", namespace)
    }

    pub fn get_pods_by_label(&self, label: &str, namespace: &str) -> Result<ResourceList> {
        self.get_objects_by_label("pod", label, namespace)
    }

    pub fn get_ingresses(&self, namespace: &str) -> Result<ResourceList> {
        self.get_objects("ingress", namespace)
    }

    pub fn get_certificates(&self, namespace: &str) -> Result<ResourceList> {
        self.get_objects("certificate", namespace)
    }

    /// The `metadata.labels` of one object.
    pub fn get_labels(
        &self,
        kind: &str,
        name: &str,
        namespace: &str,
    ) -> Result<BTreeMap<String, String>> {
        Ok(self.get_object(kind, name, namespace)?.labels())
    }

    /// Block until the deployment reports the `available` condition, or `kubectl` gives up after
    /// `timeout`.
    pub fn wait_for_deployment(&self, name: &str, timeout: Duration, namespace: &str) -> Result<()> {
        self.run(
            [
                "wait".to_string(),
                "--for".to_string(),
                "condition=available".to_string(),
                format!("deploy/{}", name),
                timeout_arg(timeout),
                "-n".to_string(),
                namespace.to_string(),
            ],
            false,
        )
        .map(|_| ())
    }

    /// [`Kubectl::wait_for_deployment`] with the default timeout.
    pub fn wait_for_deployment_default(&self, name: &str, namespace: &str) -> Result<()> {
        self.wait_for_deployment(name, DEPLOYMENT_WAIT_TIMEOUT, namespace)
    }

    /// Block until every replica of the stateful set is updated and ready.
    pub fn wait_for_stateful_set(&self, name: &str, timeout: Duration, namespace: &str) -> Result<()> {
        self.wait_for_rollout(&format!("statefulset/{}", name), timeout, namespace)
    }

    /// Block until the daemon set is rolled out and ready on every scheduled node.
    pub fn wait_for_daemon_set(&self, name: &str, timeout: Duration, namespace: &str) -> Result<()> {
        self.wait_for_rollout(&format!("daemonset/{}", name), timeout, namespace)
    }

    // Stateful sets and daemon sets carry no `available` condition; `rollout status` is the
    // native blocking wait for them.
    fn wait_for_rollout(&self, resource: &str, timeout: Duration, namespace: &str) -> Result<()> {
        self.run(
            [
                "rollout".to_string(),
                "status".to_string(),
                resource.to_string(),
                timeout_arg(timeout),
                "-n".to_string(),
                namespace.to_string(),
            ],
            false,
        )
        .map(|_| ())
    }

    pub fn create_namespace(&self, namespace: &str) -> Result<String> {
        self.run(["create", "namespace", namespace], false)
    }

    pub fn label_namespace(&self, key: &str, value: &str, namespace: &str) -> Result<String> {
        self.run(
            [
                "label".to_string(),
                "namespace".to_string(),
                namespace.to_string(),
                format!("{}={}", key, value),
            ],
            false,
        )
    }

    pub fn delete_namespace(
        &self,
        namespace: &str,
        timeout: Duration,
        grace_period: Duration,
    ) -> Result<String> {
        self.run(
            [
                "delete".to_string(),
                "namespace".to_string(),
                namespace.to_string(),
                timeout_arg(timeout),
                format!("--grace-period={}", grace_period.as_secs()),
                "--wait=true".to_string(),
            ],
            false,
        )
    }

    pub fn delete_deployment(
        &self,
        name: &str,
        namespace: &str,
        timeout: Duration,
        grace_period: Duration,
    ) -> Result<String> {
        self.run(
            [
                "-n".to_string(),
                namespace.to_string(),
                "delete".to_string(),
                "deploy".to_string(),
                name.to_string(),
                timeout_arg(timeout),
                format!("--grace-period={}", grace_period.as_secs()),
                "--wait=true".to_string(),
            ],
            false,
        )
    }

    /// Render `manifest` and `kubectl apply` it. The rendered file is removed afterwards whether
    /// or not the apply succeeded.
    pub fn deploy(&self, manifest: &Manifest) -> Result<String> {
        self.apply_or_delete("apply", manifest)
    }

    /// Render `manifest` and `kubectl delete` what it describes. The rendered file is removed
    /// afterwards whether or not the delete succeeded.
    pub fn delete(&self, manifest: &Manifest) -> Result<String> {
        self.apply_or_delete("delete", manifest)
    }

    fn apply_or_delete(&self, verb: &str, manifest: &Manifest) -> Result<String> {
        let namespace = manifest
            .namespace
            .as_deref()
            .unwrap_or_else(|| self.namespace());
        let template = manifest.template(
            namespace,
            self.config.domain(),
            self.config.lets_encrypt_issuer(),
            self.config.enabled(Feature::LetsEncrypt),
        );
        let rendered = template.render(self.config.tmp_path())?;
        info!(
            "{} '{}' as '{}' in [{}]",
            verb,
            manifest.template.display(),
            manifest.name,
            namespace
        );
        let result = self.run(
            [
                "-n".to_string(),
                namespace.to_string(),
                verb.to_string(),
                "-f".to_string(),
                rendered.path().to_string_lossy().to_string(),
            ],
            false,
        );
        // Removes the rendered file whether or not the command succeeded.
        drop(rendered);
        result
    }

    /// Start `kubectl port-forward <target> <local_port>:<remote_port>` in the background, e.g.
    /// with a target of `service/prometheus-server`.
    ///
    /// This returns as soon as the process has been started. The tunnel may not accept
    /// connections yet; callers should pause before using it.
    pub fn port_forward(
        &self,
        target: &str,
        local_port: u16,
        remote_port: u16,
        namespace: &str,
    ) -> Result<PortForward> {
        let command = self.command([
            "-n".to_string(),
            namespace.to_string(),
            "port-forward".to_string(),
            target.to_string(),
            format!("{}:{}", local_port, remote_port),
        ]);
        let child = self.runner.spawn(&command)?;
        info!(
            "Forwarding localhost:{} to {}:{} in [{}] (pid {})",
            local_port,
            target,
            remote_port,
            namespace,
            child.id()
        );
        Ok(PortForward::new(child, command.to_string(), local_port))
    }

    /// Terminate a port-forward started by [`Kubectl::port_forward`].
    pub fn stop_pid(&self, port_forward: PortForward) -> Result<()> {
        port_forward.stop()
    }
}

fn timeout_arg(timeout: Duration) -> String {
    format!("--timeout={}s", timeout.as_secs())
}
