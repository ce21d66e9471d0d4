use crate::constants::{
    DEFAULT_ADMIN_PASSWORD, DEFAULT_ADMIN_USERNAME, DEFAULT_ISSUER, DEFAULT_KUBECTL,
    DEFAULT_NAMESPACE, DEFAULT_TMP_PATH, LETS_ENCRYPT_SERVER, LETS_ENCRYPT_STAGING_SERVER,
};
use crate::error::{self, Result};
use serde::{Deserialize, Deserializer, Serialize};
use snafu::ResultExt;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// The add-ons (and built-in workloads) whose checks can be switched off in the configuration
/// file.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Feature {
    Deployment,
    Dashboard,
    Grafana,
    Hubble,
    Ingress,
    LetsEncrypt,
    Prometheus,
    Loki,
    Longhorn,
    VcloudCsi,
    Storage,
}

impl Feature {
    pub const ALL: [Feature; 11] = [
        Feature::Deployment,
        Feature::Dashboard,
        Feature::Grafana,
        Feature::Hubble,
        Feature::Ingress,
        Feature::LetsEncrypt,
        Feature::Prometheus,
        Feature::Loki,
        Feature::Longhorn,
        Feature::VcloudCsi,
        Feature::Storage,
    ];

    /// The key of this feature's section in the configuration file.
    pub fn key(&self) -> &'static str {
        match self {
            Feature::Deployment => "deployment",
            Feature::Dashboard => "dashboard",
            Feature::Grafana => "grafana",
            Feature::Hubble => "hubble",
            Feature::Ingress => "ingress",
            Feature::LetsEncrypt => "lets_encrypt",
            Feature::Prometheus => "prometheus",
            Feature::Loki => "loki",
            Feature::Longhorn => "longhorn",
            Feature::VcloudCsi => "vcloud_csi",
            Feature::Storage => "storage",
        }
    }

    /// The namespaces an installed add-on is expected to create.
    pub fn namespaces(&self) -> &'static [&'static str] {
        match self {
            Feature::Dashboard => &["kubernetes-dashboard"],
            Feature::Grafana => &["grafana"],
            Feature::Ingress => &["ingress-nginx"],
            Feature::LetsEncrypt => &["cert-manager"],
            Feature::Prometheus => &["prometheus"],
            Feature::Loki => &["loki", "promtail"],
            Feature::Longhorn => &["longhorn-system"],
            Feature::Deployment | Feature::Hubble | Feature::VcloudCsi | Feature::Storage => &[],
        }
    }
}

impl Display for Feature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self.key(), f)
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct Section {
    enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct Admin {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct LetsEncrypt {
    enabled: Option<bool>,
    issuer: Option<String>,
    server: Option<String>,
    staging_ca: Option<String>,
}

/// Settings shared by every component, read once from a YAML file and then handed to each
/// component that needs it. Keys that are missing, `null` or empty strings fall back to their
/// defaults.
///
/// ```yaml
/// namespace: kubernetes-testing
/// domain: example.com
/// tmp_path: /tmp
/// random_names: true
/// admin:
///   username: admin
///   password: password
/// lets_encrypt:
///   enabled: true
///   issuer: lets-encrypt
///   server: https://acme-staging-v02.api.letsencrypt.org/directory
///   staging_ca: letsencrypt-stg-root-x1.pem
/// longhorn:
///   enabled: false
/// ```
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    tmp_path: Option<String>,
    namespace: Option<String>,
    domain: Option<String>,
    kubectl: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    admin: Admin,
    random_names: Option<bool>,
    #[serde(deserialize_with = "null_as_default")]
    deployment: Section,
    #[serde(deserialize_with = "null_as_default")]
    dashboard: Section,
    #[serde(deserialize_with = "null_as_default")]
    grafana: Section,
    #[serde(deserialize_with = "null_as_default")]
    hubble: Section,
    #[serde(deserialize_with = "null_as_default")]
    ingress: Section,
    #[serde(deserialize_with = "null_as_default")]
    lets_encrypt: LetsEncrypt,
    #[serde(deserialize_with = "null_as_default")]
    prometheus: Section,
    #[serde(deserialize_with = "null_as_default")]
    loki: Section,
    #[serde(deserialize_with = "null_as_default")]
    longhorn: Section,
    #[serde(deserialize_with = "null_as_default")]
    vcloud_csi: Section,
    #[serde(deserialize_with = "null_as_default")]
    storage: Section,
}

impl Config {
    /// Read the configuration from the YAML file at `path`. An empty file yields the defaults.
    pub fn from_path<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).context(error::ConfigReadSnafu { path })?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&text).context(error::ConfigParseSnafu { path })
    }

    /// Scratch directory for rendered manifests.
    pub fn tmp_path(&self) -> PathBuf {
        PathBuf::from(non_empty(&self.tmp_path).unwrap_or(DEFAULT_TMP_PATH))
    }

    /// The namespace test workloads are deployed to, created by setup and deleted by cleanup.
    pub fn namespace(&self) -> &str {
        non_empty(&self.namespace).unwrap_or(DEFAULT_NAMESPACE)
    }

    /// The base domain ingresses are published under. Empty when not configured.
    pub fn domain(&self) -> &str {
        self.domain.as_deref().unwrap_or_default()
    }

    /// Path or name of the `kubectl` binary.
    pub fn kubectl(&self) -> &str {
        non_empty(&self.kubectl).unwrap_or(DEFAULT_KUBECTL)
    }

    pub fn admin_username(&self) -> &str {
        non_empty(&self.admin.username).unwrap_or(DEFAULT_ADMIN_USERNAME)
    }

    pub fn admin_password(&self) -> &str {
        non_empty(&self.admin.password).unwrap_or(DEFAULT_ADMIN_PASSWORD)
    }

    /// Whether scenarios should generate random workload names instead of fixed ones.
    pub fn random_names(&self) -> bool {
        self.random_names.unwrap_or(false)
    }

    /// Whether the checks for `feature` should run. Features are enabled unless switched off.
    pub fn enabled(&self, feature: Feature) -> bool {
        let enabled = match feature {
            Feature::Deployment => self.deployment.enabled,
            Feature::Dashboard => self.dashboard.enabled,
            Feature::Grafana => self.grafana.enabled,
            Feature::Hubble => self.hubble.enabled,
            Feature::Ingress => self.ingress.enabled,
            Feature::LetsEncrypt => self.lets_encrypt.enabled,
            Feature::Prometheus => self.prometheus.enabled,
            Feature::Loki => self.loki.enabled,
            Feature::Longhorn => self.longhorn.enabled,
            Feature::VcloudCsi => self.vcloud_csi.enabled,
            Feature::Storage => self.storage.enabled,
        };
        enabled.unwrap_or(true)
    }

    /// The cert-manager issuer referenced by TLS-enabled manifests.
    pub fn lets_encrypt_issuer(&self) -> &str {
        non_empty(&self.lets_encrypt.issuer).unwrap_or(DEFAULT_ISSUER)
    }

    pub fn lets_encrypt_server(&self) -> &str {
        non_empty(&self.lets_encrypt.server).unwrap_or(LETS_ENCRYPT_SERVER)
    }

    /// `true` when certificates are issued by the staging ACME directory, whose root is not
    /// trusted by default.
    pub fn lets_encrypt_staging(&self) -> bool {
        self.lets_encrypt_server() == LETS_ENCRYPT_STAGING_SERVER
    }

    /// A PEM file with the staging ACME root, trusted by HTTPS probes when
    /// [`Config::lets_encrypt_staging`] is `true`.
    pub fn lets_encrypt_staging_ca(&self) -> Option<&Path> {
        non_empty(&self.lets_encrypt.staging_ca).map(Path::new)
    }

    pub fn with_kubectl<S>(mut self, kubectl: S) -> Self
    where
        S: Into<String>,
    {
        self.kubectl = Some(kubectl.into());
        self
    }

    pub fn with_namespace<S>(mut self, namespace: S) -> Self
    where
        S: Into<String>,
    {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_domain<S>(mut self, domain: S) -> Self
    where
        S: Into<String>,
    {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_tmp_path<P>(mut self, tmp_path: P) -> Self
    where
        P: AsRef<Path>,
    {
        self.tmp_path = Some(tmp_path.as_ref().to_string_lossy().to_string());
        self
    }

    pub fn with_feature(mut self, feature: Feature, enabled: bool) -> Self {
        let section = match feature {
            Feature::Deployment => &mut self.deployment.enabled,
            Feature::Dashboard => &mut self.dashboard.enabled,
            Feature::Grafana => &mut self.grafana.enabled,
            Feature::Hubble => &mut self.hubble.enabled,
            Feature::Ingress => &mut self.ingress.enabled,
            Feature::LetsEncrypt => &mut self.lets_encrypt.enabled,
            Feature::Prometheus => &mut self.prometheus.enabled,
            Feature::Loki => &mut self.loki.enabled,
            Feature::Longhorn => &mut self.longhorn.enabled,
            Feature::VcloudCsi => &mut self.vcloud_csi.enabled,
            Feature::Storage => &mut self.storage.enabled,
        };
        *section = Some(enabled);
        self
    }
}

/// Treat an explicit `null` section (e.g. `admin:` with nothing under it) like a missing one.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod test_configuration {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.tmp_path(), PathBuf::from("/tmp"));
        assert_eq!(config.namespace(), "kubernetes-testing");
        assert_eq!(config.domain(), "");
        assert_eq!(config.kubectl(), "kubectl");
        assert_eq!(config.admin_username(), "admin");
        assert_eq!(config.admin_password(), "password");
        assert!(!config.random_names());
        assert!(Feature::ALL.iter().all(|f| config.enabled(*f)));
        assert_eq!(config.lets_encrypt_issuer(), "lets-encrypt");
        assert!(!config.lets_encrypt_staging());
    }

    #[test]
    fn empty_values_fall_back_to_defaults() {
        let config: Config = serde_yaml::from_str(
            r#"
namespace: ""
tmp_path:
admin:
  username: ""
lets_encrypt:
  issuer: ""
grafana:
"#,
        )
        .unwrap();
        assert_eq!(config.namespace(), "kubernetes-testing");
        assert_eq!(config.tmp_path(), PathBuf::from("/tmp"));
        assert_eq!(config.admin_username(), "admin");
        assert_eq!(config.lets_encrypt_issuer(), "lets-encrypt");
        assert!(config.enabled(Feature::Grafana));
    }

    #[test]
    fn from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
namespace: my-tests
domain: example.com
random_names: true
longhorn:
  enabled: false
lets_encrypt:
  server: https://acme-staging-v02.api.letsencrypt.org/directory
  staging_ca: /etc/kubetest/staging.pem
"#
        )
        .unwrap();
        let config = Config::from_path(file.path()).unwrap();
        assert_eq!(config.namespace(), "my-tests");
        assert_eq!(config.domain(), "example.com");
        assert!(config.random_names());
        assert!(!config.enabled(Feature::Longhorn));
        assert!(config.enabled(Feature::Loki));
        assert!(config.lets_encrypt_staging());
        assert_eq!(
            config.lets_encrypt_staging_ca(),
            Some(Path::new("/etc/kubetest/staging.pem"))
        );
    }

    #[test]
    fn empty_file_is_default() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(Config::from_path(file.path()).unwrap(), Config::default());
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let e = Config::from_path("/definitely/not/here/config.yml").unwrap_err();
        assert_eq!(e.kind(), crate::ErrorKind::Config);
    }

    #[test]
    fn overrides() {
        let config = Config::default()
            .with_kubectl("/opt/bin/kubectl")
            .with_namespace("other")
            .with_feature(Feature::Storage, false);
        assert_eq!(config.kubectl(), "/opt/bin/kubectl");
        assert_eq!(config.namespace(), "other");
        assert!(!config.enabled(Feature::Storage));
    }
}
