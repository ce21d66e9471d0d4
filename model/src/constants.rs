use std::time::Duration;

// Defaults for values the configuration file may leave out
pub const DEFAULT_NAMESPACE: &str = "kubernetes-testing";
pub const DEFAULT_TMP_PATH: &str = "/tmp";
pub const DEFAULT_KUBECTL: &str = "kubectl";
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "password";
pub const DEFAULT_ISSUER: &str = "lets-encrypt";

// ACME directories
pub const LETS_ENCRYPT_SERVER: &str = "https://acme-v02.api.letsencrypt.org/directory";
pub const LETS_ENCRYPT_STAGING_SERVER: &str =
    "https://acme-staging-v02.api.letsencrypt.org/directory";

// Label applied to the test namespace during setup
pub const LABEL_APP: &str = "app";
pub const LABEL_APP_VALUE: &str = "kubernetes-testing";
pub const LABEL_NAMESPACE_NAME: &str = "namespace.kubernetes.io/name";

// Manifest placeholders
pub const VAR_NAME: &str = "NAME";
pub const VAR_DOMAIN: &str = "DOMAIN";
pub const VAR_NAMESPACE: &str = "NAMESPACE";
pub const VAR_ISSUER: &str = "ISSUER";
pub const VAR_TLS_ENABLED: &str = "TLS_ENABLED";
pub const VAR_STORAGE_CLASS: &str = "STORAGE_CLASS";

/// Rendered manifests are written to `<tmp_path>/MANIFEST_DIR/`.
pub const MANIFEST_DIR: &str = "manifests";

// Native wait and delete bounds handed to the control-plane binary
pub const DEPLOYMENT_WAIT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEPLOYMENT_DELETE_TIMEOUT: Duration = Duration::from_secs(90);
pub const DEPLOYMENT_DELETE_GRACE_PERIOD: Duration = Duration::from_secs(45);
pub const NAMESPACE_DELETE_TIMEOUT: Duration = Duration::from_secs(180);
pub const NAMESPACE_DELETE_GRACE_PERIOD: Duration = Duration::from_secs(60);
