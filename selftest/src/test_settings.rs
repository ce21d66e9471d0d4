use serde::Deserialize;

/// Settings for the `integ` tests, read from `KUBETEST_SELFTEST_*` environment variables.
pub struct TestSettings {}

impl TestSettings {
    /// The path or name of the `kind` binary.
    pub(crate) fn kind_path() -> &'static str {
        TEST_SETTINGS.kind_path.as_str()
    }

    /// The path or name of the `kubectl` binary the `integ` tests hand to `kubetest`.
    pub fn kubectl_path() -> &'static str {
        TEST_SETTINGS.kubectl_path.as_str()
    }

    /// The name of the `kind` cluster the `integ` tests create.
    pub fn cluster_name() -> &'static str {
        TEST_SETTINGS.cluster_name.as_str()
    }
}

#[derive(Debug, Deserialize)]
struct Inner {
    /// The path to the [kind] binary, found via `$PATH` by default.
    ///
    /// ```text
    /// KUBETEST_SELFTEST_KIND_PATH=/wherever/kind
    /// ```
    ///
    /// [kind]: https://kind.sigs.k8s.io/
    #[serde(default = "kind")]
    kind_path: String,

    #[serde(default = "kubectl")]
    kubectl_path: String,

    /// Reusing a name deletes the previous cluster of that name.
    #[serde(default = "cluster_name")]
    cluster_name: String,
}

lazy_static::lazy_static! {
    static ref TEST_SETTINGS: Inner =
        envy::prefixed("KUBETEST_SELFTEST_")
            .from_env::<Inner>()
            .expect("Error parsing TestSettings environment variables");
}

fn kind() -> String {
    String::from("kind")
}

fn kubectl() -> String {
    String::from("kubectl")
}

fn cluster_name() -> String {
    String::from("kubetest-selftest")
}
