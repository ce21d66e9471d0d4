use crate::constants::{
    MANIFEST_DIR, VAR_DOMAIN, VAR_ISSUER, VAR_NAME, VAR_NAMESPACE, VAR_STORAGE_CLASS,
    VAR_TLS_ENABLED,
};
use crate::error::{self, Result};
use log::trace;
use snafu::ResultExt;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Length of the random suffix [`random_name`] appends.
const RANDOM_SUFFIX_LEN: usize = 8;

/// Returns `base` followed by a dash and eight random lowercase alphanumeric characters, e.g.
/// `deployment-3f9c01ab`. The result is a valid Kubernetes object name as long as `base` is.
pub fn random_name(base: &str) -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", base, &uuid[..RANDOM_SUFFIX_LEN])
}

/// A manifest file with `${VAR}` placeholders and the values to substitute for them.
///
/// Rendering is plain, case-sensitive substring replacement: every `${KEY}` whose `KEY` has a
/// value is replaced, and placeholders without a value are left verbatim. There is no escaping.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ManifestTemplate {
    path: PathBuf,
    vars: BTreeMap<String, String>,
}

impl ManifestTemplate {
    pub fn new<P>(path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self {
            path: path.into(),
            vars: BTreeMap::new(),
        }
    }

    /// Set the value substituted for `${key}`.
    pub fn var<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.vars
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// Substitute the variables into `text`.
    pub fn substitute(&self, text: &str) -> String {
        self.vars
            .iter()
            .fold(text.to_string(), |rendered, (key, value)| {
                rendered.replace(&format!("${{{}}}", key), value)
            })
    }

    /// Read the template, substitute the variables and write the result to a new, randomly named
    /// file in `<scratch_dir>/manifests/`, creating the directory if needed. The file is removed
    /// when the returned [`RenderedManifest`] is dropped.
    pub fn render<P>(&self, scratch_dir: P) -> Result<RenderedManifest>
    where
        P: AsRef<Path>,
    {
        let text = std::fs::read_to_string(&self.path).context(error::TemplateReadSnafu {
            path: &self.path,
        })?;
        let rendered = self.substitute(&text);

        let dir = scratch_dir.as_ref().join(MANIFEST_DIR);
        std::fs::create_dir_all(&dir).context(error::ScratchDirSnafu { path: &dir })?;
        let mut file = tempfile::Builder::new()
            .prefix("manifest-")
            .suffix(".yml")
            .tempfile_in(&dir)
            .context(error::ManifestWriteSnafu { path: &dir })?;
        file.write_all(rendered.as_bytes())
            .and_then(|_| file.flush())
            .context(error::ManifestWriteSnafu { path: file.path() })?;
        trace!(
            "Rendered '{}' to '{}'",
            self.path.display(),
            file.path().display()
        );

        Ok(RenderedManifest { file })
    }
}

/// A rendered manifest on disk. The file exists exactly as long as this value does.
#[derive(Debug)]
pub struct RenderedManifest {
    file: NamedTempFile,
}

impl RenderedManifest {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// What to render when deploying or deleting a templated workload: the template, the workload
/// name and any of the standard variables that should not come from the configuration.
///
/// Unset standard variables are filled in by [`Kubectl::deploy`](crate::Kubectl::deploy) from the
/// configuration: `NAMESPACE` from the test namespace, `DOMAIN` from the configured domain,
/// `ISSUER` from the configured Let's Encrypt issuer and `TLS_ENABLED` from whether Let's Encrypt
/// is enabled.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Manifest {
    pub name: String,
    pub template: PathBuf,
    pub namespace: Option<String>,
    pub issuer: Option<String>,
    pub tls_enabled: Option<bool>,
    pub extra: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new<N, P>(name: N, template: P) -> Self
    where
        N: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            name: name.into(),
            template: template.into(),
            ..Default::default()
        }
    }

    pub fn namespace<S>(mut self, namespace: S) -> Self
    where
        S: Into<String>,
    {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn issuer<S>(mut self, issuer: S) -> Self
    where
        S: Into<String>,
    {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn tls_enabled(mut self, tls_enabled: bool) -> Self {
        self.tls_enabled = Some(tls_enabled);
        self
    }

    pub fn storage_class<S>(self, storage_class: S) -> Self
    where
        S: Into<String>,
    {
        self.var(VAR_STORAGE_CLASS, storage_class)
    }

    /// Set a placeholder. A standard placeholder set here wins over the configuration, but not
    /// over the dedicated `name`, `namespace`, `issuer` and `tls_enabled` fields.
    pub fn var<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Build the template with every variable resolved. The arguments are the configured
    /// defaults.
    pub(crate) fn template(
        &self,
        namespace: &str,
        domain: &str,
        issuer: &str,
        tls_enabled: bool,
    ) -> ManifestTemplate {
        let mut vars = BTreeMap::new();
        vars.insert(VAR_DOMAIN.to_string(), domain.to_string());
        vars.insert(VAR_NAMESPACE.to_string(), namespace.to_string());
        vars.insert(VAR_ISSUER.to_string(), issuer.to_string());
        vars.insert(VAR_TLS_ENABLED.to_string(), tls_enabled.to_string());
        vars.extend(self.extra.clone());
        vars.insert(VAR_NAME.to_string(), self.name.clone());
        if let Some(namespace) = &self.namespace {
            vars.insert(VAR_NAMESPACE.to_string(), namespace.clone());
        }
        if let Some(issuer) = &self.issuer {
            vars.insert(VAR_ISSUER.to_string(), issuer.clone());
        }
        if let Some(tls_enabled) = self.tls_enabled {
            vars.insert(VAR_TLS_ENABLED.to_string(), tls_enabled.to_string());
        }
        ManifestTemplate::new(&self.template).vars(vars)
    }
}

#[cfg(test)]
mod test_manifest {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn substitution_is_literal() {
        let template = ManifestTemplate::new("unused")
            .var("NAME", "x")
            .var("DOMAIN", "d");
        assert_eq!(template.substitute("${NAME}.${DOMAIN}"), "x.d");
        assert_eq!(
            template.substitute("host: ${NAME}.${DOMAIN} # ${ISSUER} $NAME ${name}"),
            "host: x.d # ${ISSUER} $NAME ${name}"
        );
    }

    #[test]
    fn render_writes_into_manifest_dir_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let template_path = dir.path().join("deployment.yml");
        std::fs::write(&template_path, "name: ${NAME}\nnamespace: ${NAMESPACE}\n").unwrap();
        let scratch = dir.path().join("scratch");

        let template = ManifestTemplate::new(&template_path)
            .var("NAME", "test-1")
            .var("NAMESPACE", "ns");
        let rendered = template.render(&scratch).unwrap();
        let rendered_path = rendered.path().to_path_buf();
        assert_eq!(rendered_path.parent().unwrap(), scratch.join("manifests"));
        let file_name = rendered_path.file_name().unwrap().to_str().unwrap();
        assert!(file_name.starts_with("manifest-"));
        assert!(file_name.ends_with(".yml"));
        assert_eq!(
            std::fs::read_to_string(&rendered_path).unwrap(),
            "name: test-1\nnamespace: ns\n"
        );

        drop(rendered);
        assert!(!rendered_path.exists());
    }

    #[test]
    fn concurrent_renders_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let template_path = dir.path().join("t.yml");
        std::fs::write(&template_path, "${NAME}").unwrap();
        let template = ManifestTemplate::new(&template_path).var("NAME", "same");
        let first = template.render(dir.path()).unwrap();
        let second = template.render(dir.path()).unwrap();
        assert_ne!(first.path(), second.path());
    }

    #[test]
    fn missing_template_is_reported() {
        let dir = TempDir::new().unwrap();
        let e = ManifestTemplate::new(dir.path().join("missing.yml"))
            .render(dir.path())
            .unwrap_err();
        assert_eq!(e.kind(), crate::ErrorKind::Io);
        assert!(!dir.path().join("manifests").exists());
    }

    #[test]
    fn manifest_fills_standard_variables() {
        let manifest = Manifest::new("test-1", "assets/deployment.yml")
            .storage_class("longhorn")
            .tls_enabled(false);
        let template = manifest.template("kubernetes-testing", "example.com", "le", true);
        let vars = template.get_vars();
        assert_eq!(vars["NAME"], "test-1");
        assert_eq!(vars["DOMAIN"], "example.com");
        assert_eq!(vars["NAMESPACE"], "kubernetes-testing");
        assert_eq!(vars["ISSUER"], "le");
        assert_eq!(vars["TLS_ENABLED"], "false");
        assert_eq!(vars["STORAGE_CLASS"], "longhorn");
    }

    #[test]
    fn caller_variables_win_over_configuration() {
        let manifest = Manifest::new("test-1", "assets/deployment.yml")
            .var("DOMAIN", "example.com")
            .var("ISSUER", "staging")
            .var("NAME", "ignored")
            .issuer("le-prod");
        let vars = manifest.template("kubernetes-testing", "", "le", true).get_vars().clone();
        assert_eq!(vars["DOMAIN"], "example.com");
        assert_eq!(vars["NAME"], "test-1");
        assert_eq!(vars["ISSUER"], "le-prod");
        assert_eq!(vars["NAMESPACE"], "kubernetes-testing");
        assert_eq!(vars["TLS_ENABLED"], "true");
    }

    #[test]
    fn random_names_are_lowercase_and_distinct() {
        let a = random_name("deployment");
        let b = random_name("deployment");
        assert_ne!(a, b);
        assert_eq!(a.len(), "deployment-".len() + 8);
        assert!(a
            .trim_start_matches("deployment-")
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
