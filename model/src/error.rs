use crate::resource::FieldError;
use snafu::Snafu;
use std::path::PathBuf;

/// The crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The broad category an [`Error`] belongs to. Callers that need to react to a failure (the poll
/// engine, the cleanup routines, the command line) match on the kind rather than on individual
/// variants.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// The control-plane binary exited non-zero, or could not be launched at all.
    CommandFailed,
    /// The control-plane binary answered, but its structured output could not be decoded.
    DecodeFailed,
    /// Observed cluster state does not (yet) match the expected state. Retryable.
    ExpectationMismatch,
    /// The test namespace could not be created or labeled. Not recoverable.
    EnvironmentSetup,
    /// A local filesystem operation failed.
    Io,
    /// The configuration file could not be read or parsed.
    Config,
    /// An HTTP probe could not be completed.
    Http,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display(
        "command failed! - {}\n\n{}\n\nexit status: {}",
        command,
        output,
        exit_code
    ))]
    CommandFailed {
        command: String,
        output: String,
        exit_code: i32,
    },

    #[snafu(display("command failed! - {}\n\nunable to launch: {}", command, source))]
    CommandSpawn {
        command: String,
        source: std::io::Error,
    },

    #[snafu(display("command failed! - {}\n\nunable to read output: {}", command, source))]
    CommandOutput {
        command: String,
        source: std::io::Error,
    },

    #[snafu(display("Unable to decode the output of '{}' as YAML: {}", command, source))]
    Decode {
        command: String,
        source: serde_yaml::Error,
    },

    #[snafu(display("Output of '{}' is not a {}", command, expected))]
    DecodeShape {
        command: String,
        expected: &'static str,
    },

    #[snafu(display("{}", message))]
    Expectation { message: String },

    #[snafu(context(false))]
    #[snafu(display("{}", source))]
    Field { source: FieldError },

    #[snafu(display("Failed to {} namespace [{}]: {}", step, namespace, source))]
    EnvironmentSetup {
        step: &'static str,
        namespace: String,
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },

    #[snafu(display("Unable to read manifest template '{}': {}", path.display(), source))]
    TemplateRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Unable to create scratch directory '{}': {}", path.display(), source))]
    ScratchDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Unable to write rendered manifest in '{}': {}", path.display(), source))]
    ManifestWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Unable to stop port-forward process {}: {}", pid, source))]
    PortForwardStop { pid: u32, source: std::io::Error },

    #[snafu(display("Unable to read configuration file '{}': {}", path.display(), source))]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Unable to parse configuration file '{}': {}", path.display(), source))]
    ConfigParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[snafu(display("Unable to read CA certificate '{}': {}", path.display(), source))]
    CaRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Invalid CA certificate '{}': {}", path.display(), source))]
    CaParse {
        path: PathBuf,
        source: reqwest::Error,
    },

    #[snafu(display("Unable to build HTTP client: {}", source))]
    HttpClient { source: reqwest::Error },

    #[snafu(display("{} {} failed: {}", method, url, source))]
    Http {
        method: String,
        url: String,
        source: reqwest::Error,
    },

    #[snafu(display("Unable to decode the response of {} as JSON: {}", url, source))]
    HttpDecode {
        url: String,
        source: serde_json::Error,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::CommandFailed { .. }
            | Error::CommandSpawn { .. }
            | Error::CommandOutput { .. } => ErrorKind::CommandFailed,
            Error::Decode { .. } | Error::DecodeShape { .. } | Error::HttpDecode { .. } => {
                ErrorKind::DecodeFailed
            }
            Error::Expectation { .. } | Error::Field { .. } => ErrorKind::ExpectationMismatch,
            Error::EnvironmentSetup { .. } => ErrorKind::EnvironmentSetup,
            Error::TemplateRead { .. }
            | Error::ScratchDir { .. }
            | Error::ManifestWrite { .. }
            | Error::PortForwardStop { .. } => ErrorKind::Io,
            Error::ConfigRead { .. } | Error::ConfigParse { .. } => ErrorKind::Config,
            Error::CaRead { .. }
            | Error::CaParse { .. }
            | Error::HttpClient { .. }
            | Error::Http { .. } => ErrorKind::Http,
        }
    }

    /// Only an unmet expectation is worth trying again; everything else is reported as-is.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::ExpectationMismatch
    }

    /// Build an [`ErrorKind::ExpectationMismatch`] error carrying `message`.
    pub fn expectation<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Error::Expectation {
            message: message.into(),
        }
    }
}
