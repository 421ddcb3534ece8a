//! Error types for ambient connection discovery.

use std::path::PathBuf;

use thiserror::Error;

/// An error that arises discovering the active cluster connection.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResolutionError {
    /// No kubeconfig was found and no in-cluster service account is available.
    #[error("no kubeconfig found (searched {searched:?}) and not running inside a cluster")]
    MissingConfig {
        /// Paths that were checked, in order.
        searched: Vec<PathBuf>,
    },

    /// A file that makes up the ambient configuration could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// The file being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The kubeconfig is not valid YAML or does not have the kubeconfig shape.
    #[error("malformed kubeconfig: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Neither a context override nor `current-context` selects a context.
    #[error("no current context is set")]
    NoCurrentContext,

    /// The selected context is not defined in the kubeconfig.
    #[error("context {0:?} not found")]
    ContextNotFound(String),

    /// The selected context points at a cluster that is not defined.
    #[error("cluster {0:?} not found")]
    ClusterNotFound(String),

    /// The selected context points at a user that is not defined.
    #[error("user {0:?} not found")]
    UserNotFound(String),

    /// The cluster has no usable label.
    #[error("cluster label cannot be empty")]
    EmptyClusterLabel,

    /// The cluster entry does not declare a `server`.
    #[error("cluster {0:?} has no server")]
    MissingServer(String),

    /// The cluster `server` is not a valid URL.
    #[error("invalid server URL {url:?}: {source}")]
    InvalidServer {
        /// The rejected value.
        url: String,
        /// Error returned by the URL parser.
        #[source]
        source: url::ParseError,
    },

    /// The server URL scheme cannot carry API requests.
    #[error("server URL must use http or https, got {0:?}")]
    UnsupportedScheme(String),

    /// Inline `*-data` fields are not valid base64.
    #[error("field {field} is not valid base64: {source}")]
    InvalidBase64 {
        /// The kubeconfig field holding the value.
        field: &'static str,
        /// Error returned by the decoder.
        #[source]
        source: base64::DecodeError,
    },

    /// The trust anchor is not a bundle of PEM-encoded X.509 certificates.
    #[error("invalid trust anchor: {0}")]
    InvalidTrustAnchor(String),

    /// The user entry relies on an authentication mechanism this tool does not run.
    #[error("user {user:?} uses unsupported authentication: {mechanism}")]
    UnsupportedAuth {
        /// The kubeconfig user name.
        user: String,
        /// The unsupported mechanism (`exec`, `auth-provider`).
        mechanism: &'static str,
    },

    /// A client certificate was configured without its key, or the reverse.
    #[error("user {0:?} must set both a client certificate and a client key")]
    IncompleteClientCertificate(String),

    /// The in-cluster environment is incomplete.
    #[error("in-cluster environment variable {0} is not set")]
    MissingInClusterEnv(&'static str),

    /// The HTTP client carrying the caller's credentials could not be built.
    #[error("cannot build API server client: {0}")]
    Client(#[from] reqwest::Error),
}

impl ResolutionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
