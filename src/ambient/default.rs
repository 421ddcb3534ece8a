//! The resolver used when nothing more specific is configured.

use crate::ambient::errors::ResolutionError;
use crate::ambient::in_cluster::InClusterResolver;
use crate::ambient::kubeconfig::KubeconfigResolver;
use crate::ambient::{AmbientConnectionResolver, ResolvedConnection};
use crate::config::TransportConfig;
use crate::prelude::debug;
use crate::token::http::ApiServerClient;

/// Uses a kubeconfig when one can be found and falls back to the in-cluster service account.
///
/// An explicit kubeconfig path disables the fallback.
#[derive(Debug, Clone, Default)]
pub struct DefaultResolver {
    kubeconfig: KubeconfigResolver,
    in_cluster: InClusterResolver,
    explicit_path: bool,
}

impl DefaultResolver {
    /// Creates a resolver with the default search order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the kubeconfig at `path`; no fallback is attempted.
    pub fn with_kubeconfig_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.kubeconfig = self.kubeconfig.with_path(path);
        self.explicit_path = true;
        self
    }

    /// Uses the named kubeconfig context instead of `current-context`.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.kubeconfig = self.kubeconfig.with_context(context);
        self
    }

    /// Sets the transport configuration of the resulting caller.
    pub fn with_transport_config(mut self, transport: TransportConfig) -> Self {
        self.kubeconfig = self.kubeconfig.with_transport_config(transport);
        self.in_cluster = self.in_cluster.with_transport_config(transport);
        self
    }
}

impl AmbientConnectionResolver for DefaultResolver {
    type Caller = ApiServerClient;

    fn resolve(&self) -> Result<ResolvedConnection<ApiServerClient>, ResolutionError> {
        match self.kubeconfig.resolve() {
            Err(ResolutionError::MissingConfig { searched })
                if !self.explicit_path && self.in_cluster.is_available() =>
            {
                debug!("no kubeconfig in {searched:?}, using in-cluster service account");
                self.in_cluster.resolve()
            }
            result => result,
        }
    }
}
