//! Discovery from the service account mounted into a pod.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use crate::ambient::errors::ResolutionError;
use crate::ambient::trust_anchor::validate_pem_bundle;
use crate::ambient::{AmbientConnectionResolver, ConnectionFacts, ResolvedConnection};
use crate::config::TransportConfig;
use crate::constants::{
    IN_CLUSTER_LABEL, SERVICE_ACCOUNT_CA_FILE, SERVICE_ACCOUNT_DIR, SERVICE_ACCOUNT_TOKEN_FILE,
    SERVICE_HOST_ENV, SERVICE_PORT_ENV,
};
use crate::prelude::debug;
use crate::token::http::{ApiServerClient, ClientAuth};

/// Resolves the cluster a pod runs in from `KUBERNETES_SERVICE_HOST`/`KUBERNETES_SERVICE_PORT`
/// and the mounted service account token and CA.
///
/// The resulting connection is labelled [`IN_CLUSTER_LABEL`].
#[derive(Debug, Clone)]
pub struct InClusterResolver {
    service_host: Option<String>,
    service_port: Option<String>,
    account_dir: PathBuf,
    transport: TransportConfig,
}

impl Default for InClusterResolver {
    fn default() -> Self {
        Self::from_env()
    }
}

impl InClusterResolver {
    /// Creates a resolver reading the service address from the environment.
    pub fn from_env() -> Self {
        Self {
            service_host: env::var(SERVICE_HOST_ENV).ok().filter(|v| !v.is_empty()),
            service_port: env::var(SERVICE_PORT_ENV).ok().filter(|v| !v.is_empty()),
            account_dir: PathBuf::from(SERVICE_ACCOUNT_DIR),
            transport: TransportConfig::default(),
        }
    }

    /// Creates a resolver for an explicit service address. An empty host or port leaves the
    /// resolver unavailable.
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            service_host: Some(host.into()).filter(|h| !h.is_empty()),
            service_port: Some(port.into()).filter(|p| !p.is_empty()),
            account_dir: PathBuf::from(SERVICE_ACCOUNT_DIR),
            transport: TransportConfig::default(),
        }
    }

    /// Reads the token and CA from `dir` instead of the standard mount point.
    pub fn with_account_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.account_dir = dir.into();
        self
    }

    /// Sets the transport configuration of the resulting caller.
    pub fn with_transport_config(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Returns `true` if the service address is known.
    pub fn is_available(&self) -> bool {
        self.service_host.is_some() && self.service_port.is_some()
    }

    fn endpoint(&self) -> Result<String, ResolutionError> {
        let host = self
            .service_host
            .as_deref()
            .ok_or(ResolutionError::MissingInClusterEnv(SERVICE_HOST_ENV))?;
        let port = self
            .service_port
            .as_deref()
            .ok_or(ResolutionError::MissingInClusterEnv(SERVICE_PORT_ENV))?;

        // IPv6 literals must be bracketed inside a URL authority.
        if host.contains(':') && !host.starts_with('[') {
            Ok(format!("https://[{host}]:{port}"))
        } else {
            Ok(format!("https://{host}:{port}"))
        }
    }
}

impl AmbientConnectionResolver for InClusterResolver {
    type Caller = ApiServerClient;

    fn resolve(&self) -> Result<ResolvedConnection<ApiServerClient>, ResolutionError> {
        let endpoint = self.endpoint()?;

        let token_path = self.account_dir.join(SERVICE_ACCOUNT_TOKEN_FILE);
        let token = read_token(&token_path)?;

        let ca_path = self.account_dir.join(SERVICE_ACCOUNT_CA_FILE);
        let trust_anchor = fs::read(&ca_path).map_err(|e| ResolutionError::io(&ca_path, e))?;
        validate_pem_bundle(&trust_anchor)?;

        let facts = ConnectionFacts::new(endpoint, trust_anchor, IN_CLUSTER_LABEL)?;
        debug!("resolved in-cluster API server at {}", facts.endpoint());

        let caller = ApiServerClient::builder(&facts)
            .auth(ClientAuth::Bearer(token))
            .transport_config(self.transport)
            .build()?;

        Ok(ResolvedConnection::new(facts, caller))
    }
}

fn read_token(path: &Path) -> Result<Zeroizing<String>, ResolutionError> {
    let token = Zeroizing::new(fs::read_to_string(path).map_err(|e| ResolutionError::io(path, e))?);
    Ok(Zeroizing::new(token.trim().to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let ca = rcgen::generate_simple_self_signed(vec!["kubernetes".to_string()])
            .unwrap()
            .cert
            .pem();
        fs::write(dir.path().join(SERVICE_ACCOUNT_CA_FILE), ca).unwrap();
        fs::write(dir.path().join(SERVICE_ACCOUNT_TOKEN_FILE), "pod-token\n").unwrap();
        dir
    }

    #[test]
    fn test_resolve_from_mount() {
        let dir = account_dir();
        let connection = InClusterResolver::new("10.96.0.1", "443")
            .with_account_dir(dir.path())
            .resolve()
            .unwrap();

        assert_eq!(connection.facts().endpoint(), "https://10.96.0.1:443");
        assert_eq!(connection.facts().cluster_label(), IN_CLUSTER_LABEL);
        assert!(!connection.facts().trust_anchor().is_empty());
    }

    #[test]
    fn test_ipv6_host_is_bracketed() {
        let resolver = InClusterResolver::new("fd00::1", "443");
        assert_eq!(resolver.endpoint().unwrap(), "https://[fd00::1]:443");
    }

    #[test]
    fn test_missing_environment() {
        let resolver = InClusterResolver {
            service_host: None,
            service_port: Some("443".to_owned()),
            account_dir: PathBuf::from(SERVICE_ACCOUNT_DIR),
            transport: TransportConfig::default(),
        };

        assert!(!resolver.is_available());
        assert!(matches!(
            resolver.resolve().unwrap_err(),
            ResolutionError::MissingInClusterEnv(SERVICE_HOST_ENV)
        ));
    }

    #[test]
    fn test_missing_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = InClusterResolver::new("10.96.0.1", "443")
            .with_account_dir(dir.path())
            .resolve()
            .unwrap_err();
        assert!(matches!(err, ResolutionError::Io { path, .. } if path.ends_with(SERVICE_ACCOUNT_TOKEN_FILE)));
    }
}
