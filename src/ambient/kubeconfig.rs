//! Kubeconfig discovery and typed lookups.
//!
//! [`Kubeconfig`] is a read-only view of the parts of a kubeconfig document needed to reach a
//! cluster. Lookups by name return an explicit not-found error instead of a default entry.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as Base64;
use base64::Engine as _;
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::ambient::errors::ResolutionError;
use crate::ambient::trust_anchor::validate_pem_bundle;
use crate::ambient::{AmbientConnectionResolver, ConnectionFacts, ResolvedConnection};
use crate::config::TransportConfig;
use crate::constants::{DEFAULT_KUBECONFIG_RELATIVE_PATH, KUBECONFIG_ENV};
use crate::prelude::debug;
use crate::token::http::{ApiServerClient, ClientAuth};

/// A parsed kubeconfig document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Kubeconfig {
    /// Name of the context in use.
    #[serde(default)]
    pub current_context: Option<String>,
    /// Named cluster entries.
    #[serde(default)]
    pub clusters: Vec<NamedCluster>,
    /// Named context entries.
    #[serde(default)]
    pub contexts: Vec<NamedContext>,
    /// Named user entries.
    #[serde(default)]
    pub users: Vec<NamedUser>,
}

/// A cluster entry with its name.
#[derive(Debug, Clone, Deserialize)]
pub struct NamedCluster {
    /// Name of the cluster.
    pub name: String,
    /// Cluster connection details.
    pub cluster: Cluster,
}

/// How to reach a cluster.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Cluster {
    /// API server URL.
    #[serde(default)]
    pub server: Option<String>,
    /// Path to a PEM file with the cluster CA.
    #[serde(default)]
    pub certificate_authority: Option<PathBuf>,
    /// Base64-encoded PEM with the cluster CA.
    #[serde(default)]
    pub certificate_authority_data: Option<String>,
    /// Skip server certificate verification.
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
}

/// A context entry with its name.
#[derive(Debug, Clone, Deserialize)]
pub struct NamedContext {
    /// Name of the context.
    pub name: String,
    /// Context details.
    pub context: Context,
}

/// A (cluster, user) pair.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Context {
    /// Name of the cluster entry.
    #[serde(default)]
    pub cluster: String,
    /// Name of the user entry.
    #[serde(default)]
    pub user: String,
    /// Default namespace of the context.
    #[serde(default)]
    pub namespace: Option<String>,
}

/// A user entry with its name.
#[derive(Debug, Clone, Deserialize)]
pub struct NamedUser {
    /// Name of the user.
    pub name: String,
    /// Credentials of the user.
    #[serde(default)]
    pub user: AuthInfo,
}

/// Credentials used to call the API server.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AuthInfo {
    /// Bearer token.
    #[serde(default)]
    pub token: Option<String>,
    /// Path to a file holding a bearer token.
    #[serde(default, rename = "tokenFile")]
    pub token_file: Option<PathBuf>,
    /// Path to a PEM client certificate.
    #[serde(default)]
    pub client_certificate: Option<PathBuf>,
    /// Base64-encoded PEM client certificate.
    #[serde(default)]
    pub client_certificate_data: Option<String>,
    /// Path to a PEM client key.
    #[serde(default)]
    pub client_key: Option<PathBuf>,
    /// Base64-encoded PEM client key.
    #[serde(default)]
    pub client_key_data: Option<String>,
    /// Basic authentication user name.
    #[serde(default)]
    pub username: Option<String>,
    /// Basic authentication password.
    #[serde(default)]
    pub password: Option<String>,
    /// Exec credential plugin configuration.
    #[serde(default)]
    pub exec: Option<serde_yaml::Value>,
    /// Auth provider plugin configuration.
    #[serde(default)]
    pub auth_provider: Option<serde_yaml::Value>,
}

impl std::fmt::Debug for AuthInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthInfo")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("token_file", &self.token_file)
            .field("client_certificate", &self.client_certificate)
            .field(
                "client_certificate_data",
                &self.client_certificate_data.as_ref().map(|_| "<present>"),
            )
            .field("client_key", &self.client_key)
            .field(
                "client_key_data",
                &self.client_key_data.as_ref().map(|_| "<redacted>"),
            )
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("exec", &self.exec.is_some())
            .field("auth_provider", &self.auth_provider.is_some())
            .finish()
    }
}

impl Kubeconfig {
    /// Parses a kubeconfig document.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::Parse`] if the document is not a kubeconfig.
    pub fn from_yaml(document: &str) -> Result<Self, ResolutionError> {
        Ok(serde_yaml::from_str(document)?)
    }

    /// Reads and parses the kubeconfig at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::Io`] if the file cannot be read, or
    /// [`ResolutionError::Parse`] if it is not a kubeconfig.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ResolutionError> {
        let path = path.as_ref();
        let document = fs::read_to_string(path).map_err(|e| ResolutionError::io(path, e))?;
        Self::from_yaml(&document)
    }

    /// Returns the name of the context selected by `override_name` or `current-context`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::NoCurrentContext`] if neither names a context.
    pub fn selected_context_name<'a>(
        &'a self,
        override_name: Option<&'a str>,
    ) -> Result<&'a str, ResolutionError> {
        override_name
            .or(self.current_context.as_deref())
            .filter(|name| !name.is_empty())
            .ok_or(ResolutionError::NoCurrentContext)
    }

    /// Looks up a context by name.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::ContextNotFound`] if no context has that name.
    pub fn context(&self, name: &str) -> Result<&Context, ResolutionError> {
        self.contexts
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.context)
            .ok_or_else(|| ResolutionError::ContextNotFound(name.to_owned()))
    }

    /// Looks up a cluster by name.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::ClusterNotFound`] if no cluster has that name.
    pub fn cluster(&self, name: &str) -> Result<&Cluster, ResolutionError> {
        self.clusters
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.cluster)
            .ok_or_else(|| ResolutionError::ClusterNotFound(name.to_owned()))
    }

    /// Looks up a user by name.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::UserNotFound`] if no user has that name.
    pub fn user(&self, name: &str) -> Result<&AuthInfo, ResolutionError> {
        self.users
            .iter()
            .find(|u| u.name == name)
            .map(|u| &u.user)
            .ok_or_else(|| ResolutionError::UserNotFound(name.to_owned()))
    }
}

/// Returns the kubeconfig candidates in search order.
///
/// When `kubeconfig_env` lists any path, only those paths are candidates. `<home>/.kube/config`
/// is considered only when it lists none.
pub fn search_paths(kubeconfig_env: Option<OsString>, home: Option<PathBuf>) -> Vec<PathBuf> {
    let paths: Vec<PathBuf> = kubeconfig_env
        .map(|value| {
            env::split_paths(&value)
                .filter(|p| !p.as_os_str().is_empty())
                .collect()
        })
        .unwrap_or_default();

    if !paths.is_empty() {
        return paths;
    }
    home.map(|home| home.join(DEFAULT_KUBECONFIG_RELATIVE_PATH))
        .into_iter()
        .collect()
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

/// Resolves the active cluster from a kubeconfig file.
///
/// The file is the explicit path if one is set, otherwise the first existing entry of
/// `KUBECONFIG`, otherwise `~/.kube/config` when `KUBECONFIG` is unset or empty. Only that one
/// file is read; entries are not merged.
#[derive(Debug, Clone, Default)]
pub struct KubeconfigResolver {
    path: Option<PathBuf>,
    search_paths: Option<Vec<PathBuf>>,
    context: Option<String>,
    transport: TransportConfig,
}

impl KubeconfigResolver {
    /// Creates a resolver using the default search order and `current-context`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the kubeconfig at `path` instead of searching for one.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Searches `paths` in order instead of `KUBECONFIG` and the home directory.
    pub fn with_search_paths<I>(mut self, paths: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<PathBuf>,
    {
        self.search_paths = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    /// Uses the named context instead of `current-context`.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Sets the transport configuration of the resulting caller.
    pub fn with_transport_config(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Finds the kubeconfig file to read.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::MissingConfig`] if no candidate exists.
    pub fn locate(&self) -> Result<PathBuf, ResolutionError> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }

        let searched = match &self.search_paths {
            Some(paths) => paths.clone(),
            None => search_paths(env::var_os(KUBECONFIG_ENV), home_dir()),
        };
        match searched.iter().find(|p| p.is_file()) {
            Some(path) => Ok(path.clone()),
            None => Err(ResolutionError::MissingConfig { searched }),
        }
    }

    /// Resolves the connection described by an already-parsed kubeconfig.
    ///
    /// Relative file references in the kubeconfig are resolved against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolutionError`] if the selected context, its cluster or its user cannot be
    /// found, or if any of them is unusable.
    pub fn resolve_from(
        &self,
        kubeconfig: &Kubeconfig,
        base_dir: &Path,
    ) -> Result<ResolvedConnection<ApiServerClient>, ResolutionError> {
        let context_name = kubeconfig.selected_context_name(self.context.as_deref())?;
        let context = kubeconfig.context(context_name)?;
        let cluster = kubeconfig.cluster(&context.cluster)?;
        // A context without a user makes unauthenticated calls.
        let user = match context.user.as_str() {
            "" => None,
            name => Some(kubeconfig.user(name)?),
        };

        let server = cluster
            .server
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ResolutionError::MissingServer(context.cluster.clone()))?;

        let trust_anchor = read_trust_anchor(cluster, base_dir)?;
        let certificates = validate_pem_bundle(&trust_anchor)?;
        let facts = ConnectionFacts::new(server, trust_anchor, context.cluster.as_str())?;
        let credentials = match user {
            Some(user) => credentials(&context.user, user, base_dir)?,
            None => Credentials::default(),
        };

        debug!(
            "resolved context {context_name:?}: cluster {:?} at {}, {certificates} CA certificate(s)",
            facts.cluster_label(),
            facts.endpoint()
        );

        let mut builder = ApiServerClient::builder(&facts)
            .auth(credentials.auth)
            .insecure_skip_tls_verify(cluster.insecure_skip_tls_verify)
            .transport_config(self.transport);
        if let Some(identity_pem) = credentials.identity_pem {
            builder = builder.client_identity(identity_pem);
        }
        let caller = builder.build()?;

        Ok(ResolvedConnection::new(facts, caller))
    }
}

impl AmbientConnectionResolver for KubeconfigResolver {
    type Caller = ApiServerClient;

    fn resolve(&self) -> Result<ResolvedConnection<ApiServerClient>, ResolutionError> {
        let path = self.locate()?;
        debug!("loading kubeconfig from {}", path.display());

        let kubeconfig = Kubeconfig::load(&path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        self.resolve_from(&kubeconfig, base_dir)
    }
}

fn read_trust_anchor(cluster: &Cluster, base_dir: &Path) -> Result<Vec<u8>, ResolutionError> {
    if let Some(data) = non_empty(&cluster.certificate_authority_data) {
        return decode_base64("certificate-authority-data", data);
    }
    match &cluster.certificate_authority {
        Some(path) if !path.as_os_str().is_empty() => read_file(&base_dir.join(path)),
        _ => Ok(Vec::new()),
    }
}

/// What a kubeconfig user presents to the API server.
#[derive(Default)]
struct Credentials {
    auth: ClientAuth,
    identity_pem: Option<Zeroizing<Vec<u8>>>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("auth", &self.auth)
            .field("client_identity", &self.identity_pem.is_some())
            .finish()
    }
}

fn credentials(
    user_name: &str,
    user: &AuthInfo,
    base_dir: &Path,
) -> Result<Credentials, ResolutionError> {
    if user.exec.is_some() {
        return Err(ResolutionError::UnsupportedAuth {
            user: user_name.to_owned(),
            mechanism: "exec",
        });
    }
    if user.auth_provider.is_some() {
        return Err(ResolutionError::UnsupportedAuth {
            user: user_name.to_owned(),
            mechanism: "auth-provider",
        });
    }

    let certificate = inline_or_file(
        "client-certificate-data",
        &user.client_certificate_data,
        &user.client_certificate,
        base_dir,
    )?;
    let key = inline_or_file(
        "client-key-data",
        &user.client_key_data,
        &user.client_key,
        base_dir,
    )?;

    let identity_pem = match (certificate, key) {
        (Some(certificate), Some(key)) => {
            let mut identity_pem = Zeroizing::new(certificate);
            identity_pem.push(b'\n');
            identity_pem.extend_from_slice(&key);
            Some(identity_pem)
        }
        (None, None) => None,
        _ => {
            return Err(ResolutionError::IncompleteClientCertificate(
                user_name.to_owned(),
            ))
        }
    };

    Ok(Credentials {
        auth: header_auth(user, base_dir)?,
        identity_pem,
    })
}

fn header_auth(user: &AuthInfo, base_dir: &Path) -> Result<ClientAuth, ResolutionError> {
    if let Some(token) = non_empty(&user.token) {
        return Ok(ClientAuth::Bearer(Zeroizing::new(token.to_owned())));
    }
    if let Some(path) = &user.token_file {
        let path = base_dir.join(path);
        let token = fs::read_to_string(&path).map_err(|e| ResolutionError::io(&path, e))?;
        return Ok(ClientAuth::Bearer(Zeroizing::new(token.trim().to_owned())));
    }
    if let (Some(username), Some(password)) = (non_empty(&user.username), &user.password) {
        return Ok(ClientAuth::Basic {
            username: username.to_owned(),
            password: Zeroizing::new(password.clone()),
        });
    }
    Ok(ClientAuth::None)
}

fn inline_or_file(
    field: &'static str,
    data: &Option<String>,
    path: &Option<PathBuf>,
    base_dir: &Path,
) -> Result<Option<Vec<u8>>, ResolutionError> {
    if let Some(data) = non_empty(data) {
        return decode_base64(field, data).map(Some);
    }
    match path {
        Some(path) if !path.as_os_str().is_empty() => read_file(&base_dir.join(path)).map(Some),
        _ => Ok(None),
    }
}

fn decode_base64(field: &'static str, data: &str) -> Result<Vec<u8>, ResolutionError> {
    Base64
        .decode(data.trim())
        .map_err(|source| ResolutionError::InvalidBase64 { field, source })
}

fn read_file(path: &Path) -> Result<Vec<u8>, ResolutionError> {
    fs::read(path).map_err(|e| ResolutionError::io(path, e))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
