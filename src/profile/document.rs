//! Wire representation of a kubeconfig profile.
//!
//! Field names and order follow the kubeconfig format read by `kubectl` and client libraries.

use serde::{Deserialize, Serialize};

/// The kubeconfig document as written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDocument {
    /// Always `v1`.
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    /// Always `Config`.
    pub kind: String,
    /// Cluster entries.
    #[serde(default)]
    pub clusters: Vec<NamedClusterEntry>,
    /// Context entries.
    #[serde(default)]
    pub contexts: Vec<NamedContextEntry>,
    /// Name of the context in use.
    #[serde(rename = "current-context", default)]
    pub current_context: String,
    /// User entries.
    #[serde(default)]
    pub users: Vec<NamedUserEntry>,
    /// Always empty.
    #[serde(default)]
    pub preferences: Preferences,
}

/// The empty `preferences` mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {}

/// A named cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedClusterEntry {
    /// Cluster label.
    pub name: String,
    /// Connection details.
    pub cluster: ClusterEntry,
}

/// API server endpoint and trust anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEntry {
    /// API server URL.
    pub server: String,
    /// Base64-encoded certificate authority bundle.
    #[serde(rename = "certificate-authority-data", default)]
    pub certificate_authority_data: String,
}

/// A named context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedContextEntry {
    /// Context name.
    pub name: String,
    /// The cluster and user the context binds.
    pub context: ContextEntry,
}

/// References from a context to a cluster and a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    /// Name of the cluster entry.
    pub cluster: String,
    /// Name of the user entry.
    pub user: String,
}

/// A named user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedUserEntry {
    /// Identity label.
    pub name: String,
    /// Credentials.
    pub user: UserEntry,
}

/// Bearer token credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    /// The bearer token.
    pub token: String,
}

impl std::fmt::Debug for UserEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserEntry")
            .field("token", &"<redacted>")
            .finish()
    }
}
