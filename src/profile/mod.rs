//! Minimal, self-contained kubeconfig profiles.
//!
//! A [`ConnectionProfile`] holds exactly one cluster, one context and one user, and its
//! `current-context` names that single context. Every cross-reference resolves inside the same
//! document; [`ConnectionProfile::validate`] checks it and rendering refuses profiles that fail.
//!
//! # Examples
//!
//! ```
//! use sa_kubeconfig::{compose, ConnectionFacts, IssuedToken};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let facts = ConnectionFacts::new("https://10.0.0.1:6443", b"CA-BYTES".to_vec(), "prod")?;
//! let token = IssuedToken::new("tok-123", None)?;
//!
//! let profile = compose(&facts, "build-bot", &token);
//! assert_eq!(profile.current_context(), "prod");
//!
//! let yaml = profile.to_yaml()?;
//! assert!(yaml.contains("current-context: prod"));
//! # Ok(())
//! # }
//! ```

use base64::engine::general_purpose::STANDARD as Base64;
use base64::Engine as _;
use thiserror::Error;

use crate::ambient::ConnectionFacts;
use crate::constants::{KUBECONFIG_API_VERSION, KUBECONFIG_KIND};
use crate::token::IssuedToken;

pub mod document;

use document::{
    ClusterEntry, ContextEntry, NamedClusterEntry, NamedContextEntry, NamedUserEntry,
    Preferences, ProfileDocument, UserEntry,
};

/// An error that arises validating or parsing a profile.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum ProfileError {
    /// A section does not hold exactly one entry.
    #[error("profile must have exactly one {section} entry, found {count}")]
    EntryCount {
        /// The offending section (`clusters`, `contexts`, `users`).
        section: &'static str,
        /// Number of entries found.
        count: usize,
    },

    /// An entry has an empty name.
    #[error("{section} entry name cannot be empty")]
    EmptyName {
        /// The offending section.
        section: &'static str,
    },

    /// `current-context` does not name the context entry.
    #[error("current-context {found:?} does not match context {expected:?}")]
    DanglingCurrentContext {
        /// The context entry name.
        expected: String,
        /// The `current-context` value.
        found: String,
    },

    /// The context points at a cluster other than the cluster entry.
    #[error("context cluster {found:?} does not match cluster {expected:?}")]
    DanglingCluster {
        /// The cluster entry name.
        expected: String,
        /// The context's cluster reference.
        found: String,
    },

    /// The context points at a user other than the user entry.
    #[error("context user {found:?} does not match user {expected:?}")]
    DanglingUser {
        /// The user entry name.
        expected: String,
        /// The context's user reference.
        found: String,
    },

    /// The user entry carries no token.
    #[error("user {0:?} has an empty token")]
    EmptyToken(String),

    /// `apiVersion` or `kind` has an unexpected value.
    #[error("unexpected {field} {found:?}")]
    UnexpectedHeader {
        /// The offending field.
        field: &'static str,
        /// The value found.
        found: String,
    },

    /// The document is not YAML of the expected shape.
    #[error("malformed profile document: {0}")]
    Malformed(String),
}

/// A profile made of exactly one cluster/context/user triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionProfile {
    cluster: NamedClusterEntry,
    context: NamedContextEntry,
    user: NamedUserEntry,
    current_context: String,
}

/// Builds the profile for `facts`, naming the identity `identity_label` and embedding `token`.
///
/// The context takes the cluster label as its name. The trust anchor is embedded as standard
/// base64. Identical inputs always produce an identical profile.
///
/// `identity_label` must not be empty. Composition itself never fails; a profile built from an
/// empty label is reported by [`ConnectionProfile::validate`] and refused by
/// [`ConnectionProfile::to_yaml`].
pub fn compose(
    facts: &ConnectionFacts,
    identity_label: &str,
    token: &IssuedToken,
) -> ConnectionProfile {
    let cluster_label = facts.cluster_label();
    let context_name = cluster_label;

    ConnectionProfile {
        cluster: NamedClusterEntry {
            name: cluster_label.to_owned(),
            cluster: ClusterEntry {
                server: facts.endpoint().to_owned(),
                certificate_authority_data: Base64.encode(facts.trust_anchor()),
            },
        },
        context: NamedContextEntry {
            name: context_name.to_owned(),
            context: ContextEntry {
                cluster: cluster_label.to_owned(),
                user: identity_label.to_owned(),
            },
        },
        user: NamedUserEntry {
            name: identity_label.to_owned(),
            user: UserEntry {
                token: token.value().to_owned(),
            },
        },
        current_context: context_name.to_owned(),
    }
}

impl ConnectionProfile {
    /// Returns the single cluster entry.
    pub fn cluster(&self) -> &NamedClusterEntry {
        &self.cluster
    }

    /// Returns the single context entry.
    pub fn context(&self) -> &NamedContextEntry {
        &self.context
    }

    /// Returns the single user entry.
    pub fn user(&self) -> &NamedUserEntry {
        &self.user
    }

    /// Returns the name of the current context.
    pub fn current_context(&self) -> &str {
        &self.current_context
    }

    /// Checks that every name is set and every reference resolves inside the profile.
    ///
    /// # Errors
    ///
    /// Returns a [`ProfileError`] naming the first broken reference.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.cluster.name.is_empty() {
            return Err(ProfileError::EmptyName { section: "clusters" });
        }
        if self.context.name.is_empty() {
            return Err(ProfileError::EmptyName { section: "contexts" });
        }
        if self.user.name.is_empty() {
            return Err(ProfileError::EmptyName { section: "users" });
        }

        if self.current_context != self.context.name {
            return Err(ProfileError::DanglingCurrentContext {
                expected: self.context.name.clone(),
                found: self.current_context.clone(),
            });
        }
        if self.context.context.cluster != self.cluster.name {
            return Err(ProfileError::DanglingCluster {
                expected: self.cluster.name.clone(),
                found: self.context.context.cluster.clone(),
            });
        }
        if self.context.context.user != self.user.name {
            return Err(ProfileError::DanglingUser {
                expected: self.user.name.clone(),
                found: self.context.context.user.clone(),
            });
        }
        if self.user.user.token.is_empty() {
            return Err(ProfileError::EmptyToken(self.user.name.clone()));
        }
        Ok(())
    }

    /// Returns the wire document for this profile.
    pub fn to_document(&self) -> ProfileDocument {
        ProfileDocument {
            api_version: KUBECONFIG_API_VERSION.to_owned(),
            kind: KUBECONFIG_KIND.to_owned(),
            clusters: vec![self.cluster.clone()],
            contexts: vec![self.context.clone()],
            current_context: self.current_context.clone(),
            users: vec![self.user.clone()],
            preferences: Preferences::default(),
        }
    }

    /// Renders the profile as a kubeconfig YAML document.
    ///
    /// # Errors
    ///
    /// Returns a [`ProfileError`] if the profile fails [`validate`](Self::validate); nothing is
    /// rendered in that case.
    pub fn to_yaml(&self) -> Result<String, ProfileError> {
        self.validate()?;
        serde_yaml::to_string(&self.to_document()).map_err(|e| ProfileError::Malformed(e.to_string()))
    }

    /// Parses a kubeconfig YAML document that must hold exactly one closed triple.
    ///
    /// # Errors
    ///
    /// Returns a [`ProfileError`] if the document is malformed or is not a single closed
    /// triple.
    pub fn from_yaml(document: &str) -> Result<Self, ProfileError> {
        let document: ProfileDocument =
            serde_yaml::from_str(document).map_err(|e| ProfileError::Malformed(e.to_string()))?;
        Self::try_from(document)
    }
}

impl TryFrom<ProfileDocument> for ConnectionProfile {
    type Error = ProfileError;

    fn try_from(document: ProfileDocument) -> Result<Self, Self::Error> {
        if document.api_version != KUBECONFIG_API_VERSION {
            return Err(ProfileError::UnexpectedHeader {
                field: "apiVersion",
                found: document.api_version,
            });
        }
        if document.kind != KUBECONFIG_KIND {
            return Err(ProfileError::UnexpectedHeader {
                field: "kind",
                found: document.kind,
            });
        }

        let profile = Self {
            cluster: exactly_one("clusters", document.clusters)?,
            context: exactly_one("contexts", document.contexts)?,
            user: exactly_one("users", document.users)?,
            current_context: document.current_context,
        };
        profile.validate()?;
        Ok(profile)
    }
}

fn exactly_one<T>(section: &'static str, entries: Vec<T>) -> Result<T, ProfileError> {
    let count = entries.len();
    let mut entries = entries.into_iter();
    match (entries.next(), entries.next()) {
        (Some(entry), None) => Ok(entry),
        _ => Err(ProfileError::EntryCount { section, count }),
    }
}
