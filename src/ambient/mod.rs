//! Discovery of the active cluster connection.
//!
//! An [`AmbientConnectionResolver`] reads whatever ambient configuration is available and
//! yields a [`ResolvedConnection`]: the [`ConnectionFacts`] that end up in the emitted profile
//! plus the authenticated caller that the token issuer dispatches through. Resolvers never
//! perform network calls themselves.
//!
//! # Examples
//!
//! ```no_run
//! use sa_kubeconfig::{AmbientConnectionResolver, KubeconfigResolver};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = KubeconfigResolver::new().with_context("staging");
//! let connection = resolver.resolve()?;
//!
//! println!("{} -> {}", connection.facts().cluster_label(), connection.facts().endpoint());
//! # Ok(())
//! # }
//! ```

use url::Url;

use crate::ambient::errors::ResolutionError;
use crate::token::TokenRequestCaller;

pub mod default;
pub mod errors;
pub mod in_cluster;
pub mod kubeconfig;
pub mod trust_anchor;

const HTTP_SCHEME: &str = "http";
const HTTPS_SCHEME: &str = "https";

/// Facts about the active cluster that are copied into the emitted profile.
///
/// Invariants: the endpoint is a valid `http`/`https` URL and the cluster label is not empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionFacts {
    endpoint: String,
    endpoint_url: Url,
    trust_anchor: Vec<u8>,
    cluster_label: String,
}

impl ConnectionFacts {
    /// Creates connection facts, checking the endpoint and the cluster label.
    ///
    /// The endpoint is kept exactly as given so that it round-trips into the profile unchanged.
    /// The trust anchor is taken as-is; resolvers validate it with
    /// [`trust_anchor::validate_pem_bundle`] before getting here.
    ///
    /// # Errors
    ///
    /// - [`ResolutionError::InvalidServer`] if `endpoint` is not a URL.
    /// - [`ResolutionError::UnsupportedScheme`] if it is not `http` or `https`.
    /// - [`ResolutionError::EmptyClusterLabel`] if `cluster_label` is empty.
    pub fn new(
        endpoint: impl Into<String>,
        trust_anchor: impl Into<Vec<u8>>,
        cluster_label: impl Into<String>,
    ) -> Result<Self, ResolutionError> {
        let endpoint = endpoint.into();
        let cluster_label = cluster_label.into();

        let endpoint_url = Url::parse(&endpoint).map_err(|source| ResolutionError::InvalidServer {
            url: endpoint.clone(),
            source,
        })?;
        match endpoint_url.scheme() {
            HTTP_SCHEME | HTTPS_SCHEME => {}
            other => return Err(ResolutionError::UnsupportedScheme(other.to_owned())),
        }

        if cluster_label.is_empty() {
            return Err(ResolutionError::EmptyClusterLabel);
        }

        Ok(Self {
            endpoint,
            endpoint_url,
            trust_anchor: trust_anchor.into(),
            cluster_label,
        })
    }

    /// Returns the API server endpoint as configured.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the parsed API server endpoint.
    pub fn endpoint_url(&self) -> &Url {
        &self.endpoint_url
    }

    /// Returns the raw certificate authority bytes, empty when none is configured.
    pub fn trust_anchor(&self) -> &[u8] {
        &self.trust_anchor
    }

    /// Returns the name identifying this cluster inside a profile.
    pub fn cluster_label(&self) -> &str {
        &self.cluster_label
    }
}

/// The output of a resolver: facts for the profile and the caller for the issuer.
#[derive(Debug, Clone)]
pub struct ResolvedConnection<C> {
    facts: ConnectionFacts,
    caller: C,
}

impl<C> ResolvedConnection<C> {
    /// Pairs connection facts with the authenticated caller that reaches the same cluster.
    pub fn new(facts: ConnectionFacts, caller: C) -> Self {
        Self { facts, caller }
    }

    /// Returns the connection facts.
    pub fn facts(&self) -> &ConnectionFacts {
        &self.facts
    }

    /// Returns the authenticated caller.
    pub fn caller(&self) -> &C {
        &self.caller
    }

    /// Splits the connection into its parts.
    pub fn into_parts(self) -> (ConnectionFacts, C) {
        (self.facts, self.caller)
    }
}

/// Discovers the active cluster from the environment the process runs in.
pub trait AmbientConnectionResolver {
    /// The authenticated caller handed to the token issuer.
    type Caller: TokenRequestCaller;

    /// Resolves the active cluster connection.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolutionError`] when no active cluster can be determined.
    fn resolve(&self) -> Result<ResolvedConnection<Self::Caller>, ResolutionError>;
}

impl<R: AmbientConnectionResolver + ?Sized> AmbientConnectionResolver for &R {
    type Caller = R::Caller;

    fn resolve(&self) -> Result<ResolvedConnection<Self::Caller>, ResolutionError> {
        (**self).resolve()
    }
}
