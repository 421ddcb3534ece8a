//! Error types for token issuance.

use thiserror::Error;

/// Boxed error used to carry the underlying cause of a failed call.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An error that arises validating a token request before it is sent.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum InvalidRequestError {
    /// The service account name is empty.
    #[error("identity name cannot be empty")]
    EmptyIdentityName,

    /// The namespace is empty.
    #[error("identity namespace cannot be empty")]
    EmptyIdentityNamespace,

    /// The service account name is not a DNS-1123 subdomain.
    #[error("identity name {0:?} must be a lowercase DNS-1123 subdomain")]
    InvalidIdentityName(String),

    /// The namespace is not a DNS-1123 label.
    #[error("identity namespace {0:?} must be a lowercase DNS-1123 label")]
    InvalidIdentityNamespace(String),

    /// No audience was requested.
    #[error("at least one audience is required")]
    NoAudiences,

    /// One of the audiences is the empty string.
    #[error("audiences cannot be empty strings")]
    EmptyAudience,

    /// The same audience was requested more than once.
    #[error("audience {0:?} is requested more than once")]
    DuplicateAudience(String),

    /// The requested lifetime is zero or negative.
    #[error("token lifetime must be positive, got {0} seconds")]
    NonPositiveTtl(i64),
}

/// An error that arises while the TokenRequest call is in flight.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IssuanceError {
    /// The call did not complete before the transport deadline.
    #[error("token request timed out: {0}")]
    Timeout(#[source] BoxError),

    /// The request could not be delivered or the response could not be read.
    #[error("token request transport error: {0}")]
    Transport(#[source] BoxError),

    /// The API server answered with a non-success status.
    #[error("API server rejected the token request with status {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Machine-readable reason from the Kubernetes `Status` object, if any.
        reason: Option<String>,
        /// Human-readable message.
        message: String,
    },

    /// The response body is not a TokenRequest.
    #[error("malformed token response: {0}")]
    MalformedResponse(#[source] BoxError),
}

impl IssuanceError {
    /// Returns `true` for timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Returns `true` if the API server refused the caller's credentials or permissions.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Rejected { status: 401 | 403, .. })
    }
}

/// The control plane reported success but returned data that breaks the issuer's invariants.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContractViolationError {
    /// A successful response carried no token.
    #[error("control plane returned an empty token")]
    EmptyToken,

    /// The reported expiry is not an RFC 3339 timestamp.
    #[error("control plane returned an invalid expiration timestamp {value:?}: {source}")]
    InvalidExpirationTimestamp {
        /// The rejected value.
        value: String,
        /// Error returned by the timestamp parser.
        #[source]
        source: time::error::Parse,
    },
}
