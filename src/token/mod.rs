//! Issuance of bounded-lifetime, audience-scoped service account tokens.
//!
//! [`TokenIssuer::issue`] validates a [`TokenRequestSpec`], dispatches it exactly once through
//! the connection's [`TokenRequestCaller`] and checks what comes back before handing out an
//! [`IssuedToken`].

use std::collections::HashSet;
use std::future::Future;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::ambient::ResolvedConnection;
use crate::error::Error;
use crate::prelude::{debug, info, warn};
use crate::token::errors::{ContractViolationError, InvalidRequestError, IssuanceError};

pub mod errors;
pub mod http;

const DNS1123_LABEL_MAX_LEN: usize = 63;
const DNS1123_SUBDOMAIN_MAX_LEN: usize = 253;

/// Parameters of a TokenRequest.
///
/// Construction does not validate; [`TokenRequestSpec::validate`] does, and the issuer calls it
/// before any network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequestSpec {
    identity_name: String,
    identity_namespace: String,
    audiences: Vec<String>,
    ttl_seconds: i64,
}

impl TokenRequestSpec {
    /// Creates a request for `identity_name` in `identity_namespace`.
    pub fn new<I>(
        identity_name: impl Into<String>,
        identity_namespace: impl Into<String>,
        audiences: I,
        ttl_seconds: i64,
    ) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            identity_name: identity_name.into(),
            identity_namespace: identity_namespace.into(),
            audiences: audiences.into_iter().map(Into::into).collect(),
            ttl_seconds,
        }
    }

    /// Replaces the audiences, keeping their order.
    pub fn with_audiences<I>(mut self, audiences: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.audiences = audiences.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the requested lifetime.
    pub fn with_ttl_seconds(mut self, ttl_seconds: i64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    /// Returns the service account name.
    pub fn identity_name(&self) -> &str {
        &self.identity_name
    }

    /// Returns the service account namespace.
    pub fn identity_namespace(&self) -> &str {
        &self.identity_namespace
    }

    /// Returns the requested audiences in order.
    pub fn audiences(&self) -> &[String] {
        &self.audiences
    }

    /// Returns the requested lifetime in seconds.
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Checks the request before it is dispatched.
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidRequestError`] if the name or namespace is empty or not a valid
    /// Kubernetes name, if the audience set is empty or contains empty or repeated entries, or
    /// if the lifetime is not positive.
    pub fn validate(&self) -> Result<(), InvalidRequestError> {
        if self.identity_name.is_empty() {
            return Err(InvalidRequestError::EmptyIdentityName);
        }
        if !is_dns1123_subdomain(&self.identity_name) {
            return Err(InvalidRequestError::InvalidIdentityName(
                self.identity_name.clone(),
            ));
        }

        if self.identity_namespace.is_empty() {
            return Err(InvalidRequestError::EmptyIdentityNamespace);
        }
        if !is_dns1123_label(&self.identity_namespace) {
            return Err(InvalidRequestError::InvalidIdentityNamespace(
                self.identity_namespace.clone(),
            ));
        }

        if self.audiences.is_empty() {
            return Err(InvalidRequestError::NoAudiences);
        }
        let mut seen = HashSet::with_capacity(self.audiences.len());
        for audience in &self.audiences {
            if audience.is_empty() {
                return Err(InvalidRequestError::EmptyAudience);
            }
            if !seen.insert(audience.as_str()) {
                return Err(InvalidRequestError::DuplicateAudience(audience.clone()));
            }
        }

        if self.ttl_seconds <= 0 {
            return Err(InvalidRequestError::NonPositiveTtl(self.ttl_seconds));
        }

        Ok(())
    }
}

/// What the control plane returned for a TokenRequest, before any checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenStatus {
    /// The issued token; may be empty if the control plane misbehaves.
    pub token: String,
    /// The RFC 3339 expiry reported by the control plane, if any.
    pub expiration_timestamp: Option<String>,
}

/// A bearer token issued by the control plane.
///
/// Invariant: the value is never empty.
///
/// The token value is zeroized on drop and redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct IssuedToken {
    value: String,
    #[zeroize(skip)]
    expires_at: Option<OffsetDateTime>,
}

impl IssuedToken {
    /// Creates a token, rejecting an empty value.
    ///
    /// # Errors
    ///
    /// Returns [`ContractViolationError::EmptyToken`] if `value` is empty.
    pub fn new(
        value: impl Into<String>,
        expires_at: Option<OffsetDateTime>,
    ) -> Result<Self, ContractViolationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ContractViolationError::EmptyToken);
        }
        Ok(Self { value, expires_at })
    }

    /// Returns the bearer credential.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the expiry reported by the control plane, if it reported one.
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.expires_at
    }
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl TryFrom<TokenStatus> for IssuedToken {
    type Error = ContractViolationError;

    fn try_from(status: TokenStatus) -> Result<Self, Self::Error> {
        let expires_at = status
            .expiration_timestamp
            .filter(|ts| !ts.is_empty())
            .map(|ts| {
                OffsetDateTime::parse(&ts, &Rfc3339).map_err(|source| {
                    ContractViolationError::InvalidExpirationTimestamp { value: ts, source }
                })
            })
            .transpose()?;
        Self::new(status.token, expires_at)
    }
}

/// The authenticated capability to call the control plane's TokenRequest endpoint.
///
/// Implementations perform one call per invocation and never retry. Timeouts belong to the
/// implementation and are reported as [`IssuanceError::Timeout`]; a call the implementation
/// abandons for any other reason is an [`IssuanceError::Transport`]. Dropping the returned
/// future cancels the call without producing a result.
pub trait TokenRequestCaller {
    /// Requests a token for the service account described by `request`.
    fn create_token(
        &self,
        request: &TokenRequestSpec,
    ) -> impl Future<Output = Result<TokenStatus, IssuanceError>> + Send;
}

/// Issues tokens through a resolved connection.
///
/// Issuance is at-most-once: a failed call is reported, never retried, since the control plane
/// may have acted on it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenIssuer;

impl TokenIssuer {
    /// Creates an issuer.
    pub fn new() -> Self {
        Self
    }

    /// Validates `spec`, performs one TokenRequest call and checks the response.
    ///
    /// An expiry clamped by the control plane is accepted as returned.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRequest`] if `spec` is invalid; nothing is sent.
    /// - [`Error::Issuance`] if the call fails, times out or is rejected.
    /// - [`Error::ContractViolation`] if the call succeeds without a usable token.
    pub async fn issue<C>(
        &self,
        connection: &ResolvedConnection<C>,
        spec: &TokenRequestSpec,
    ) -> Result<IssuedToken, Error>
    where
        C: TokenRequestCaller,
    {
        spec.validate()?;

        debug!(
            "requesting token for {}/{} (audiences {:?}, {}s)",
            spec.identity_namespace(),
            spec.identity_name(),
            spec.audiences(),
            spec.ttl_seconds()
        );

        let status = connection.caller().create_token(spec).await.map_err(|e| {
            warn!(
                "token request for {}/{} failed: {e}",
                spec.identity_namespace(),
                spec.identity_name()
            );
            e
        })?;

        let token = IssuedToken::try_from(status)?;

        match token.expires_at() {
            Some(expires_at) => info!(
                "issued token for {}/{} expiring at {expires_at}",
                spec.identity_namespace(),
                spec.identity_name()
            ),
            None => info!(
                "issued token for {}/{}",
                spec.identity_namespace(),
                spec.identity_name()
            ),
        }
        Ok(token)
    }
}

fn is_dns1123_label(value: &str) -> bool {
    value.len() <= DNS1123_LABEL_MAX_LEN && is_dns1123_part(value)
}

fn is_dns1123_subdomain(value: &str) -> bool {
    value.len() <= DNS1123_SUBDOMAIN_MAX_LEN && value.split('.').all(is_dns1123_part)
}

fn is_dns1123_part(part: &str) -> bool {
    let bytes = part.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            is_lower_alphanumeric(*first)
                && is_lower_alphanumeric(*last)
                && bytes.iter().all(|&b| is_lower_alphanumeric(b) || b == b'-')
        }
        _ => false,
    }
}

fn is_lower_alphanumeric(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit()
}
