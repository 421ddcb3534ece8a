//! Configuration of a mint run.

use std::time::Duration;

use crate::constants::DEFAULT_EXPIRATION_SECONDS;
use crate::token::TokenRequestSpec;

/// Timeouts applied by the HTTP transport that carries the TokenRequest call.
///
/// The issuer itself adds no timeout layer; an expired deadline surfaces as
/// [`IssuanceError::Timeout`](crate::IssuanceError::Timeout).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransportConfig {
    /// Maximum time to establish the connection.
    pub connect_timeout: Duration,
    /// Maximum time for the whole request, response body included.
    pub request_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// What to mint: the service account, its namespace, the token audiences and lifetime, and the
/// name the identity gets inside the emitted profile.
///
/// No audience is configured by default; callers must choose the audiences their verifiers
/// expect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MintConfig {
    token_request: TokenRequestSpec,
    identity_label: Option<String>,
}

impl MintConfig {
    /// Creates a configuration for `service_account` in `namespace`, with no audiences and the
    /// default lifetime.
    pub fn new(service_account: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            token_request: TokenRequestSpec::new(
                service_account,
                namespace,
                Vec::<String>::new(),
                DEFAULT_EXPIRATION_SECONDS,
            ),
            identity_label: None,
        }
    }

    /// Sets the token audiences, keeping their order.
    pub fn with_audiences<I>(mut self, audiences: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.token_request = self.token_request.with_audiences(audiences);
        self
    }

    /// Sets the requested token lifetime in seconds.
    pub fn with_expiration_seconds(mut self, seconds: i64) -> Self {
        self.token_request = self.token_request.with_ttl_seconds(seconds);
        self
    }

    /// Names the identity inside the profile; defaults to the service account name.
    pub fn with_identity_label(mut self, label: impl Into<String>) -> Self {
        self.identity_label = Some(label.into());
        self
    }

    /// Returns the token request to send.
    pub fn token_request(&self) -> &TokenRequestSpec {
        &self.token_request
    }

    /// Returns the identity label used in the profile.
    pub fn identity_label(&self) -> &str {
        self.identity_label
            .as_deref()
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| self.token_request.identity_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MintConfig::new("build-bot", "ci");

        assert_eq!(config.token_request().identity_name(), "build-bot");
        assert_eq!(config.token_request().identity_namespace(), "ci");
        assert!(config.token_request().audiences().is_empty());
        assert_eq!(
            config.token_request().ttl_seconds(),
            DEFAULT_EXPIRATION_SECONDS
        );
        assert_eq!(config.identity_label(), "build-bot");
    }

    #[test]
    fn test_identity_label_override() {
        let config = MintConfig::new("build-bot", "ci").with_identity_label("ci-runner");
        assert_eq!(config.identity_label(), "ci-runner");

        let config = MintConfig::new("build-bot", "ci").with_identity_label("");
        assert_eq!(config.identity_label(), "build-bot");
    }

    #[test]
    fn test_builder_keeps_audience_order() {
        let config = MintConfig::new("build-bot", "ci")
            .with_audiences(["vault", "https://kubernetes.default.svc.cluster.local"])
            .with_expiration_seconds(600);

        assert_eq!(
            config.token_request().audiences(),
            ["vault", "https://kubernetes.default.svc.cluster.local"]
        );
        assert_eq!(config.token_request().ttl_seconds(), 600);
    }
}
