//! The resolve, issue, compose pipeline.

use crate::ambient::AmbientConnectionResolver;
use crate::config::MintConfig;
use crate::error::Error;
use crate::prelude::info;
use crate::profile::{compose, ConnectionProfile};
use crate::token::TokenIssuer;

/// Runs one mint: resolve the ambient connection, issue one token, compose one profile.
///
/// Every run is independent; nothing is cached between runs.
#[derive(Debug, Clone)]
pub struct Minter<R> {
    resolver: R,
    issuer: TokenIssuer,
}

impl<R: AmbientConnectionResolver> Minter<R> {
    /// Creates a minter over `resolver`.
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            issuer: TokenIssuer::new(),
        }
    }

    /// Returns the resolver.
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Mints a profile for the identity described by `config`.
    ///
    /// Each step completes before the next starts. Composition only happens once both the
    /// connection and the token are valid, so no partial profile is ever returned.
    ///
    /// # Errors
    ///
    /// Returns the first [`Error`] raised by resolution, issuance or profile validation.
    pub async fn mint(&self, config: &MintConfig) -> Result<ConnectionProfile, Error> {
        let connection = self.resolver.resolve()?;
        let token = self.issuer.issue(&connection, config.token_request()).await?;

        let profile = compose(connection.facts(), config.identity_label(), &token);
        profile.validate()?;

        info!(
            "composed profile for {:?} on cluster {:?}",
            config.identity_label(),
            connection.facts().cluster_label()
        );
        Ok(profile)
    }
}
