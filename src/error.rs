//! Error taxonomy of a mint run.
//!
//! Every variant is fatal to the run: nothing is retried internally and no partial profile is
//! produced once one of them is returned.

use thiserror::Error;

use crate::ambient::errors::ResolutionError;
use crate::profile::ProfileError;
use crate::token::errors::{ContractViolationError, InvalidRequestError, IssuanceError};

/// Errors produced while resolving, issuing and composing.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The ambient connection (active cluster, trust anchor, caller) could not be determined.
    #[error("cannot resolve ambient connection: {0}")]
    Resolution(#[from] ResolutionError),

    /// The token request parameters were rejected before any network call.
    #[error("invalid token request: {0}")]
    InvalidRequest(#[from] InvalidRequestError),

    /// The TokenRequest call failed (transport, authorization, server error, timeout).
    #[error("token issuance failed: {0}")]
    Issuance(#[from] IssuanceError),

    /// The control plane reported success but returned data that cannot be trusted.
    #[error("control plane contract violation: {0}")]
    ContractViolation(#[from] ContractViolationError),

    /// A connection profile failed its structural checks.
    #[error("invalid connection profile: {0}")]
    Profile(#[from] ProfileError),
}
