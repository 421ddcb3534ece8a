#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

//! This crate mints a short-lived, audience-scoped token for a Kubernetes service account
//! through the [TokenRequest API](https://kubernetes.io/docs/reference/kubernetes-api/authentication-resources/token-request-v1/)
//! and materializes a minimal, self-contained kubeconfig around it.
//!
//! The work is a three-step pipeline:
//!
//! 1. an [`AmbientConnectionResolver`] discovers the active cluster (endpoint, trust anchor
//!    and an authenticated caller) from a kubeconfig or the in-cluster service account mount,
//! 2. the [`TokenIssuer`] validates a [`TokenRequestSpec`] and performs exactly one
//!    TokenRequest call,
//! 3. [`compose`] assembles a [`ConnectionProfile`] holding exactly one
//!    cluster/context/user triple.
//!
//! [`Minter`] runs the three steps in order.
//!
//! # Example
//!
//! ```no_run
//! use sa_kubeconfig::{DefaultResolver, MintConfig, Minter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let minter = Minter::new(DefaultResolver::new());
//!
//! let config = MintConfig::new("build-bot", "ci")
//!     .with_audiences(["https://kubernetes.default.svc.cluster.local"])
//!     .with_expiration_seconds(3600);
//!
//! let profile = minter.mint(&config).await?;
//! println!("{}", profile.to_yaml()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **`cli`** (default): the `sa-kubeconfig` binary.
//! - **`tracing`**: emit library diagnostics as `tracing` events.
//! - **`logging`**: emit library diagnostics as `log` records.

mod observability;
mod prelude;

pub mod ambient;
pub mod config;
pub mod constants;
pub mod error;
pub mod mint;
pub mod profile;
pub mod token;

// -----------------------
// Re-exports
// -----------------------

pub use crate::ambient::default::DefaultResolver;
pub use crate::ambient::errors::ResolutionError;
pub use crate::ambient::in_cluster::InClusterResolver;
pub use crate::ambient::kubeconfig::KubeconfigResolver;
pub use crate::ambient::{AmbientConnectionResolver, ConnectionFacts, ResolvedConnection};
pub use crate::config::{MintConfig, TransportConfig};
pub use crate::error::Error;
pub use crate::mint::Minter;
pub use crate::profile::{compose, ConnectionProfile, ProfileError};
pub use crate::token::errors::{ContractViolationError, InvalidRequestError, IssuanceError};
pub use crate::token::http::ApiServerClient;
pub use crate::token::{IssuedToken, TokenIssuer, TokenRequestCaller, TokenRequestSpec, TokenStatus};
