//! # postloop-publish
//!
//! Publishing of finished posts.
//!
//! - [`Publisher`] - the publishing seam
//! - [`XPublisher`] - posts through the X v2 API with OAuth 1.0a user context
//! - [`DryRunPublisher`] - logs instead of posting
//! - [`OAuthSigner`] - HMAC-SHA1 request signing

mod oauth;
mod publisher;
mod x;

pub use oauth::{OAuthCredentials, OAuthSigner, CREDENTIAL_VARS};
pub use publisher::{DryRunPublisher, PostId, PublishError, Publisher, UnconfiguredPublisher};
pub use x::{XPublisher, X_API_BASE};
