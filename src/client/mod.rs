//! Client-side session bootstrap.
//!
//! A frontend asks the backend "who am I" whenever it navigates to a
//! non-public path, caches the answer in an [`AuthSnapshot`] and lets route
//! guards decide what to render from it.

use async_trait::async_trait;

use crate::auth::repo_types::User;

mod bootstrap;
mod http;

pub use bootstrap::{AuthBootstrap, AuthSnapshot, Navigation, RouteView, LOGIN_PATH};
pub use http::HttpProfileSource;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("not logged in")]
    Unauthorized,
    #[error("profile request failed with status {0}")]
    Status(u16),
    #[error("profile request failed: {0}")]
    Transport(String),
}

/// Answers "who am I" for the current session.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch_profile(&self) -> Result<User, ProfileError>;
}
