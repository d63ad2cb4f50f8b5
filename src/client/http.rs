use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::{ProfileError, ProfileSource};
use crate::auth::repo_types::User;

const PROFILE_PATH: &str = "/api/users/profile";

/// [`ProfileSource`] backed by the HTTP API.
///
/// The session cookie lives in the client's cookie store, so the same
/// `reqwest::Client` must be used for logging in and for profile checks.
#[derive(Clone)]
pub struct HttpProfileSource {
    client: Client,
    base_url: String,
}

impl HttpProfileSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProfileError> {
        let client = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| ProfileError::Transport(e.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn profile_url(&self) -> String {
        format!("{}{}", self.base_url, PROFILE_PATH)
    }
}

#[async_trait]
impl ProfileSource for HttpProfileSource {
    async fn fetch_profile(&self) -> Result<User, ProfileError> {
        let res = self
            .client
            .get(self.profile_url())
            .send()
            .await
            .map_err(|e| ProfileError::Transport(e.to_string()))?;

        match res.status() {
            StatusCode::UNAUTHORIZED => Err(ProfileError::Unauthorized),
            s if !s.is_success() => Err(ProfileError::Status(s.as_u16())),
            _ => {
                let user = res
                    .json::<User>()
                    .await
                    .map_err(|e| ProfileError::Transport(e.to_string()))?;
                debug!(user_id = %user.id, "profile loaded");
                Ok(user)
            }
        }
    }
}
