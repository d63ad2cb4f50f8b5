use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::{error, warn};

use super::{cookie::extract_session_token, jwt::JwtKeys, repo_types::User};
use crate::{error::ApiError, state::AppState};

/// The user whose session accompanied the request.
///
/// Rejects with 401 when the cookie (or bearer header) is missing, the token
/// does not verify, or the user it names no longer exists.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_session_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthenticated("Not logged in".into()))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(&token).map_err(|_| {
            warn!("invalid or expired token");
            ApiError::Unauthenticated("Invalid or expired session".into())
        })?;

        match state.users.find_by_id(claims.sub).await {
            Ok(Some(user)) => Ok(CurrentUser(user)),
            Ok(None) => {
                warn!(user_id = %claims.sub, "session for unknown user");
                Err(ApiError::Unauthenticated("Invalid or expired session".into()))
            }
            Err(e) => {
                error!(error = %e, user_id = %claims.sub, "find_by_id failed");
                Err(ApiError::internal(e))
            }
        }
    }
}
