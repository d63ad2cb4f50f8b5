use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::JsonRejection,
        DefaultBodyLimit, FromRef, Multipart, State,
    },
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        cookie::{clear_session_cookie, session_cookie},
        dto::{
            LoginBody, LoginResponse, MessageResponse, RegisterForm, RegisterRequest,
            RegisterResponse,
        },
        extractors::CurrentUser,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo_types::{NewUser, Photo, RepoError, Role, UniqueField, User},
    },
    error::ApiError,
    state::AppState,
};

const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/register",
            post(register).layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES)),
        )
        .route("/login", post(login))
        .route("/logout", post(logout))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile))
        // TODO: unauthenticated; confirm whether this was meant to be admin-only.
        .route("/admins", get(list_admins))
}

#[instrument(skip(state, mp))]
pub async fn register(
    State(state): State<AppState>,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, HeaderMap, Json<RegisterResponse>), ApiError> {
    let mp = mp.map_err(|e| {
        warn!(reason = %e.body_text(), "registration body rejected");
        ApiError::Validation("Malformed form data".into())
    })?;
    let RegisterRequest {
        email,
        name,
        password,
        phone,
        education,
        role,
        photo,
    } = RegisterForm::from_multipart(mp)
        .await?
        .validate()
        .inspect_err(|e| warn!(reason = %e, "registration rejected"))?;

    match state.users.find_by_email(&email).await {
        Ok(None) => {}
        Ok(Some(_)) => {
            warn!(email = %email, "email already registered");
            return Err(ApiError::Conflict(
                "User already exists with this email".into(),
            ));
        }
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err(ApiError::internal(e));
        }
    }

    let key = format!("avatars/{}.{}", Uuid::new_v4(), photo.extension());
    let stored = state
        .media
        .upload(&key, photo.body, &photo.content_type)
        .await
        .map_err(|e| {
            error!(error = %e, "profile photo upload failed");
            ApiError::Upstream(e.to_string())
        })?;

    let password_hash = hash_password(&password).map_err(ApiError::internal)?;

    let new_user = NewUser {
        email,
        name,
        phone,
        education,
        role,
        password_hash,
        photo: Photo {
            external_id: stored.external_id,
            url: stored.url,
        },
    };
    let user = match state.users.create(new_user).await {
        Ok(u) => u,
        Err(RepoError::Duplicate(field)) => {
            // Lost a race with a concurrent registration; the upload stays orphaned.
            warn!(?field, key = %key, "unique constraint rejected registration");
            return Err(ApiError::Conflict(conflict_message(field).into()));
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            return Err(ApiError::internal(e));
        }
    };

    let (headers, token) = start_session(&state, &user)?;

    info!(user_id = %user.id, email = %user.email, role = %user.role, "user registered");
    Ok((
        StatusCode::CREATED,
        headers,
        Json(RegisterResponse {
            message: "User registered successfully",
            user,
            token,
        }),
    ))
}

#[instrument(skip(state, body))]
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> Result<(HeaderMap, Json<LoginResponse>), ApiError> {
    let Json(body) = body.map_err(|e| {
        warn!(reason = %e.body_text(), "login body rejected");
        ApiError::Validation("Please fill required fields".into())
    })?;
    let req = body.validate()?;

    let creds = match state.users.find_credentials(&req.email).await {
        Ok(Some(c)) => c,
        Ok(None) => {
            warn!(email = %req.email, "login unknown email");
            return Err(ApiError::InvalidCredentials);
        }
        Err(e) => {
            error!(error = %e, "find_credentials failed");
            return Err(ApiError::internal(e));
        }
    };

    let Some(stored_hash) = creds.password_hash.as_deref() else {
        warn!(user_id = %creds.user.id, "stored password hash missing");
        return Err(ApiError::InvalidCredentials);
    };
    let ok = verify_password(&req.password, stored_hash).unwrap_or_else(|e| {
        error!(error = %e, user_id = %creds.user.id, "stored hash unreadable");
        false
    });
    if !ok {
        warn!(email = %req.email, user_id = %creds.user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    if creds.user.role.as_str() != req.role {
        warn!(user_id = %creds.user.id, requested = %req.role, "login role mismatch");
        return Err(ApiError::RoleMismatch(req.role));
    }

    let user = creds.user;
    let (headers, token) = start_session(&state, &user)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok((
        headers,
        Json(LoginResponse {
            message: "User logged in successfully",
            user: user.into(),
            token,
        }),
    ))
}

/// Clears the session cookie. The token itself stays valid until it expires.
#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
) -> Result<(HeaderMap, Json<MessageResponse>), ApiError> {
    let cookie = clear_session_cookie(&state.config.cookie).map_err(ApiError::internal)?;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    Ok((
        headers,
        Json(MessageResponse {
            message: "User logged out successfully",
        }),
    ))
}

#[instrument(skip_all)]
pub async fn get_profile(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

#[instrument(skip(state))]
pub async fn list_admins(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    let admins = state.users.list_by_role(Role::Admin).await.map_err(|e| {
        error!(error = %e, "list_by_role failed");
        ApiError::internal(e)
    })?;
    Ok(Json(admins))
}

/// Signs a token for `user`; the token goes both into `Set-Cookie` and the body.
fn start_session(state: &AppState, user: &User) -> Result<(HeaderMap, String), ApiError> {
    let issued = JwtKeys::from_ref(state).sign(user.id).map_err(|e| {
        error!(error = %e, "jwt sign failed");
        ApiError::internal(e)
    })?;
    let cookie = session_cookie(&state.config.cookie, &issued).map_err(ApiError::internal)?;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    Ok((headers, issued.token))
}

fn conflict_message(field: UniqueField) -> &'static str {
    match field {
        UniqueField::Email => "Email already registered",
        UniqueField::Phone => "Phone number already registered",
        UniqueField::Unknown => "User already exists",
    }
}
