use axum::extract::{multipart::MultipartError, Multipart};
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::repo_types::{Role, User},
    error::ApiError,
    storage::ext_from_mime,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Image part of the registration form.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub body: Bytes,
    pub content_type: String,
}

impl PhotoUpload {
    pub fn extension(&self) -> &'static str {
        ext_from_mime(&self.content_type).unwrap_or("bin")
    }
}

/// Raw registration form as collected from multipart fields.
#[derive(Debug, Default)]
pub struct RegisterForm {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub education: Option<String>,
    pub role: Option<String>,
    pub photo: Option<PhotoUpload>,
}

/// Registration input that passed every check that needs no I/O.
#[derive(Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    pub phone: String,
    pub education: String,
    pub role: Role,
    pub photo: PhotoUpload,
}

impl RegisterForm {
    pub async fn from_multipart(mut mp: Multipart) -> Result<Self, ApiError> {
        let mut form = RegisterForm::default();
        while let Some(field) = mp.next_field().await.map_err(malformed)? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            if name == "photo" {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let body = field.bytes().await.map_err(malformed)?;
                form.photo = Some(PhotoUpload { body, content_type });
                continue;
            }
            let slot = match name.as_str() {
                "email" => &mut form.email,
                "name" => &mut form.name,
                "password" => &mut form.password,
                "phone" => &mut form.phone,
                "education" => &mut form.education,
                "role" => &mut form.role,
                _ => continue,
            };
            *slot = Some(field.text().await.map_err(malformed)?);
        }
        Ok(form)
    }

    pub fn validate(self) -> Result<RegisterRequest, ApiError> {
        let (Some(email), Some(name), Some(password), Some(phone), Some(education), Some(role)) = (
            present(self.email),
            present(self.name),
            self.password.filter(|p| !p.is_empty()),
            present(self.phone),
            present(self.education),
            present(self.role),
        ) else {
            return Err(ApiError::Validation("Please fill all required fields".into()));
        };

        let photo = self
            .photo
            .filter(|p| !p.body.is_empty())
            .ok_or_else(|| ApiError::Validation("Profile photo is required".into()))?;
        if ext_from_mime(&photo.content_type).is_none() {
            return Err(ApiError::Validation(
                "Only JPG, PNG and WebP formats are allowed".into(),
            ));
        }

        let email = normalize_email(&email);
        if !is_valid_email(&email) {
            return Err(ApiError::Validation("Invalid email".into()));
        }
        let role = role
            .parse::<Role>()
            .map_err(|_| ApiError::Validation("Role must be either user or admin".into()))?;

        Ok(RegisterRequest {
            email,
            name,
            password,
            phone,
            education,
            role,
            photo,
        })
    }
}

fn present(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn malformed(e: MultipartError) -> ApiError {
    ApiError::Validation(format!("Malformed form data: {}", e.body_text()))
}

/// Login body before required-field checks.
#[derive(Debug, Default, Deserialize)]
pub struct LoginBody {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Kept as sent; compared against the stored role after the password.
    pub role: String,
}

impl LoginBody {
    pub fn validate(self) -> Result<LoginRequest, ApiError> {
        match (
            present(self.email),
            self.password.filter(|p| !p.is_empty()),
            present(self.role),
        ) {
            (Some(email), Some(password), Some(role)) => Ok(LoginRequest {
                email: normalize_email(&email),
                password,
                role,
            }),
            _ => Err(ApiError::Validation("Please fill required fields".into())),
        }
    }
}

/// Minimal user projection returned by login.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            role: u.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub user: User,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub user: PublicUser,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_form() -> RegisterForm {
        RegisterForm {
            email: Some("  Ada@Example.com ".into()),
            name: Some("Ada".into()),
            password: Some("Secret1".into()),
            phone: Some("555-0100".into()),
            education: Some("BSc".into()),
            role: Some("admin".into()),
            photo: Some(PhotoUpload {
                body: Bytes::from_static(b"\x89PNG"),
                content_type: "image/png".into(),
            }),
        }
    }

    fn validation_message(err: ApiError) -> String {
        match err {
            ApiError::Validation(m) => m,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn complete_form_parses_and_normalizes_email() {
        let req = full_form().validate().expect("valid form");
        assert_eq!(req.email, "ada@example.com");
        assert_eq!(req.role, Role::Admin);
        assert_eq!(req.photo.extension(), "png");
    }

    #[test]
    fn blank_field_counts_as_missing() {
        let mut form = full_form();
        form.education = Some("   ".into());
        let msg = validation_message(form.validate().unwrap_err());
        assert_eq!(msg, "Please fill all required fields");
    }

    #[test]
    fn photo_is_required() {
        let mut form = full_form();
        form.photo = None;
        assert_eq!(
            validation_message(form.validate().unwrap_err()),
            "Profile photo is required"
        );
    }

    #[test]
    fn unsupported_media_type_is_rejected() {
        let mut form = full_form();
        form.photo = Some(PhotoUpload {
            body: Bytes::from_static(b"GIF89a"),
            content_type: "image/gif".into(),
        });
        assert_eq!(
            validation_message(form.validate().unwrap_err()),
            "Only JPG, PNG and WebP formats are allowed"
        );
    }

    #[test]
    fn unknown_role_is_rejected() {
        let mut form = full_form();
        form.role = Some("root".into());
        assert!(matches!(form.validate(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn malformed_email_is_rejected() {
        let mut form = full_form();
        form.email = Some("not-an-email".into());
        assert_eq!(validation_message(form.validate().unwrap_err()), "Invalid email");
    }

    #[test]
    fn login_requires_every_field() {
        let body = LoginBody {
            email: Some("a@x.com".into()),
            password: None,
            role: Some("user".into()),
        };
        assert!(matches!(body.validate(), Err(ApiError::Validation(_))));

        let body: LoginBody =
            serde_json::from_str(r#"{"email":" A@X.com","password":"Secret1","role":"user"}"#)
                .unwrap();
        let req = body.validate().unwrap();
        assert_eq!(req.email, "a@x.com");
        assert_eq!(req.role, "user");
    }

    #[test]
    fn public_user_omits_contact_details() {
        let json = serde_json::to_value(PublicUser {
            id: Uuid::nil(),
            name: "Ada".into(),
            email: "a@x.com".into(),
            role: Role::User,
        })
        .unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 4);
        assert_eq!(json["role"], "user");
    }
}
