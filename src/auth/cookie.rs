//! Session cookie transport.

use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};
use time::{format_description::FormatItem, macros::format_description, OffsetDateTime, UtcOffset};

use crate::{auth::jwt::IssuedToken, config::CookieConfig};

pub const SESSION_COOKIE_NAME: &str = "jwt";

const HTTP_DATE: &[FormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    #[error("format cookie expiry: {0}")]
    Expiry(#[from] time::error::Format),
    #[error("invalid cookie header: {0}")]
    Header(#[from] InvalidHeaderValue),
}

/// `HttpOnly` cookie carrying `issued.token`, expiring together with it.
pub fn session_cookie(cfg: &CookieConfig, issued: &IssuedToken) -> Result<HeaderValue, CookieError> {
    let expires = http_date(issued.expires_at)?;
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}; Expires={expires}",
        issued.token, issued.max_age_secs
    );
    if cfg.secure {
        cookie.push_str("; Secure");
    }
    Ok(HeaderValue::from_str(&cookie)?)
}

/// Same cookie as [`session_cookie`] but empty and already expired.
pub fn clear_session_cookie(cfg: &CookieConfig) -> Result<HeaderValue, CookieError> {
    let expires = http_date(OffsetDateTime::UNIX_EPOCH)?;
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0; Expires={expires}"
    );
    if cfg.secure {
        cookie.push_str("; Secure");
    }
    Ok(HeaderValue::from_str(&cookie)?)
}

fn http_date(at: OffsetDateTime) -> Result<String, time::error::Format> {
    at.to_offset(UtcOffset::UTC).format(HTTP_DATE)
}

/// Session token from the cookie, falling back to a bearer header.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    extract_cookie_token(headers).or_else(|| extract_bearer_token(headers))
}

fn extract_cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(key, val)| (key.trim(), val.trim()))
        .find(|(key, val)| *key == SESSION_COOKIE_NAME && !val.is_empty())
        .map(|(_, val)| val.to_string())
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn issued() -> IssuedToken {
        IssuedToken {
            token: "abc.def.ghi".into(),
            expires_at: datetime!(2026-10-26 08:49:37 UTC),
            max_age_secs: 604_800,
        }
    }

    #[test]
    fn session_cookie_is_http_only_and_expires_with_the_token() {
        let value = session_cookie(&CookieConfig { secure: false }, &issued()).unwrap();
        let s = value.to_str().unwrap();
        assert!(s.starts_with("jwt=abc.def.ghi;"));
        assert!(s.contains("HttpOnly"));
        assert!(s.contains("Max-Age=604800"));
        assert!(s.contains("Expires=Mon, 26 Oct 2026 08:49:37 GMT"));
        assert!(!s.contains("Secure"));
    }

    #[test]
    fn secure_flag_is_configurable() {
        let value = session_cookie(&CookieConfig { secure: true }, &issued()).unwrap();
        assert!(value.to_str().unwrap().ends_with("; Secure"));
        let cleared = clear_session_cookie(&CookieConfig { secure: true }).unwrap();
        assert!(cleared.to_str().unwrap().ends_with("; Secure"));
    }

    #[test]
    fn cleared_cookie_is_empty_and_expired() {
        let value = clear_session_cookie(&CookieConfig { secure: false }).unwrap();
        let s = value.to_str().unwrap();
        assert!(s.starts_with("jwt=;"));
        assert!(s.contains("HttpOnly"));
        assert!(s.contains("Max-Age=0"));
        assert!(s.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
    }

    #[test]
    fn token_is_read_from_cookie_then_bearer() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_session_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(extract_session_token(&headers).as_deref(), Some("from-header"));

        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; jwt=from-cookie"));
        assert_eq!(extract_session_token(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn empty_cookie_value_is_no_session() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("jwt="));
        assert_eq!(extract_session_token(&headers), None);
    }

    #[test]
    fn empty_cookie_does_not_hide_a_later_one() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("jwt=; theme=dark; jwt=real"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer fallback"));
        assert_eq!(extract_session_token(&headers).as_deref(), Some("real"));

        let mut split = HeaderMap::new();
        split.append(COOKIE, HeaderValue::from_static("jwt="));
        split.append(COOKIE, HeaderValue::from_static("jwt=second"));
        assert_eq!(extract_session_token(&split).as_deref(), Some("second"));
    }
}
