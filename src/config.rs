use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Attributes of the session cookie.
#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    pub secure: bool,
}

/// S3-compatible host that stores profile photos.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub cors_origin: String,
    pub jwt: JwtConfig,
    pub cookie: CookieConfig,
    pub media: MediaConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env_required("DATABASE_URL")?;
        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".into());

        let jwt = JwtConfig {
            secret: env_required("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "inkpost".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "inkpost-users".into()),
            ttl_minutes: parse_ttl_minutes(std::env::var("JWT_TTL_MINUTES").ok().as_deref()),
        };

        let cookie = CookieConfig {
            secure: std::env::var("COOKIE_SECURE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        };

        let endpoint = env_required("MEDIA_ENDPOINT")?;
        let bucket = env_required("MEDIA_BUCKET")?;
        let public_url = std::env::var("MEDIA_PUBLIC_URL").unwrap_or_else(|_| {
            format!("{}/{}", endpoint.trim_end_matches('/'), bucket)
        });
        let media = MediaConfig {
            access_key: env_required("MEDIA_ACCESS_KEY")?,
            secret_key: env_required("MEDIA_SECRET_KEY")?,
            region: std::env::var("MEDIA_REGION").unwrap_or_else(|_| "us-east-1".into()),
            endpoint,
            bucket,
            public_url,
        };

        Ok(Self {
            database_url,
            cors_origin,
            jwt,
            cookie,
            media,
        })
    }
}

pub const DEFAULT_TTL_MINUTES: i64 = 60 * 24 * 7;
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

/// Session lifetime in minutes. Unset or unparseable values fall back to a
/// week; anything past a year is capped.
fn parse_ttl_minutes(raw: Option<&str>) -> i64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .map(|v| v.min(MAX_TTL_MINUTES))
        .unwrap_or(DEFAULT_TTL_MINUTES)
}

fn env_required(key: &str) -> anyhow::Result<String> {
    std::env::var(key).map_err(|_| anyhow::anyhow!("missing required env var {key}"))
}
