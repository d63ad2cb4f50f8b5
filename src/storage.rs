use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MediaConfig;

/// Reference to an image held by the media host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredImage {
    pub external_id: String,
    pub url: String,
}

#[derive(Debug, thiserror::Error)]
#[error("media host rejected {key}: {reason}")]
pub struct MediaError {
    pub key: String,
    pub reason: String,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<StoredImage, MediaError>;
}

#[derive(Clone)]
pub struct S3MediaStore {
    client: Client,
    bucket: String,
    public_url: String,
}

impl S3MediaStore {
    pub async fn new(cfg: &MediaConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        anyhow::ensure!(!cfg.bucket.is_empty(), "media bucket must not be empty");
        let public_url = cfg.public_url.trim_end_matches('/').to_string();
        url_base_sanity(&public_url).context("MEDIA_PUBLIC_URL")?;

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
            public_url,
        })
    }
}

fn url_base_sanity(base: &str) -> anyhow::Result<()> {
    anyhow::ensure!(
        base.starts_with("http://") || base.starts_with("https://"),
        "expected an http(s) base url, got {base}"
    );
    Ok(())
}

#[async_trait]
impl MediaStore for S3MediaStore {
    async fn upload(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<StoredImage, MediaError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| MediaError {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        debug!(key, "image stored");
        Ok(StoredImage {
            external_id: key.to_string(),
            url: format!("{}/{}", self.public_url, key),
        })
    }
}

/// File extension for an accepted image media type.
pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}
