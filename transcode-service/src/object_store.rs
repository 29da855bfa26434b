//! Object Store Client: multipart upload, ranged GET, HEAD, DELETE against an
//! S3-compatible endpoint. Transient failures on the upload path are retried
//! with `resilience`'s exponential backoff (section 7: max 3 attempts).

use std::path::Path;

use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use resilience::retry::{with_retry, RetryConfig};

use crate::config::ObjectStoreConfig;
use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct HeadResult {
    pub content_length: u64,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct PutResult {
    pub url: String,
    pub etag: String,
}

#[derive(Clone)]
pub struct ObjectStoreClient {
    client: Client,
    bucket: String,
    public_base_url: Option<String>,
}

impl ObjectStoreClient {
    pub async fn from_config(config: &ObjectStoreConfig) -> Self {
        let region = Region::new(config.region.clone());
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

        if !config.access_key.is_empty() {
            loader = loader.credentials_provider(Credentials::new(
                &config.access_key,
                &config.secret_key,
                None,
                None,
                "transcode-service",
            ));
        }

        let shared_config = loader.load().await;
        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint)
                .force_path_style(true);
        }

        Self {
            client: Client::from_conf(s3_config_builder.build()),
            bucket: config.bucket.clone(),
            public_base_url: config.endpoint.clone(),
        }
    }

    fn resolved_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}/{}", base.trim_end_matches('/'), self.bucket, key),
            None => format!(
                "https://{}.s3.amazonaws.com/{}",
                self.bucket, key
            ),
        }
    }

    /// Streams `path` from disk so large files never fully buffer in memory.
    /// Retried: rebuilding the `ByteStream` per attempt keeps each retry a
    /// fresh read from the still-present local file.
    pub async fn put_multipart(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<PutResult> {
        with_retry(RetryConfig::default(), || async {
            let body = ByteStream::from_path(path)
                .await
                .map_err(|e| AppError::UploadFailure(format!("read {path:?}: {e}")))?;

            let response = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(body)
                .content_type(content_type)
                .send()
                .await
                .map_err(|e| AppError::UploadFailure(format!("put {key}: {e}")))?;

            Ok(PutResult {
                url: self.resolved_url(key),
                etag: response.e_tag().unwrap_or_default().to_string(),
            })
        })
        .await
        .map_err(|e| AppError::UploadFailure(e.to_string()))
    }

    /// Uploads an in-memory buffer (used for small objects like subtitles and
    /// manifests that are rewritten frequently).
    pub async fn put_bytes(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<PutResult> {
        let response = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::UploadFailure(format!("put {key}: {e}")))?;

        Ok(PutResult {
            url: self.resolved_url(key),
            etag: response.e_tag().unwrap_or_default().to_string(),
        })
    }

    /// Atomic master-playlist replace: write to a temp key, then copy over the
    /// real key, so readers never observe a truncated manifest.
    pub async fn put_bytes_atomic(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let tmp_key = format!("{key}.tmp-{}", uuid::Uuid::new_v4());
        self.put_bytes(&tmp_key, bytes, content_type).await?;

        self.client
            .copy_object()
            .bucket(&self.bucket)
            .key(key)
            .copy_source(format!("{}/{}", self.bucket, tmp_key))
            .send()
            .await
            .map_err(|e| AppError::UploadFailure(format!("copy-over {key}: {e}")))?;

        self.delete(&tmp_key).await.ok();
        Ok(())
    }

    pub async fn head(&self, key: &str) -> Result<HeadResult> {
        let response = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_head_error(key, e))?;

        Ok(HeadResult {
            content_length: response.content_length().unwrap_or(0) as u64,
            content_type: response
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string(),
        })
    }

    pub async fn get_range(&self, key: &str, start: u64, end: u64) -> Result<Vec<u8>> {
        let range = format!("bytes={start}-{end}");
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .range(range)
            .send()
            .await
            .map_err(|e| AppError::NotFound(format!("get {key}: {e}")))?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| AppError::UploadFailure(format!("read body {key}: {e}")))?;

        Ok(bytes.into_bytes().to_vec())
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::UploadFailure(format!("delete {key}: {e}")))?;
        Ok(())
    }
}

fn map_head_error(key: &str, err: aws_sdk_s3::error::SdkError<aws_sdk_s3::operation::head_object::HeadObjectError>) -> AppError {
    if err.as_service_error().map(|e| e.is_not_found()).unwrap_or(false) {
        AppError::NotFound(format!("object not found: {key}"))
    } else {
        AppError::UploadFailure(format!("head {key}: {err}"))
    }
}
