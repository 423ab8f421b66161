//! S3-compatible object store.
//!
//! This module provides an object store implementation for S3-compatible
//! services including AWS S3, Backblaze B2, Tigris (Fly.io), MinIO and others.
//!
//! # Credentials
//!
//! Credentials are provided explicitly via configuration (`key_id` and
//! `key_secret`); the AWS credential provider chain is not consulted.

use crate::ObjectStore;
use crate::error::{ErrorKind, Result};
use crate::models::{Cursor, ListPage, ObjectMetadata, ObjectRecord, PreservedHeaders};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    primitives::DateTime,
    types::{MetadataDirective, StorageClass},
};
use exn::ResultExt;
use std::fmt::Debug;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Generous default for concurrent S3 requests.
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;
/// One initial attempt plus three retries.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// S3-compatible object store.
///
/// Operates on a single bucket. Transient failures (throttling, timeouts,
/// 5xx responses) are retried by the SDK's standard retry strategy with
/// exponential backoff, up to `max_attempts` attempts per call.
///
/// # Examples
///
/// ```no_run
/// use remime_storage::backend::S3Backend;
///
/// # fn example() {
/// let store = S3Backend::new(
///     "my-bucket",
///     "us-west-004",
///     Some("https://s3.us-west-004.backblazeb2.com"),
///     "access_key_id",
///     "secret_access_key",
///     4,
/// );
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    client: Client,
    bucket: String,
    region: String,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
}

impl S3Backend {
    /// Create a new S3 object store.
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region or provider-specific region (e.g., "us-west-004" for Backblaze)
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - AWS/provider access key ID
    /// * `key_secret` - AWS/provider secret access key
    /// * `max_attempts` - Attempts per request, including the first
    pub fn new(
        bucket: impl Into<String>,
        region: impl Into<String>,
        endpoint: Option<impl Into<String>>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
        max_attempts: u32,
    ) -> Self {
        let region = region.into();
        let credentials = Credentials::new(key_id, key_secret, None, None, "remime-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.clone()))
            .retry_config(RetryConfig::standard().with_max_attempts(max_attempts.max(1)))
            // Use path-style addressing for better compatibility with
            // S3-compatible services (Backblaze, MinIO, etc.)
            .force_path_style(true);
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Self::from_client(Client::from_conf(config_builder.build()), bucket, region)
    }

    /// Wrap an already configured client.
    pub fn from_client(client: Client, bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            region: region.into(),
            rate_limiter: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS)),
        }
    }

    /// Acquire a rate limiter permit before making an S3 API call.
    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        self.rate_limiter
            .clone()
            .acquire_owned()
            .await
            .or_raise(|| ErrorKind::BackendError("request limiter closed".to_string()))
    }

    /// `CopySource` must be URL-encoded; the bucket/key separator must not be.
    fn copy_source(&self, key: &str) -> String {
        format!("{}/{}", self.bucket, urlencoding::encode(key))
    }

    /// Convert AWS DateTime to OffsetDateTime.
    fn parse_datetime(dt: &DateTime) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp_nanos(dt.as_nanos()).ok()
    }

    /// Classify an SDK failure, keeping the SDK error as the source frame.
    fn sdk_error<E, R>(err: SdkError<E, R>, key: &str) -> crate::error::Error
    where
        E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
        R: Debug + Send + Sync + 'static,
    {
        let context = DisplayErrorContext(&err).to_string();
        let kind = match &err {
            SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
                ErrorKind::Network(context)
            },
            _ => match err.code() {
                Some("NoSuchKey" | "NotFound" | "NoSuchBucket") => ErrorKind::NotFound(key.to_string()),
                Some("AccessDenied" | "Forbidden" | "InvalidAccessKeyId" | "SignatureDoesNotMatch") => {
                    ErrorKind::PermissionDenied(key.to_string())
                },
                _ => ErrorKind::BackendError(context),
            },
        };
        exn::Exn::from(err).raise(kind)
    }
}

#[async_trait]
impl ObjectStore for S3Backend {
    fn name(&self) -> &str {
        &self.bucket
    }

    fn region(&self) -> &str {
        &self.region
    }

    async fn list_page(&self, prefix: Option<&str>, cursor: Option<&Cursor>, limit: u32) -> Result<ListPage> {
        let _permit = self.acquire_permit().await?;
        let max_keys = i32::try_from(limit).unwrap_or(i32::MAX);
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(max_keys)
            .set_prefix(prefix.map(str::to_string));
        request = match cursor {
            Some(Cursor::Token(token)) => request.continuation_token(token),
            Some(Cursor::After(key)) => request.start_after(key),
            None => request,
        };
        let output = request.send().await.map_err(|e| Self::sdk_error(e, &self.bucket))?;
        let objects = output
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?;
                let size = object.size().and_then(|s| u64::try_from(s).ok()).unwrap_or(0);
                let record = ObjectRecord::new(key, size);
                Some(match object.last_modified().and_then(Self::parse_datetime) {
                    Some(modified) => record.with_modified(modified),
                    None => record,
                })
            })
            .collect();
        tracing::trace!(bucket = %self.bucket, cursor = ?cursor, limit, "Listed page of objects");
        Ok(ListPage {
            objects,
            truncated: output.is_truncated().unwrap_or(false),
            next_token: output.next_continuation_token().map(str::to_string),
        })
    }

    async fn head(&self, key: &str) -> Result<ObjectMetadata> {
        if key.is_empty() {
            exn::bail!(ErrorKind::InvalidKey(key.to_string()));
        }
        let _permit = self.acquire_permit().await?;
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::sdk_error(e, key))?;
        Ok(ObjectMetadata {
            content_type: output.content_type().map(str::to_string),
            custom: output.metadata().map(|m| m.clone().into_iter().collect()).unwrap_or_default(),
            headers: PreservedHeaders {
                cache_control: output.cache_control().map(str::to_string),
                content_disposition: output.content_disposition().map(str::to_string),
                content_encoding: output.content_encoding().map(str::to_string),
                content_language: output.content_language().map(str::to_string),
                storage_class: output.storage_class().map(|c| c.as_str().to_string()),
            },
        })
    }

    async fn replace_metadata(&self, key: &str, content_type: &str, metadata: &ObjectMetadata) -> Result<()> {
        if key.is_empty() {
            exn::bail!(ErrorKind::InvalidKey(key.to_string()));
        }
        let _permit = self.acquire_permit().await?;
        let headers = &metadata.headers;
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .key(key)
            .copy_source(self.copy_source(key))
            .metadata_directive(MetadataDirective::Replace)
            .content_type(content_type)
            .set_metadata(Some(metadata.custom.clone().into_iter().collect()))
            .set_cache_control(headers.cache_control.clone())
            .set_content_disposition(headers.content_disposition.clone())
            .set_content_encoding(headers.content_encoding.clone())
            .set_content_language(headers.content_language.clone())
            .set_storage_class(headers.storage_class.as_deref().map(StorageClass::from))
            .send()
            .await
            .map_err(|e| Self::sdk_error(e, key))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::operation::copy_object::CopyObjectOutput;
    use aws_sdk_s3::operation::head_object::HeadObjectOutput;
    use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Output;
    use aws_sdk_s3::types::Object;
    use aws_smithy_mocks::{mock, mock_client};

    fn backend(client: Client) -> S3Backend {
        S3Backend::from_client(client, "bucket", "us-east-1")
    }

    #[test]
    fn test_copy_source_encodes_key_only() {
        let rule = mock!(Client::head_object).then_output(|| HeadObjectOutput::builder().build());
        let store = backend(mock_client!(aws_sdk_s3, [&rule]));
        assert_eq!(store.copy_source("a b/c+d.json"), "bucket/a%20b%2Fc%2Bd.json");
    }

    #[tokio::test]
    async fn test_list_page_maps_output() {
        let rule = mock!(Client::list_objects_v2)
            .match_requests(|req| {
                req.bucket() == Some("bucket")
                    && req.max_keys() == Some(2)
                    && req.prefix() == Some("img/")
                    && req.start_after() == Some("img/0.png")
            })
            .then_output(|| {
                ListObjectsV2Output::builder()
                    .contents(Object::builder().key("img/a.png").size(10).build())
                    .contents(Object::builder().key("img/b.png").size(20).build())
                    .is_truncated(true)
                    .next_continuation_token("token-2")
                    .build()
            });
        let store = backend(mock_client!(aws_sdk_s3, [&rule]));
        let cursor = Cursor::After("img/0.png".to_string());
        let page = store.list_page(Some("img/"), Some(&cursor), 2).await.unwrap();
        assert_eq!(page.objects, [ObjectRecord::new("img/a.png", 10), ObjectRecord::new("img/b.png", 20)]);
        assert!(page.truncated);
        assert_eq!(page.next_token.as_deref(), Some("token-2"));
        assert_eq!(rule.num_calls(), 1);
    }

    #[tokio::test]
    async fn test_list_page_uses_continuation_token() {
        let rule = mock!(Client::list_objects_v2)
            .match_requests(|req| req.continuation_token() == Some("token-2") && req.start_after().is_none())
            .then_output(|| ListObjectsV2Output::builder().is_truncated(false).build());
        let store = backend(mock_client!(aws_sdk_s3, [&rule]));
        let cursor = Cursor::Token("token-2".to_string());
        let page = store.list_page(None, Some(&cursor), 1000).await.unwrap();
        assert!(page.objects.is_empty());
        assert!(!page.truncated);
        assert_eq!(page.next_token, None);
    }

    #[tokio::test]
    async fn test_head_maps_metadata() {
        let rule = mock!(Client::head_object).match_requests(|req| req.key() == Some("a.json")).then_output(|| {
            HeadObjectOutput::builder()
                .content_type("text/plain ")
                .metadata("owner", "team-x")
                .cache_control("max-age=60")
                .build()
        });
        let store = backend(mock_client!(aws_sdk_s3, [&rule]));
        let metadata = store.head("a.json").await.unwrap();
        assert_eq!(metadata.content_type.as_deref(), Some("text/plain "));
        assert_eq!(metadata.custom.get("owner").map(String::as_str), Some("team-x"));
        assert_eq!(metadata.headers.cache_control.as_deref(), Some("max-age=60"));
        assert_eq!(metadata.headers.content_encoding, None);
    }

    #[tokio::test]
    async fn test_replace_sends_in_place_copy() {
        let rule = mock!(Client::copy_object)
            .match_requests(|req| {
                req.bucket() == Some("bucket")
                    && req.key() == Some("a.json")
                    && req.copy_source() == Some("bucket/a.json")
                    && req.metadata_directive() == Some(&MetadataDirective::Replace)
                    && req.content_type() == Some("application/json")
                    && req.metadata().and_then(|m| m.get("owner")).map(String::as_str) == Some("team-x")
                    && req.cache_control() == Some("max-age=60")
            })
            .then_output(|| CopyObjectOutput::builder().build());
        let store = backend(mock_client!(aws_sdk_s3, [&rule]));
        let metadata = ObjectMetadata::with_content_type("text/plain")
            .with_custom("owner", "team-x")
            .with_headers(PreservedHeaders {
                cache_control: Some("max-age=60".to_string()),
                ..PreservedHeaders::default()
            });
        store.replace_metadata("a.json", "application/json", &metadata).await.unwrap();
        assert_eq!(rule.num_calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let rule = mock!(Client::head_object).then_output(|| HeadObjectOutput::builder().build());
        let store = backend(mock_client!(aws_sdk_s3, [&rule]));
        let err = store.head("").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidKey(_)));
        assert_eq!(rule.num_calls(), 0);
    }
}
