//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the `Client` trait from stow-core for one
//! `alias/bucket/key` target. An empty bucket addresses the whole endpoint,
//! an empty key the whole bucket.

use std::fmt::Display;

use async_trait::async_trait;
use bytes::Bytes;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::BucketCannedAcl;
use jiff::Timestamp;
use stow_core::stream::DEFAULT_BUFFER;
use stow_core::{
    Alias, BucketAcl, Client, Content, ContentStream, Error, ObjectReader, RemotePath, Result,
    RetryConfig, TaskStream, is_retryable_error, retry_with_backoff,
};
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use url::Url;

/// S3 client wrapper bound to one target
pub struct S3Client {
    inner: aws_sdk_s3::Client,
    alias: Alias,
    path: RemotePath,
    url: Url,
}

impl S3Client {
    /// Create a new S3 client from an alias configuration
    pub async fn new(alias: Alias, path: RemotePath) -> Result<Self> {
        let url = object_url(&alias.endpoint, &path)?;

        let credentials = aws_credential_types::Credentials::new(
            alias.access_key.clone(),
            alias.secret_key.clone(),
            None, // session token
            None, // expiry
            "stow-static-credentials",
        );

        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_config::Region::new(alias.region.clone()))
            .endpoint_url(&alias.endpoint)
            .load()
            .await;

        // Path-style addressing for compatibility with self-hosted endpoints
        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(alias.bucket_lookup == "path" || alias.bucket_lookup == "auto")
            .build();

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            alias,
            path,
            url,
        })
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }

    fn retry(&self) -> &RetryConfig {
        &self.alias.retry
    }

    fn require_bucket(&self) -> Result<&str> {
        if self.path.bucket.is_empty() {
            return Err(Error::InvalidPath(format!(
                "{} does not name a bucket",
                self.path
            )));
        }
        Ok(&self.path.bucket)
    }

    async fn head_object(&self) -> Result<Content> {
        let target = self.path.to_string();
        let response = retry_with_backoff(
            self.retry(),
            || async {
                self.inner
                    .head_object()
                    .bucket(&self.path.bucket)
                    .key(&self.path.key)
                    .send()
                    .await
                    .map_err(|e| classify(&e, &target))
            },
            is_retryable_error,
        )
        .await?;

        let size = response.content_length().unwrap_or(0).max(0) as u64;
        Ok(Content::file(base_name(&self.path.key), size)
            .with_modified(response.last_modified().and_then(|t| timestamp(t.secs()))))
    }

    /// Whether any object lives under `key/`
    async fn is_prefix(&self) -> Result<bool> {
        let target = self.path.to_string();
        let prefix = dir_prefix(&self.path.key);
        let response = retry_with_backoff(
            self.retry(),
            || async {
                self.inner
                    .list_objects_v2()
                    .bucket(&self.path.bucket)
                    .prefix(&prefix)
                    .max_keys(1)
                    .send()
                    .await
                    .map_err(|e| classify(&e, &target))
            },
            is_retryable_error,
        )
        .await?;
        Ok(response.key_count().unwrap_or(0) > 0 || !response.contents().is_empty())
    }
}

/// Map an SDK failure onto the error enum
fn classify<E>(error: &SdkError<E>, target: &str) -> Error
where
    E: ProvideErrorMetadata + Display,
{
    let status = error.raw_response().map(|r| r.status().as_u16());
    match (status, error.code()) {
        (Some(404), _) | (_, Some("NoSuchKey" | "NoSuchBucket" | "NotFound")) => {
            Error::NotFound(target.to_string())
        }
        (Some(403), _) | (_, Some("AccessDenied")) => Error::PermissionDenied(target.to_string()),
        _ => Error::Network(format_sdk_error(error)),
    }
}

/// Format AWS SDK error into a detailed error message
fn format_sdk_error<E: Display>(error: &SdkError<E>) -> String {
    match error {
        SdkError::ServiceError(service_err) => {
            let meta = service_err.raw();
            let mut msg = format!(
                "Service error ({}): {}",
                meta.status().as_u16(),
                service_err.err()
            );
            if let Some(code) = meta.headers().get("x-amz-error-code") {
                msg.push_str(&format!(" (code: {code})"));
            }
            msg
        }
        SdkError::ConstructionFailure(err) => format!("Request construction failed: {err:?}"),
        SdkError::TimeoutError(_) => "Request timeout".to_string(),
        SdkError::DispatchFailure(err) => format!("Network dispatch error: {err:?}"),
        SdkError::ResponseError(err) => format!("Response error: {err:?}"),
        _ => error.to_string(),
    }
}

fn timestamp(secs: i64) -> Option<Timestamp> {
    Timestamp::from_second(secs).ok()
}

fn object_url(endpoint: &str, path: &RemotePath) -> Result<Url> {
    let mut url =
        Url::parse(endpoint).map_err(|e| Error::Config(format!("Invalid endpoint {endpoint}: {e}")))?;
    let mut resource = String::from("/");
    if !path.bucket.is_empty() {
        resource.push_str(&path.bucket);
        if !path.key.is_empty() {
            resource.push('/');
            resource.push_str(&path.key);
        }
    }
    url.set_path(&resource);
    Ok(url)
}

fn base_name(key: &str) -> &str {
    key.trim_end_matches('/').rsplit('/').next().unwrap_or(key)
}

/// `key` as a listing prefix: empty stays empty, otherwise it ends with `/`
fn dir_prefix(key: &str) -> String {
    if key.is_empty() || key.ends_with('/') {
        key.to_string()
    } else {
        format!("{key}/")
    }
}

/// HTTP range for `get_object`; `None` reads the whole object
fn range_header(offset: u64, length: u64) -> Option<String> {
    match (offset, length) {
        (0, 0) => None,
        (offset, 0) => Some(format!("bytes={offset}-")),
        (offset, length) => Some(format!("bytes={offset}-{}", offset + length - 1)),
    }
}

/// Entry name relative to the listed prefix; directories lose their trailing `/`
fn entry_name(key: &str, prefix: &str) -> String {
    key.strip_prefix(prefix)
        .unwrap_or(key)
        .trim_end_matches('/')
        .to_string()
}

async fn list_buckets(
    client: aws_sdk_s3::Client,
    retry: RetryConfig,
    alias: String,
    tx: mpsc::Sender<Result<Content>>,
) {
    let response = retry_with_backoff(
        &retry,
        || async {
            client
                .list_buckets()
                .send()
                .await
                .map_err(|e| classify(&e, &alias))
        },
        is_retryable_error,
    )
    .await;

    let response = match response {
        Ok(response) => response,
        Err(e) => {
            let _ = tx.send(Err(e)).await;
            return;
        }
    };

    for bucket in response.buckets() {
        let content = Content::dir(bucket.name().unwrap_or_default())
            .with_modified(bucket.creation_date().and_then(|t| timestamp(t.secs())));
        if tx.send(Ok(content)).await.is_err() {
            return;
        }
    }
}

async fn list_objects(
    client: aws_sdk_s3::Client,
    retry: RetryConfig,
    path: RemotePath,
    recursive: bool,
    tx: mpsc::Sender<Result<Content>>,
) {
    let target = path.to_string();
    let prefix = dir_prefix(&path.key);
    let mut continuation: Option<String> = None;

    loop {
        let page = retry_with_backoff(
            &retry,
            || async {
                let mut request = client.list_objects_v2().bucket(&path.bucket);
                if !prefix.is_empty() {
                    request = request.prefix(&prefix);
                }
                if !recursive {
                    request = request.delimiter("/");
                }
                if let Some(token) = &continuation {
                    request = request.continuation_token(token);
                }
                request.send().await.map_err(|e| classify(&e, &target))
            },
            is_retryable_error,
        )
        .await;

        let page = match page {
            Ok(page) => page,
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                return;
            }
        };

        for common in page.common_prefixes() {
            if let Some(p) = common.prefix()
                && tx.send(Ok(Content::dir(entry_name(p, &prefix)))).await.is_err()
            {
                return;
            }
        }

        for object in page.contents() {
            let key = object.key().unwrap_or_default();
            let size = object.size().unwrap_or(0).max(0) as u64;
            let content = Content::file(entry_name(key, &prefix), size)
                .with_modified(object.last_modified().and_then(|t| timestamp(t.secs())));
            if tx.send(Ok(content)).await.is_err() {
                return;
            }
        }

        match page.next_continuation_token() {
            Some(token) if page.is_truncated().unwrap_or(false) => {
                tracing::debug!(target_path = %target, "Fetching next listing page");
                continuation = Some(token.to_string());
            }
            _ => return,
        }
    }
}

#[async_trait]
impl Client for S3Client {
    async fn stat(&self) -> Result<Content> {
        if self.path.bucket.is_empty() {
            return Ok(Content::dir(&self.alias.name));
        }

        if self.path.key.is_empty() {
            let target = self.path.to_string();
            retry_with_backoff(
                self.retry(),
                || async {
                    self.inner
                        .head_bucket()
                        .bucket(&self.path.bucket)
                        .send()
                        .await
                        .map_err(|e| classify(&e, &target))
                },
                is_retryable_error,
            )
            .await?;
            return Ok(Content::dir(&self.path.bucket));
        }

        if !self.path.key.ends_with('/') {
            match self.head_object().await {
                Err(Error::NotFound(_)) => {}
                other => return other,
            }
        }

        if self.is_prefix().await? {
            Ok(Content::dir(base_name(&self.path.key)))
        } else {
            Err(Error::NotFound(self.path.to_string()))
        }
    }

    fn list(&self, recursive: bool) -> ContentStream {
        let client = self.inner.clone();
        let retry = self.alias.retry.clone();
        let path = self.path.clone();
        let alias = self.alias.name.clone();

        if path.bucket.is_empty() {
            return TaskStream::spawn(DEFAULT_BUFFER, move |tx| {
                list_buckets(client, retry, alias, tx)
            });
        }

        let single = (!path.key.is_empty() && !path.key.ends_with('/'))
            .then(|| S3Client {
                inner: self.inner.clone(),
                alias: self.alias.clone(),
                path: self.path.clone(),
                url: self.url.clone(),
            });

        TaskStream::spawn(DEFAULT_BUFFER, move |tx| async move {
            // A key naming an object lists just that object.
            if let Some(object) = single {
                match object.head_object().await {
                    Ok(content) => {
                        let _ = tx.send(Ok(content)).await;
                        return;
                    }
                    Err(Error::NotFound(_)) => {}
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }
            list_objects(client, retry, path, recursive, tx).await;
        })
    }

    async fn make_bucket(&self) -> Result<()> {
        let bucket = self.require_bucket()?;
        let target = self.path.to_string();
        retry_with_backoff(
            self.retry(),
            || async {
                self.inner
                    .create_bucket()
                    .bucket(bucket)
                    .send()
                    .await
                    .map_err(|e| classify(&e, &target))
            },
            is_retryable_error,
        )
        .await?;
        Ok(())
    }

    async fn set_bucket_acl(&self, acl: BucketAcl) -> Result<()> {
        let bucket = self.require_bucket()?;
        let target = self.path.to_string();
        retry_with_backoff(
            self.retry(),
            || async {
                self.inner
                    .put_bucket_acl()
                    .bucket(bucket)
                    .acl(BucketCannedAcl::from(acl.as_str()))
                    .send()
                    .await
                    .map_err(|e| classify(&e, &target))
            },
            is_retryable_error,
        )
        .await?;
        Ok(())
    }

    async fn get_object(&self, offset: u64, length: u64) -> Result<(ObjectReader, u64)> {
        let bucket = self.require_bucket()?;
        let target = self.path.to_string();
        let range = range_header(offset, length);

        let response = retry_with_backoff(
            self.retry(),
            || async {
                self.inner
                    .get_object()
                    .bucket(bucket)
                    .key(&self.path.key)
                    .set_range(range.clone())
                    .send()
                    .await
                    .map_err(|e| classify(&e, &target))
            },
            is_retryable_error,
        )
        .await?;

        let size = response.content_length().unwrap_or(0).max(0) as u64;
        Ok((Box::pin(response.body.into_async_read()), size))
    }

    async fn put_object(&self, size: u64, data: ObjectReader) -> Result<()> {
        let bucket = self.require_bucket()?;
        let target = self.path.to_string();

        let body = read_body(data, size).await?;
        let content_type = mime_guess::from_path(&self.path.key)
            .first_or_octet_stream()
            .to_string();

        retry_with_backoff(
            self.retry(),
            || async {
                self.inner
                    .put_object()
                    .bucket(bucket)
                    .key(&self.path.key)
                    .content_type(&content_type)
                    .body(ByteStream::from(body.clone()))
                    .send()
                    .await
                    .map_err(|e| classify(&e, &target))
            },
            is_retryable_error,
        )
        .await?;

        tracing::debug!(target_path = %target, size, "Uploaded object");
        Ok(())
    }

    fn url(&self) -> Url {
        self.url.clone()
    }
}

/// Buffer exactly `size` bytes of `data` for upload
///
/// Retries clone the returned `Bytes`, which shares the allocation.
async fn read_body(data: ObjectReader, size: u64) -> Result<Bytes> {
    let mut buf = Vec::new();
    data.take(size).read_to_end(&mut buf).await?;
    if buf.len() as u64 != size {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("expected {size} bytes, source provided {}", buf.len()),
        )));
    }
    Ok(Bytes::from(buf))
}
