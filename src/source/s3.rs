//! Amazon S3 object store

use super::ObjectStore;
use crate::config::StorageConfig;
use crate::error::FetchError;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use tracing::{debug, trace};

/// [`ObjectStore`] backed by the AWS S3 API
#[derive(Clone, Debug)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Wrap an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the ambient AWS configuration
    ///
    /// Credentials come from the default provider chain. A configured endpoint
    /// (LocalStack, MinIO) switches the client to path-style addressing.
    pub async fn from_config(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        let builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        let s3_config = if config.endpoint_url.is_some() {
            builder.force_path_style(true).build()
        } else {
            builder.build()
        };

        Self::new(Client::from_conf(s3_config))
    }
}

/// No response came back from S3 at all
///
/// The request was never built, never reached the endpoint, or timed out. Unlike a
/// service error this says nothing about the object, only that storage cannot be
/// reached.
fn is_unreachable<E, R>(err: &SdkError<E, R>) -> bool {
    matches!(
        err,
        SdkError::ConstructionFailure(_) | SdkError::DispatchFailure(_) | SdkError::TimeoutError(_)
    )
}

fn unavailable<E, R>(bucket: &str, err: &SdkError<E, R>) -> FetchError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    FetchError::Unavailable(format!(
        "bucket {} unreachable: {}",
        bucket,
        DisplayErrorContext(err)
    ))
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, FetchError> {
        debug!(bucket = bucket, key = key, "downloading object");

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(service) if service.is_no_such_key() => FetchError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                },
                _ if is_unreachable(&e) => unavailable(bucket, &e),
                _ => FetchError::Remote {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    reason: DisplayErrorContext(&e).to_string(),
                },
            })?;

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| FetchError::Remote {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: format!("failed to read body: {}", e),
            })?;

        let data = body.into_bytes().to_vec();
        trace!(bucket = bucket, key = key, size = data.len(), "downloaded object");
        Ok(data)
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, FetchError> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .delimiter("/");

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|e| {
                if is_unreachable(&e) {
                    return unavailable(bucket, &e);
                }
                FetchError::List {
                    bucket: bucket.to_string(),
                    prefix: prefix.to_string(),
                    reason: DisplayErrorContext(&e).to_string(),
                }
            })?;

            for object in response.contents.unwrap_or_default() {
                let key = object.key.unwrap_or_default();
                // Folder placeholders
                if key.is_empty() || key.ends_with('/') {
                    continue;
                }
                keys.push(key);
            }

            if response.is_truncated == Some(true) {
                continuation_token = response.next_continuation_token;
                if continuation_token.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        debug!(bucket = bucket, prefix = prefix, count = keys.len(), "listed objects");
        Ok(keys)
    }
}
