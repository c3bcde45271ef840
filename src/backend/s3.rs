//! S3-compatible object probe
//!
//! One `HeadObject` per key; no object content is fetched. Path-style
//! addressing is always used since the archive buckets sit behind
//! S3-compatible gateways rather than AWS virtual hosts.

use super::error::{BackendError, BackendResult};
use super::ObjectProbe;
use crate::config::S3Config;
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client as AwsS3Client;
use std::time::Duration;
use tracing::debug;

const BACKEND: &str = "s3";

#[derive(Clone)]
pub struct S3Probe {
    client: AwsS3Client,
    bucket: String,
}

impl S3Probe {
    /// Build the client and make sure the bucket is reachable.
    ///
    /// A missing bucket answers every `HeadObject` with 404, which would read
    /// as "missing in storage" for each file, so it is rejected up front.
    pub async fn new(config: &S3Config) -> BackendResult<Self> {
        if config.bucket.is_empty() {
            return Err(BackendError::InvalidConfig {
                backend: BACKEND.to_string(),
                message: "s3.bucket is required".to_string(),
            });
        }

        let probe = Self {
            client: Self::build_aws_client(config).await,
            bucket: config.bucket.clone(),
        };
        probe.check_bucket().await?;
        debug!(endpoint = %config.endpoint(), bucket = %config.bucket, "S3 client ready");

        Ok(probe)
    }

    async fn build_aws_client(config: &S3Config) -> AwsS3Client {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(RegionProviderChain::first_try(Region::new(config.region.clone())));

        if !config.access_key.is_empty() && !config.secret_key.is_empty() {
            let credentials = Credentials::new(
                &config.access_key,
                &config.secret_key,
                None,
                None,
                "reconcile-s3",
            );
            loader = loader.credentials_provider(credentials);
        }

        let aws_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&aws_config).force_path_style(true);
        if !config.url.is_empty() {
            builder = builder.endpoint_url(config.endpoint());
        }

        let timeout_config = aws_sdk_s3::config::timeout::TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(config.timeout_secs))
            .build();
        builder = builder.timeout_config(timeout_config);

        AwsS3Client::from_conf(builder.build())
    }

    async fn check_bucket(&self) -> BackendResult<()> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(()),
            Err(e) => {
                let status = e.raw_response().map(|r| r.status().as_u16());
                let message = DisplayErrorContext(&e).to_string();
                Err(bucket_error(&self.bucket, status, message))
            }
        }
    }
}

/// Map a failed `HeadBucket` to the error reported at startup
fn bucket_error(bucket: &str, status: Option<u16>, message: String) -> BackendError {
    match status {
        Some(404) => BackendError::InvalidConfig {
            backend: BACKEND.to_string(),
            message: format!("bucket '{}' does not exist", bucket),
        },
        Some(403) => BackendError::InvalidConfig {
            backend: BACKEND.to_string(),
            message: format!("access to bucket '{}' denied", bucket),
        },
        _ => BackendError::connection(
            BACKEND,
            format!("cannot reach bucket '{}': {}", bucket, message),
        ),
    }
}

/// Only an HTTP 404 means the key is absent. Gateways that answer HEAD with a
/// bare 404 carry no modelled error, so the status is checked directly.
fn is_not_found_status(status: Option<u16>) -> bool {
    status == Some(404)
}

#[async_trait]
impl ObjectProbe for S3Probe {
    async fn exists(&self, key: &str) -> BackendResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_not_found())
                    || is_not_found_status(e.raw_response().map(|r| r.status().as_u16()))
                {
                    Ok(false)
                } else {
                    Err(BackendError::transport(BACKEND, DisplayErrorContext(&e).to_string()))
                }
            }
        }
    }

    fn name(&self) -> &str {
        BACKEND
    }
}
