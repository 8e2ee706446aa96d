// src/s3_client.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Builds the AWS SDK S3 client from explicit credentials.
//!
//! Nothing is read from the ambient AWS profile chain: keys, region and endpoint all come from
//! the `StorageCredentials` handed in, so the same binary talks to AWS or to any
//! S3-compatible service.

use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region, RequestChecksumCalculation, ResponseChecksumValidation};
use aws_sdk_s3::error::DisplayErrorContext;
use tracing::debug;

use crate::config::StorageCredentials;
use crate::constants::DEFAULT_CONNECT_TIMEOUT_SECS;

const CREDENTIALS_PROVIDER_NAME: &str = "s3manager-static";

/// Create an S3 client for `creds`.
///
/// A custom endpoint switches to path-style addressing (`endpoint/bucket/key`), which is what
/// MinIO, Ceph and most other S3-compatible services expect. Checksums are only computed and
/// validated when an operation requires them, since several of those services reject the
/// newer default integrity headers.
pub async fn build_client(creds: &StorageCredentials) -> Client {
    let static_creds = Credentials::new(
        creds.access_key(),
        creds.secret_key(),
        None,
        None,
        CREDENTIALS_PROVIDER_NAME,
    );

    let timeout_config = TimeoutConfig::builder()
        .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
        .build();

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(creds.region().to_string()))
        .credentials_provider(static_creds)
        .timeout_config(timeout_config);
    if let Some(endpoint) = creds.endpoint() {
        loader = loader.endpoint_url(endpoint);
    }
    let cfg = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&cfg)
        .force_path_style(creds.endpoint().is_some())
        .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
        .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
        .build();

    debug!(
        "S3 client ready: region={}, endpoint={}",
        creds.region(),
        creds.endpoint().unwrap_or("<aws default>")
    );
    Client::from_conf(s3_config)
}

/// Render an SDK error with its full source chain (service code, message, HTTP status).
pub(crate) fn sdk_err<E>(context: &str, err: E) -> anyhow::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    anyhow::anyhow!("{context}: {}", DisplayErrorContext(err))
}
