// src/config.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Storage credentials, built once per process and handed to a single `Client`.

use std::fmt;

use crate::constants::DEFAULT_REGION;
use crate::error::{Error, Result};

/// Environment variables read by [`StorageCredentials::from_env`], primary name first.
const ACCESS_KEY_VARS: &[&str] = &["ACCESS_KEY", "AWS_ACCESS_KEY_ID"];
const SECRET_KEY_VARS: &[&str] = &["SECRET_KEY", "AWS_SECRET_ACCESS_KEY"];
const BUCKET_VARS: &[&str] = &["BUCKET_NAME", "S3_BUCKET"];
const REGION_VARS: &[&str] = &["REGION", "AWS_REGION"];
const ENDPOINT_VARS: &[&str] = &["API_URL", "AWS_ENDPOINT_URL"];

/// Endpoint, region, keys and default bucket. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct StorageCredentials {
    endpoint: Option<String>,
    region: String,
    access_key: String,
    secret_key: String,
    bucket: String,
}

impl StorageCredentials {
    pub fn new(
        endpoint: Option<String>,
        region: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Result<Self> {
        let mut region = region.into();
        if region.trim().is_empty() {
            region = DEFAULT_REGION.to_string();
        }
        let creds = Self {
            endpoint: endpoint.filter(|e| !e.trim().is_empty()),
            region,
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            bucket: bucket.into(),
        };
        creds.validate()?;
        Ok(creds)
    }

    /// Read credentials from the process environment (call `dotenvy::dotenv()` first if a
    /// `.env` file should be honoured).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| {
            names
                .iter()
                .find_map(|n| lookup(n).filter(|v| !v.trim().is_empty()))
        };

        let access_key = first(ACCESS_KEY_VARS);
        let secret_key = first(SECRET_KEY_VARS);
        let bucket = first(BUCKET_VARS);

        let missing: Vec<&str> = [
            (access_key.is_none(), ACCESS_KEY_VARS[0]),
            (secret_key.is_none(), SECRET_KEY_VARS[0]),
            (bucket.is_none(), BUCKET_VARS[0]),
        ]
        .into_iter()
        .filter_map(|(absent, name)| absent.then_some(name))
        .collect();
        if !missing.is_empty() {
            return Err(Error::ConfigurationInvalid(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        Self::new(
            first(ENDPOINT_VARS),
            first(REGION_VARS).unwrap_or_default(),
            access_key.unwrap_or_default(),
            secret_key.unwrap_or_default(),
            bucket.unwrap_or_default(),
        )
    }

    fn validate(&self) -> Result<()> {
        if self.access_key.trim().is_empty() || self.secret_key.trim().is_empty() {
            return Err(Error::ConfigurationInvalid(
                "access key and secret key must both be set".into(),
            ));
        }
        if self.bucket.trim().is_empty() {
            return Err(Error::ConfigurationInvalid("bucket name must be set".into()));
        }
        if let Some(endpoint) = &self.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(Error::ConfigurationInvalid(format!(
                    "endpoint must be an http:// or https:// URL, got '{endpoint}'"
                )));
            }
        }
        Ok(())
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    /// Default bucket, used unless a call overrides it.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown: String = self.access_key.chars().take(4).collect();
        f.debug_struct("StorageCredentials")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &format!("{shown}****"))
            .field("secret_key", &"****")
            .field("bucket", &self.bucket)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn primary_names_win_over_aws_fallbacks() {
        let creds = StorageCredentials::from_lookup(lookup(&[
            ("ACCESS_KEY", "primary-key"),
            ("AWS_ACCESS_KEY_ID", "aws-key"),
            ("SECRET_KEY", "secret"),
            ("BUCKET_NAME", "backups"),
            ("API_URL", "https://s3.example.com"),
        ]))
        .unwrap();
        assert_eq!(creds.access_key(), "primary-key");
        assert_eq!(creds.bucket(), "backups");
        assert_eq!(creds.region(), DEFAULT_REGION);
        assert_eq!(creds.endpoint(), Some("https://s3.example.com"));
    }

    #[test]
    fn aws_names_are_accepted() {
        let creds = StorageCredentials::from_lookup(lookup(&[
            ("AWS_ACCESS_KEY_ID", "aws-key"),
            ("AWS_SECRET_ACCESS_KEY", "aws-secret"),
            ("S3_BUCKET", "data"),
            ("AWS_REGION", "eu-central-1"),
        ]))
        .unwrap();
        assert_eq!(creds.region(), "eu-central-1");
        assert_eq!(creds.endpoint(), None);
    }

    #[test]
    fn every_missing_variable_is_reported() {
        let err = StorageCredentials::from_lookup(lookup(&[("ACCESS_KEY", "k")])).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, Error::ConfigurationInvalid(_)));
        assert!(msg.contains("SECRET_KEY"), "{msg}");
        assert!(msg.contains("BUCKET_NAME"), "{msg}");
        assert!(!msg.contains("ACCESS_KEY,"), "{msg}");
    }

    #[test]
    fn endpoint_must_be_http() {
        let err = StorageCredentials::new(Some("s3.example.com".into()), "", "k", "s", "b")
            .unwrap_err();
        assert!(matches!(err, Error::ConfigurationInvalid(_)));
    }

    #[test]
    fn debug_hides_secret() {
        let creds = StorageCredentials::new(None, "us-east-1", "AKIAEXAMPLE", "topsecret", "b")
            .unwrap();
        let shown = format!("{creds:?}");
        assert!(!shown.contains("topsecret"));
        assert!(shown.contains("AKIA****"));
    }
}
