//! # Object Store Module
//!
//! Questo modulo astrae lo storage remoto come un blob store chiave/valore.
//!
//! ## Responsabilità:
//! - Definisce il trait `ObjectStore` (`write` + `list`)
//! - Implementa `S3Store` su `aws-sdk-s3` per AWS e endpoint S3-compatibili
//! - Gestisce content type opzionale: se assente l'header non viene inviato
//!
//! ## Note:
//! - Con un endpoint custom viene forzato l'addressing path-style
//!   (bucket con punti nel nome, MinIO, ecc.)
//! - `list` pagina con continuation token fino ad esaurimento

use crate::credentials::Credentials;
use crate::error::{SupError, SupResult};
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials as AwsCredentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as AwsS3Client;
use std::path::Path;
use tracing::debug;

/// Remote key/value blob store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload a local file under `key`, with an optional content type
    async fn write(
        &self,
        key: &str,
        local_path: &Path,
        content_type: Option<&str>,
    ) -> SupResult<()>;

    /// List every key starting with `prefix`
    async fn list(&self, prefix: &str) -> SupResult<Vec<String>>;

    /// Human readable location, for logs
    fn describe(&self, key: &str) -> String;
}

/// S3 backed object store
#[derive(Clone)]
pub struct S3Store {
    client: AwsS3Client,
    bucket: String,
}

impl S3Store {
    /// Default region when neither the credentials nor the environment provide one
    const FALLBACK_REGION: &'static str = "us-east-1";

    /// Build a client for `bucket` from the credentials file contents
    pub async fn new(bucket: &str, credentials: &Credentials) -> SupResult<Self> {
        if bucket.is_empty() {
            return Err(SupError::Validation("bucket name must not be empty".to_string()));
        }

        let region_provider = match credentials.region {
            Some(ref region) => RegionProviderChain::first_try(Region::new(region.clone())),
            None => RegionProviderChain::default_provider()
                .or_else(Region::new(Self::FALLBACK_REGION)),
        };

        let aws_credentials = AwsCredentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            None,
            None,
            "sup-credentials-file",
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .credentials_provider(aws_credentials)
            .load()
            .await;

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&aws_config);
        if let Some(ref endpoint) = credentials.endpoint {
            let endpoint = Self::normalize_endpoint(endpoint);
            debug!("Using custom S3 endpoint {}", endpoint);
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint)
                .force_path_style(true);
        }

        Ok(Self {
            client: AwsS3Client::from_conf(s3_config_builder.build()),
            bucket: bucket.to_string(),
        })
    }

    /// Endpoints are often given as bare hostnames
    fn normalize_endpoint(endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("https://{}", endpoint)
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn write(
        &self,
        key: &str,
        local_path: &Path,
        content_type: Option<&str>,
    ) -> SupResult<()> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| SupError::Store(format!("cannot read {}: {}", local_path.display(), e)))?;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body);

        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }

        request
            .send()
            .await
            .map_err(|e| {
                SupError::Store(format!("{}: {}", self.describe(key), DisplayErrorContext(&e)))
            })?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> SupResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);

            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| SupError::Store(DisplayErrorContext(&e).to_string()))?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        debug!("Listed {} keys under s3://{}/{}", keys.len(), self.bucket, prefix);
        Ok(keys)
    }

    fn describe(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(
            S3Store::normalize_endpoint("s3-eu-west-1.amazonaws.com"),
            "https://s3-eu-west-1.amazonaws.com"
        );
        assert_eq!(
            S3Store::normalize_endpoint("http://localhost:9000"),
            "http://localhost:9000"
        );
    }
}
