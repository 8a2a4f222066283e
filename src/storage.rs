//! Object storage access for source PDFs.
//!
//! Fetches raw document bytes during event-driven ingestion and mints
//! time-limited GET links so answer citations can point back at the
//! original file. Speaks plain HTTPS to S3 (or any S3-compatible endpoint)
//! with SigV4 signing from [`crate::sigv4`].

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;

use crate::config::StorageConfig;
use crate::sigv4::{hex_sha256, uri_encode_path, AwsCredentials, RequestSigner};

const DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Read-side operations against the document bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download one object in full.
    async fn get_object(&self, key: &str) -> Result<Vec<u8>>;
    /// Time-limited link to an object, for inclusion in citations.
    fn presign_get(&self, key: &str) -> Result<String>;
}

/// S3 client built on the shared SigV4 signer.
pub struct S3Store {
    config: StorageConfig,
    creds: AwsCredentials,
    http: reqwest::Client,
}

impl S3Store {
    /// Fails when AWS credentials are absent from the environment, since
    /// every S3 call this store makes must be signed.
    pub fn new(config: StorageConfig) -> Result<Self> {
        let creds = AwsCredentials::from_env()
            .context("AWS credentials required for object storage (set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY)")?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            config,
            creds,
            http,
        })
    }

    /// Scheme and host for bucket requests. Virtual-hosted style against
    /// AWS proper; path-style against custom endpoints, which is what
    /// MinIO and LocalStack expect.
    fn scheme_host_prefix(&self) -> (String, String, String) {
        match self.config.endpoint_url {
            Some(ref endpoint) => {
                let trimmed = endpoint.trim_end_matches('/');
                let (scheme, host) = match trimmed.split_once("://") {
                    Some((s, h)) => (s.to_string(), h.to_string()),
                    None => ("https".to_string(), trimmed.to_string()),
                };
                (scheme, host, format!("/{}", self.config.bucket))
            }
            None => (
                "https".to_string(),
                format!("{}.s3.{}.amazonaws.com", self.config.bucket, self.config.region),
                String::new(),
            ),
        }
    }

    fn object_uri(&self, key: &str) -> String {
        let (_, _, prefix) = self.scheme_host_prefix();
        format!("{}/{}", prefix, uri_encode_path(key))
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let (scheme, host, _) = self.scheme_host_prefix();
        let uri = self.object_uri(key);
        let url = format!("{}://{}{}", scheme, host, uri);

        let signer = RequestSigner::new(&self.creds, &self.config.region, "s3");
        let headers = signer.sign_headers("GET", &host, &uri, &[], &hex_sha256(b""), Utc::now());

        let mut request = self.http.get(&url);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let resp = request
            .send()
            .await
            .with_context(|| format!("failed to fetch s3://{}/{}", self.config.bucket, key))?;
        let status = resp.status();
        if !status.is_success() {
            bail!(
                "object fetch s3://{}/{} failed with status {}",
                self.config.bucket,
                key,
                status
            );
        }

        Ok(resp.bytes().await?.to_vec())
    }

    fn presign_get(&self, key: &str) -> Result<String> {
        let (scheme, host, _) = self.scheme_host_prefix();
        let uri = self.object_uri(key);
        let signer = RequestSigner::new(&self.creds, &self.config.region, "s3");
        Ok(signer.presign_url(
            &scheme,
            &host,
            &uri,
            self.config.presign_expiry_secs,
            Utc::now(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(endpoint_url: Option<&str>) -> S3Store {
        S3Store {
            config: StorageConfig {
                bucket: "docs".to_string(),
                region: "us-east-1".to_string(),
                endpoint_url: endpoint_url.map(str::to_string),
                presign_expiry_secs: 3600,
            },
            creds: AwsCredentials {
                access_key_id: "AKIDEXAMPLE".to_string(),
                secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
                session_token: None,
            },
            http: reqwest::Client::new(),
        }
    }

    #[test]
    fn virtual_hosted_addressing_against_aws() {
        let s = store(None);
        let (scheme, host, prefix) = s.scheme_host_prefix();
        assert_eq!(scheme, "https");
        assert_eq!(host, "docs.s3.us-east-1.amazonaws.com");
        assert_eq!(prefix, "");
        assert_eq!(s.object_uri("annual report.pdf"), "/annual%20report.pdf");
    }

    #[test]
    fn path_style_addressing_against_custom_endpoint() {
        let s = store(Some("http://localhost:9000"));
        let (scheme, host, _) = s.scheme_host_prefix();
        assert_eq!(scheme, "http");
        assert_eq!(host, "localhost:9000");
        assert_eq!(s.object_uri("a/b.pdf"), "/docs/a/b.pdf");
    }

    #[test]
    fn presigned_links_carry_expiry() {
        let s = store(None);
        let url = s.presign_get("report.pdf").unwrap();
        assert!(url.starts_with("https://docs.s3.us-east-1.amazonaws.com/report.pdf?"));
        assert!(url.contains("X-Amz-Expires=3600"));
        assert!(url.contains("X-Amz-Signature="));
    }
}
