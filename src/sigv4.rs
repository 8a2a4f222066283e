//! AWS Signature Version 4 signing.
//!
//! Shared by the object-store client (service `s3`) and the vector-index
//! gateway (service `aoss` or `es`). Implemented with pure-Rust
//! dependencies (`hmac`, `sha2`, `hex`) — no C library dependencies,
//! compatible with all build environments.
//!
//! Two modes are supported:
//! - **Header signing** ([`RequestSigner::sign_headers`]) for API calls.
//! - **Query-string presigning** ([`RequestSigner::presign_url`]) for
//!   time-limited GET links handed to end users.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// AWS credentials loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl AwsCredentials {
    /// Load credentials from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`,
    /// and optionally `AWS_SESSION_TOKEN`. Returns `None` when either
    /// required variable is absent, in which case requests go unsigned.
    pub fn from_env() -> Option<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").ok()?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok()?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();

        Some(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

/// Signs requests for one (credentials, region, service) combination.
pub struct RequestSigner<'a> {
    creds: &'a AwsCredentials,
    region: &'a str,
    service: &'a str,
}

impl<'a> RequestSigner<'a> {
    pub fn new(creds: &'a AwsCredentials, region: &'a str, service: &'a str) -> Self {
        Self {
            creds,
            region,
            service,
        }
    }

    /// Produce the headers to attach to a signed request:
    /// `Authorization`, `x-amz-content-sha256`, `x-amz-date`, and
    /// `x-amz-security-token` when temporary credentials are in use.
    ///
    /// `uri` must already be URI-encoded per segment; `query` is sorted and
    /// encoded internally. The `host` header itself is set by the HTTP
    /// client from the URL, but participates in the signature.
    pub fn sign_headers(
        &self,
        method: &str,
        host: &str,
        uri: &str,
        query: &[(String, String)],
        payload_hash: &str,
        now: DateTime<Utc>,
    ) -> Vec<(String, String)> {
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let canonical_querystring = canonical_query_string(query);

        let mut headers = vec![
            ("host".to_string(), host.to_string()),
            ("x-amz-content-sha256".to_string(), payload_hash.to_string()),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        if let Some(ref token) = self.creds.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        let signed_headers: String = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v))
            .collect();

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method, uri, canonical_querystring, canonical_headers, signed_headers, payload_hash
        );

        let credential_scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.region, self.service
        );
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key = derive_signing_key(
            &self.creds.secret_access_key,
            &date_stamp,
            self.region,
            self.service,
        );
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.creds.access_key_id, credential_scope, signed_headers, signature
        );

        let mut out = vec![("authorization".to_string(), authorization)];
        out.extend(
            headers
                .into_iter()
                .filter(|(k, _)| k != "host"),
        );
        out
    }

    /// Build a presigned GET URL valid for `expires_secs` seconds.
    ///
    /// Uses query-string authentication with `UNSIGNED-PAYLOAD` and `host`
    /// as the only signed header, the standard form for links opened in a
    /// browser.
    pub fn presign_url(
        &self,
        scheme: &str,
        host: &str,
        uri: &str,
        expires_secs: u64,
        now: DateTime<Utc>,
    ) -> String {
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let credential_scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.region, self.service
        );

        let mut query: Vec<(String, String)> = vec![
            (
                "X-Amz-Algorithm".to_string(),
                "AWS4-HMAC-SHA256".to_string(),
            ),
            (
                "X-Amz-Credential".to_string(),
                format!("{}/{}", self.creds.access_key_id, credential_scope),
            ),
            ("X-Amz-Date".to_string(), amz_date.clone()),
            ("X-Amz-Expires".to_string(), expires_secs.to_string()),
            ("X-Amz-SignedHeaders".to_string(), "host".to_string()),
        ];
        if let Some(ref token) = self.creds.session_token {
            query.push(("X-Amz-Security-Token".to_string(), token.clone()));
        }

        let canonical_querystring = canonical_query_string(&query);
        let canonical_request = format!(
            "GET\n{}\n{}\nhost:{}\n\nhost\nUNSIGNED-PAYLOAD",
            uri, canonical_querystring, host
        );

        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key = derive_signing_key(
            &self.creds.secret_access_key,
            &date_stamp,
            self.region,
            self.service,
        );
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        format!(
            "{}://{}{}?{}&X-Amz-Signature={}",
            scheme, host, uri, canonical_querystring, signature
        )
    }
}

/// Sort and encode query parameters into SigV4 canonical form.
pub fn canonical_query_string(params: &[(String, String)]) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    sorted
        .iter()
        .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Compute the hex-encoded SHA-256 hash of data.
pub fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute HMAC-SHA256 of data with the given key.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Compute hex-encoded HMAC-SHA256.
fn hex_hmac_sha256(key: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_sha256(key, data))
}

/// Derive the SigV4 signing key for a given date, region, and service.
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// URI-encode a string per RFC 3986 (used in canonical requests).
///
/// Encodes all characters except unreserved characters:
/// `A-Z a-z 0-9 - _ . ~`
pub fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

/// URI-encode an object key, preserving `/` as the segment separator.
pub fn uri_encode_path(key: &str) -> String {
    key.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}
