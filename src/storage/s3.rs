//! S3-compatible storage provider with AWS Signature Version 4 signing.
//!
//! Targets MinIO-style endpoints: path-style addressing, single-request
//! PUT, signed payload hash. Object keys produced by this crate contain
//! only unreserved characters and `/`, so the canonical URI is exactly the
//! request path with no extra percent-encoding step.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::config::FileStorageConfig;

use super::{ObjectStorage, StorageError, UploadFuture, UploadInput};

type HmacSha256 = Hmac<Sha256>;

const SIGNING_ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
const SIGNED_HEADERS: &str = "content-type;host;x-amz-content-sha256;x-amz-date";

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, StorageError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|err| StorageError::Signing {
        message: err.to_string(),
    })?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Inputs to one signature computation.
struct SigningContext<'a> {
    canonical_uri: &'a str,
    host: &'a str,
    content_type: &'a str,
    payload_hash: &'a str,
    amz_date: &'a str,
    date: &'a str,
}

fn canonical_request(ctx: &SigningContext<'_>) -> String {
    format!(
        "PUT\n{uri}\n\ncontent-type:{content_type}\nhost:{host}\nx-amz-content-sha256:{payload_hash}\nx-amz-date:{amz_date}\n\n{SIGNED_HEADERS}\n{payload_hash}",
        uri = ctx.canonical_uri,
        content_type = ctx.content_type,
        host = ctx.host,
        payload_hash = ctx.payload_hash,
        amz_date = ctx.amz_date,
    )
}

fn credential_scope(date: &str, region: &str) -> String {
    format!("{date}/{region}/{SERVICE}/aws4_request")
}

fn signing_key(
    secret_key: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, StorageError> {
    let secret = format!("AWS4{secret_key}");
    let date_key = hmac_sha256(secret.as_bytes(), date.as_bytes())?;
    let region_key = hmac_sha256(&date_key, region.as_bytes())?;
    let service_key = hmac_sha256(&region_key, service.as_bytes())?;
    hmac_sha256(&service_key, b"aws4_request")
}

fn signature(
    ctx: &SigningContext<'_>,
    region: &str,
    secret_key: &str,
) -> Result<String, StorageError> {
    let scope = credential_scope(ctx.date, region);
    let string_to_sign = format!(
        "{SIGNING_ALGORITHM}\n{amz_date}\n{scope}\n{request_hash}",
        amz_date = ctx.amz_date,
        request_hash = sha256_hex(canonical_request(ctx).as_bytes()),
    );
    let key = signing_key(secret_key, ctx.date, region, SERVICE)?;
    Ok(hex::encode(hmac_sha256(&key, string_to_sign.as_bytes())?))
}

/// Storage provider performing signed PUTs against an S3-compatible
/// endpoint.
#[derive(Clone, Debug)]
pub struct S3Storage {
    http: reqwest::Client,
    base_url: String,
    host: String,
    bucket: String,
    region: String,
    access_key: String,
    secret_key: String,
}

impl S3Storage {
    /// Constructs a provider from the file storage configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Config`] when a required field is absent or
    /// the endpoint cannot be parsed.
    pub fn new(config: &FileStorageConfig) -> Result<Self, StorageError> {
        let endpoint = required(config.endpoint.as_deref(), "endpoint")?;
        let bucket = required(config.bucket.as_deref(), "bucket")?;
        let access_key = required(config.access_key.as_deref(), "access key")?;
        let secret_key = required(config.secret_key.as_deref(), "secret key")?;

        let scheme = if config.secure { "https" } else { "http" };
        let base_url = format!("{scheme}://{}", endpoint.trim_end_matches('/'));
        let parsed = url::Url::parse(&base_url).map_err(|err| StorageError::Config {
            message: format!("invalid endpoint '{endpoint}': {err}"),
        })?;
        let host_name = parsed.host_str().ok_or_else(|| StorageError::Config {
            message: format!("endpoint '{endpoint}' has no host"),
        })?;
        let host = parsed.port().map_or_else(
            || host_name.to_owned(),
            |port| format!("{host_name}:{port}"),
        );

        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| StorageError::Config {
                message: err.to_string(),
            })?;

        Ok(Self {
            http,
            base_url,
            host,
            bucket: bucket.to_owned(),
            region: config.region.clone(),
            access_key: access_key.to_owned(),
            secret_key: secret_key.to_owned(),
        })
    }

    async fn put_object(&self, input: &UploadInput) -> Result<String, StorageError> {
        let now = Utc::now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        let key = input.name.trim_start_matches('/');
        let canonical_uri = format!("/{}/{key}", self.bucket);
        let payload_hash = sha256_hex(&input.bytes);

        let ctx = SigningContext {
            canonical_uri: &canonical_uri,
            host: &self.host,
            content_type: &input.content_type,
            payload_hash: &payload_hash,
            amz_date: &amz_date,
            date: &date,
        };
        let request_signature = signature(&ctx, &self.region, &self.secret_key)?;
        let authorization = format!(
            "{SIGNING_ALGORITHM} Credential={}/{}, SignedHeaders={SIGNED_HEADERS}, Signature={request_signature}",
            self.access_key,
            credential_scope(&date, &self.region),
        );

        let response = self
            .http
            .put(format!("{}{canonical_uri}", self.base_url))
            .header("content-type", &input.content_type)
            .header("x-amz-date", &amz_date)
            .header("x-amz-content-sha256", &payload_hash)
            .header("authorization", authorization)
            .body(input.bytes.clone())
            .send()
            .await
            .map_err(|err| StorageError::Transport {
                message: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(format!("{}://{}", self.bucket, input.name))
    }
}

impl ObjectStorage for S3Storage {
    fn upload<'a>(&'a self, input: &'a UploadInput) -> UploadFuture<'a> {
        Box::pin(self.put_object(input))
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, StorageError> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .ok_or_else(|| StorageError::Config {
            message: format!("{field} is not configured"),
        })
}
