//! V4-style request signing.

use std::fmt::{self, Write};

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, HOST, HeaderMap, HeaderName, HeaderValue};
use sha2::{Digest, Sha256};

use crate::credential::Credentials;
use crate::error::{Result, TosError};
use crate::transport::HttpRequest;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "TOS4-HMAC-SHA256";
pub const SERVICE: &str = "tos";
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

pub const HEADER_DATE: &str = "x-tos-date";
pub const HEADER_CONTENT_SHA256: &str = "x-tos-content-sha256";
pub const HEADER_SECURITY_TOKEN: &str = "x-tos-security-token";

/// Signs prepared requests.
///
/// The client acquires credentials, then hands the request over with the
/// signing region and the timestamp to sign at; the signer attaches
/// whatever headers its scheme needs.
pub trait Signer: Send + Sync + fmt::Debug {
    /// Whether requests fail with `MissingRegion` when no region is known.
    fn requires_region(&self) -> bool {
        true
    }

    fn sign(
        &self,
        request: &mut HttpRequest,
        credentials: &Credentials,
        region: &str,
        now: DateTime<Utc>,
    ) -> Result<()>;
}

/// HMAC-SHA256 signer with a `date/region/tos/request` scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct V4Signer;

impl Signer for V4Signer {
    fn sign(
        &self,
        request: &mut HttpRequest,
        credentials: &Credentials,
        region: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let timestamp = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = &timestamp[..8];
        let scope = format!("{}/{}/{}/request", date, region, SERVICE);

        let payload_hash = match request.headers.get(HEADER_CONTENT_SHA256) {
            Some(value) => header_str(value)?.to_string(),
            None => {
                let body = request.body.as_deref().unwrap_or_default();
                hex_encode(&Sha256::digest(body))
            }
        };

        let host = host_header(&request.url)?;
        set_header(&mut request.headers, HOST.as_str(), &host)?;
        set_header(&mut request.headers, HEADER_DATE, &timestamp)?;
        set_header(&mut request.headers, HEADER_CONTENT_SHA256, &payload_hash)?;
        match &credentials.security_token {
            Some(token) => set_header(&mut request.headers, HEADER_SECURITY_TOKEN, token)?,
            None => {
                request.headers.remove(HEADER_SECURITY_TOKEN);
            }
        }

        let (canonical_headers, signed_headers) = canonical_headers(&request.headers)?;
        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n\n{}\n{}",
            request.method.as_str(),
            canonical_uri(&request.url),
            canonical_query(&request.url),
            canonical_headers,
            signed_headers,
            payload_hash
        );
        tracing::trace!(%canonical_request, "canonical request");

        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            timestamp,
            scope,
            hex_encode(&Sha256::digest(canonical_request.as_bytes()))
        );

        let key = signing_key(&credentials.secret_access_key, date, region, SERVICE)?;
        let signature = hex_encode(&hmac_sha256(&key, string_to_sign.as_bytes())?);

        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, credentials.access_key_id, scope, signed_headers, signature
        );
        set_header(&mut request.headers, AUTHORIZATION.as_str(), &authorization)?;
        Ok(())
    }
}

/// Derives the scoped signing key.
fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>> {
    let date_key = hmac_sha256(secret.as_bytes(), date.as_bytes())?;
    let region_key = hmac_sha256(&date_key, region.as_bytes())?;
    let service_key = hmac_sha256(&region_key, service.as_bytes())?;
    hmac_sha256(&service_key, b"request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| TosError::InvalidArgument(format!("HMAC key error: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut result = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(result, "{:02x}", byte);
    }
    result
}

/// Percent-encodes a string (RFC 3986 unreserved characters pass through).
///
/// Spaces become `%20` (NOT `+`).
pub(crate) fn percent_encode(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len() * 2);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                let _ = write!(encoded, "%{:02X}", byte);
            }
        }
    }
    encoded
}

/// Percent-encodes an object path, keeping `/` separators.
pub(crate) fn percent_encode_path(path: &str) -> String {
    path.split('/')
        .map(percent_encode)
        .collect::<Vec<_>>()
        .join("/")
}

/// The request path, which the client already writes percent-encoded.
fn canonical_uri(url: &url::Url) -> &str {
    match url.path() {
        "" => "/",
        path => path,
    }
}

fn canonical_query(url: &url::Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (percent_encode(&k), percent_encode(&v)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Headers covered by the signature: `host`, `content-type`,
/// `content-md5`, and every `x-tos-*` header.
fn is_signed_header(name: &str) -> bool {
    matches!(name, "host" | "content-type" | "content-md5") || name.starts_with("x-tos-")
}

/// Returns the canonical header block and the `;`-joined signed header names.
fn canonical_headers(headers: &HeaderMap) -> Result<(String, String)> {
    let mut names: Vec<&str> = headers
        .keys()
        .map(HeaderName::as_str)
        .filter(|name| is_signed_header(name))
        .collect();
    names.sort_unstable();

    let mut lines = Vec::with_capacity(names.len());
    for name in &names {
        let values = headers
            .get_all(*name)
            .iter()
            .map(|v| header_str(v).map(str::trim))
            .collect::<Result<Vec<_>>>()?;
        lines.push(format!("{}:{}", name, values.join(",")));
    }
    Ok((lines.join("\n"), names.join(";")))
}

fn host_header(url: &url::Url) -> Result<String> {
    let hostname = url
        .host_str()
        .ok_or_else(|| TosError::InvalidArgument("URL missing host".into()))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", hostname, port),
        None => hostname.to_string(),
    })
}

fn header_str(value: &HeaderValue) -> Result<&str> {
    value
        .to_str()
        .map_err(|e| TosError::InvalidArgument(format!("non-ASCII header value: {}", e)))
}

pub(crate) fn set_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<()> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| TosError::InvalidArgument(format!("invalid header name '{}': {}", name, e)))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| TosError::InvalidArgument(format!("invalid value for header '{}': {}", name, e)))?;
    headers.insert(name, value);
    Ok(())
}
