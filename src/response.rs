use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, ETAG, HeaderMap};
use serde::Deserialize;

use crate::exec::{HEADER_CRC64, request_id};
use crate::policy::Rules;

pub(crate) const HEADER_BUCKET_REGION: &str = "x-tos-bucket-region";
pub(crate) const HEADER_STORAGE_CLASS: &str = "x-tos-storage-class";
pub(crate) const HEADER_VERSION_ID: &str = "x-tos-version-id";

/// Service error envelope, sent as JSON or as an XML `<Error>` document.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub request_id: String,
    pub host_id: String,
}

fn header(headers: &HeaderMap, name: impl reqwest::header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn crc_header(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(HEADER_CRC64)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[derive(Debug, Clone, Default)]
pub struct HeadBucketOutput {
    pub request_id: String,
    pub region: Option<String>,
    pub storage_class: Option<String>,
}

impl HeadBucketOutput {
    pub(crate) fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            request_id: request_id(headers).unwrap_or_default(),
            region: header(headers, HEADER_BUCKET_REGION),
            storage_class: header(headers, HEADER_STORAGE_CLASS),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PutBucketPolicyOutput {
    pub request_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct DeleteBucketPolicyOutput {
    pub request_id: String,
}

#[derive(Debug, Clone)]
pub struct GetBucketPolicyOutput {
    pub request_id: String,
    pub rules: Rules,
}

#[derive(Debug, Clone, Default)]
pub struct PutObjectOutput {
    pub request_id: String,
    pub etag: Option<String>,
    pub version_id: Option<String>,
    /// CRC-64/ECMA of the stored object as reported by the service.
    pub hash_crc64ecma: Option<u64>,
}

impl PutObjectOutput {
    pub(crate) fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            request_id: request_id(headers).unwrap_or_default(),
            etag: header(headers, ETAG),
            version_id: header(headers, HEADER_VERSION_ID),
            hash_crc64ecma: crc_header(headers),
        }
    }
}

/// A downloaded object, fully buffered.
#[derive(Debug, Clone, Default)]
pub struct GetObjectOutput {
    pub request_id: String,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub version_id: Option<String>,
    pub hash_crc64ecma: Option<u64>,
    pub content: Bytes,
}

impl GetObjectOutput {
    pub(crate) fn from_parts(headers: &HeaderMap, content: Bytes) -> Self {
        Self {
            request_id: request_id(headers).unwrap_or_default(),
            content_type: header(headers, CONTENT_TYPE),
            etag: header(headers, ETAG),
            version_id: header(headers, HEADER_VERSION_ID),
            hash_crc64ecma: crc_header(headers),
            content,
        }
    }
}
