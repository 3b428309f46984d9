//! Response status handling, error translation and CRC checks.

use crc::{CRC_64_XZ, Crc};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;

use crate::error::{MAX_ERROR_BODY_CHARS, Result, TosError, truncate_str};
use crate::response::ErrorEnvelope;
use crate::transport::HttpResponse;

pub(crate) const HEADER_REQUEST_ID: &str = "x-tos-request-id";
pub(crate) const HEADER_CRC64: &str = "x-tos-hash-crc64ecma";

/// CRC-64/ECMA-182 as the service computes it (reflected, inverted).
const CRC64_ECMA: Crc<u64> = Crc::<u64>::new(&CRC_64_XZ);

pub(crate) fn crc64_ecma(data: &[u8]) -> u64 {
    CRC64_ECMA.checksum(data)
}

/// Compares a `x-tos-hash-crc64ecma` header against a locally computed value.
///
/// A missing header is not an error; the service omits it for some
/// responses.
pub(crate) fn verify_crc(headers: &HeaderMap, local: u64, operation: &str) -> Result<()> {
    let Some(value) = headers.get(HEADER_CRC64).and_then(|v| v.to_str().ok()) else {
        return Ok(());
    };
    let remote: u64 = value.trim().parse().map_err(|_| {
        TosError::Serialization(format!("{}: unparseable CRC64 header '{}'", operation, value))
    })?;
    if remote != local {
        return Err(TosError::Serialization(format!(
            "{}: CRC64 mismatch (client: {}, server: {})",
            operation, local, remote
        )));
    }
    Ok(())
}

pub(crate) fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(HEADER_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Parses an error response body and returns the matching TosError.
///
/// JSON envelopes are tried first, then XML `<Error>` documents. Anything
/// else becomes [`TosError::ServiceUnparseable`] with a truncated body.
pub(crate) fn parse_error_response(status: StatusCode, headers: &HeaderMap, text: &str) -> TosError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(text)
        .ok()
        .or_else(|| quick_xml::de::from_str::<ErrorEnvelope>(text).ok())
        .filter(|envelope| !envelope.code.is_empty());

    match envelope {
        Some(envelope) => TosError::Service {
            status: status.as_u16(),
            code: envelope.code,
            message: envelope.message,
            request_id: if envelope.request_id.is_empty() {
                request_id(headers).unwrap_or_default()
            } else {
                envelope.request_id
            },
            host_id: envelope.host_id,
        },
        None => TosError::ServiceUnparseable {
            status: status.as_u16(),
            body: truncate_str(text, MAX_ERROR_BODY_CHARS).to_string(),
            request_id: request_id(headers),
        },
    }
}

/// Passes responses below 400 through; drains and translates the rest.
pub(crate) async fn check_response(response: HttpResponse) -> Result<HttpResponse> {
    if response.status.as_u16() < 400 {
        return Ok(response);
    }

    let status = response.status;
    let headers = response.headers.clone();
    let text = match response.bytes().await {
        Ok(body) => String::from_utf8_lossy(&body).into_owned(),
        Err(e) => {
            tracing::debug!(error = %e, "failed to read error response body");
            String::new()
        }
    };
    Err(parse_error_response(status, &headers, &text))
}
