//! Bearer token subject extraction.
//!
//! The token has already been validated by the platform's authorizer, so the
//! signature is not checked here; only the payload segment is read.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde_json::Value;
use thiserror::Error;

const TOLERANT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);

const URL_SAFE_TOLERANT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, TOLERANT);
const STANDARD_TOLERANT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, TOLERANT);

/// Why a token yielded no subject.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("expected 3 token segments, found {0}")]
    SegmentCount(usize),

    #[error("payload segment is not valid base64")]
    Encoding,

    #[error("payload segment is not a JSON object")]
    Payload,

    #[error("payload has no \"sub\" claim")]
    MissingSubject,
}

/// Extract the `sub` claim of a three-segment token.
///
/// A leading `Bearer ` is ignored. String and numeric subjects are accepted.
pub fn decode_subject(token: &str) -> Result<String, TokenError> {
    let token = token.trim();
    let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();

    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::SegmentCount(segments.len()));
    }

    let payload = decode_segment(segments[1])?;
    let claims: Value = serde_json::from_slice(&payload).map_err(|_| TokenError::Payload)?;
    let claims = claims.as_object().ok_or(TokenError::Payload)?;

    match claims.get("sub") {
        Some(Value::String(sub)) => Ok(sub.clone()),
        Some(Value::Number(sub)) => Ok(sub.to_string()),
        _ => Err(TokenError::MissingSubject),
    }
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, TokenError> {
    URL_SAFE_TOLERANT
        .decode(segment)
        .or_else(|_| STANDARD_TOLERANT.decode(segment))
        .map_err(|_| TokenError::Encoding)
}
