use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

use crate::header::OpsHeader;
use crate::key::{KeyMaterial, TransformError};
use crate::CHUNK_WIDTH;

/// Signing the canonical request failed. The cause is available through
/// [`std::error::Error::source`] or [`SigningError::transform_error`].
#[derive(Debug, Error)]
#[error("failed to sign the canonical request")]
pub struct SigningError(#[from] TransformError);

impl SigningError {
    /// The underlying transform failure.
    pub fn transform_error(&self) -> &TransformError {
        &self.0
    }
    /// True if the canonical request did not fit in the key.
    pub fn is_message_too_long(&self) -> bool {
        matches!(self.0, TransformError::MessageTooLong(_))
    }
}

/// A base64 signature split, left to right, into `CHUNK_WIDTH` character pieces.
/// Only the last piece may be shorter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureChunks {
    signature: String,
}

impl SignatureChunks {
    /// The complete base64 signature.
    pub fn as_str(&self) -> &str {
        &self.signature
    }
    /// Number of chunks.
    pub fn len(&self) -> usize {
        (self.signature.len() + CHUNK_WIDTH - 1) / CHUNK_WIDTH
    }
    /// True only for an empty signature, which [`sign`] never produces.
    pub fn is_empty(&self) -> bool {
        self.signature.is_empty()
    }
    /// The chunks, in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        // base64 output is ASCII, so every byte offset is a char boundary
        (0..self.signature.len())
            .step_by(CHUNK_WIDTH)
            .map(move |start| {
                let end = (start + CHUNK_WIDTH).min(self.signature.len());
                &self.signature[start..end]
            })
    }
    /// Each chunk paired with the `X-Ops-Authorization-<n>` header carrying it.
    pub fn headers(&self) -> impl Iterator<Item = (OpsHeader, &str)> + '_ {
        self.iter()
            .enumerate()
            .map(|(i, chunk)| (OpsHeader::Authorization(i + 1), chunk))
    }
}

impl From<SignatureChunks> for String {
    fn from(other: SignatureChunks) -> Self {
        other.signature
    }
}

/// Signs a canonical request string with the raw RSA transform and splits the
/// base64 result into header-sized chunks.
pub fn sign(canonical: &str, key: &KeyMaterial) -> Result<SignatureChunks, SigningError> {
    let raw = key.raw_transform(canonical.as_bytes())?;
    Ok(SignatureChunks {
        signature: STANDARD.encode(raw),
    })
}
