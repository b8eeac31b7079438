use std::convert::TryFrom;
use std::fmt;
use std::str::Utf8Error;
use std::sync::Arc;

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::der::SecretDocument;
use rsa::pkcs8::{DecodePrivateKey, PrivateKeyInfo};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use thiserror::Error;

#[cfg(feature = "openssl")]
mod openssl;

/// Size of the PKCS#1 v1.5 padding overhead: `0x00 0x01`, at least eight `0xFF`
/// bytes, then `0x00`.
const PKCS1_OVERHEAD: usize = 11;

/// The types of error which may occur whilst loading a private key.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KeyFormatError {
    /// PEM input was supplied as bytes which are not valid UTF-8.
    #[error("PEM key is not valid UTF-8")]
    NotUtf8(#[from] Utf8Error),
    /// The input is neither a PKCS#8 nor a PKCS#1 PEM-encoded RSA private key.
    #[error("not a PEM-encoded RSA private key (as PKCS#8: {pkcs8}; as PKCS#1: {pkcs1})")]
    Unparseable {
        /// Error reported when parsing as PKCS#8.
        pkcs8: rsa::pkcs8::Error,
        /// Error reported when parsing as PKCS#1.
        pkcs1: rsa::pkcs1::Error,
    },
    /// An RSA private key in DER form could not be decoded.
    #[cfg(feature = "openssl")]
    #[error("malformed RSA private key DER: {0}")]
    Der(#[source] rsa::pkcs1::Error),
    /// The input is a well-formed private key for an algorithm other than RSA.
    #[error("private key is not an RSA key")]
    NotRsa,
    /// OpenSSL failed to export the key.
    #[cfg(feature = "openssl")]
    #[error("OpenSSL could not export the private key: {0}")]
    OpenSsl(#[source] ::openssl::error::ErrorStack),
    /// The key parsed, but its components are inconsistent.
    #[error("RSA private key is invalid: {0}")]
    Invalid(#[source] rsa::Error),
}

/// The message passed to [`KeyMaterial::raw_transform`] does not fit in a single
/// PKCS#1 v1.5 block for this key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("message of {len} bytes exceeds the {max} byte maximum for this key")]
pub struct MessageTooLongError {
    /// Length of the rejected message.
    pub len: usize,
    /// Largest message the key can transform.
    pub max: usize,
}

/// Failure of the raw RSA private-key transform.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransformError {
    /// The message is longer than the key size minus the padding overhead.
    #[error(transparent)]
    MessageTooLong(#[from] MessageTooLongError),
    /// The underlying RSA operation failed.
    #[error("RSA private-key operation failed: {0}")]
    Rsa(#[from] rsa::Error),
}

/// An RSA private key, reduced to the one operation the signing protocol needs.
///
/// Cloning is cheap: clones share the same immutable key, so one loaded key can
/// back any number of [`AuthHandler`](crate::AuthHandler)s across threads.
#[derive(Clone)]
pub struct KeyMaterial(Arc<RsaPrivateKey>);

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("bits", &(self.size() * 8))
            .finish_non_exhaustive()
    }
}

impl KeyMaterial {
    /// Wrap an already-parsed RSA private key.
    pub fn new(key: RsaPrivateKey) -> Self {
        Self(Arc::new(key))
    }

    /// Parse a PEM-encoded RSA private key, in either PKCS#8
    /// (`BEGIN PRIVATE KEY`) or PKCS#1 (`BEGIN RSA PRIVATE KEY`) form.
    pub fn from_pem(pem: impl AsRef<[u8]>) -> Result<Self, KeyFormatError> {
        let pem = std::str::from_utf8(pem.as_ref())?;
        let key = match RsaPrivateKey::from_pkcs8_pem(pem) {
            Ok(key) => key,
            Err(pkcs8) => match RsaPrivateKey::from_pkcs1_pem(pem) {
                Ok(key) => key,
                Err(pkcs1) => {
                    return Err(if pkcs8_holds_foreign_key(pem) {
                        KeyFormatError::NotRsa
                    } else {
                        KeyFormatError::Unparseable { pkcs8, pkcs1 }
                    })
                }
            },
        };
        Self::checked(key)
    }

    /// Load a key from any supported source.
    pub fn load(source: impl Into<KeySource>) -> Result<Self, KeyFormatError> {
        match source.into() {
            KeySource::Pem(pem) => Self::from_pem(pem),
            KeySource::Rsa(key) => Self::checked(key),
            KeySource::Material(material) => Ok(material),
            #[cfg(feature = "openssl")]
            KeySource::OpenSsl(pkey) => openssl::from_pkey(&pkey),
            #[cfg(feature = "openssl")]
            KeySource::OpenSslRsa(rsa) => openssl::from_rsa(&rsa),
        }
    }

    fn checked(key: RsaPrivateKey) -> Result<Self, KeyFormatError> {
        key.validate().map_err(KeyFormatError::Invalid)?;
        Ok(Self::new(key))
    }

    /// Size of the modulus in bytes. Every transform output has exactly this length.
    pub fn size(&self) -> usize {
        self.0.size()
    }

    /// Longest message accepted by [`raw_transform`](Self::raw_transform).
    pub fn max_message_len(&self) -> usize {
        self.size().saturating_sub(PKCS1_OVERHEAD)
    }

    /// The raw RSA private-key transform (historically `RSA_private_encrypt`):
    /// `message` is padded to `0x00 0x01 0xFF.. 0x00 <message>` and raised to the
    /// private exponent. No digest is taken and no DigestInfo is embedded.
    pub fn raw_transform(&self, message: &[u8]) -> Result<Vec<u8>, TransformError> {
        let max = self.max_message_len();
        if message.len() > max {
            return Err(MessageTooLongError {
                len: message.len(),
                max,
            }
            .into());
        }
        Ok(self.0.sign(Pkcs1v15Sign::new_unprefixed(), message)?)
    }

    /// Borrow the underlying key.
    pub fn as_rsa(&self) -> &RsaPrivateKey {
        &self.0
    }
}

/// True if `pem` is a well-formed PKCS#8 document whose algorithm is not RSA.
fn pkcs8_holds_foreign_key(pem: &str) -> bool {
    let (label, document) = match SecretDocument::from_pem(pem) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };
    if label != "PRIVATE KEY" {
        return false;
    }
    match PrivateKeyInfo::try_from(document.as_bytes()) {
        Ok(info) => info.algorithm.oid != rsa::pkcs1::ALGORITHM_OID,
        Err(_) => false,
    }
}

/// Every representation a private key may be supplied in. All of them converge
/// on [`KeyMaterial`] through [`KeyMaterial::load`].
#[derive(Debug)]
#[non_exhaustive]
pub enum KeySource {
    /// PEM text, PKCS#8 or PKCS#1.
    Pem(Vec<u8>),
    /// An already-parsed RSA key.
    Rsa(RsaPrivateKey),
    /// An already-loaded key.
    Material(KeyMaterial),
    /// An OpenSSL private key, which must be an RSA key.
    #[cfg(feature = "openssl")]
    OpenSsl(::openssl::pkey::PKey<::openssl::pkey::Private>),
    /// An OpenSSL RSA private key.
    #[cfg(feature = "openssl")]
    OpenSslRsa(::openssl::rsa::Rsa<::openssl::pkey::Private>),
}

impl From<&str> for KeySource {
    fn from(other: &str) -> Self {
        KeySource::Pem(other.as_bytes().to_vec())
    }
}

impl From<String> for KeySource {
    fn from(other: String) -> Self {
        KeySource::Pem(other.into_bytes())
    }
}

impl From<&[u8]> for KeySource {
    fn from(other: &[u8]) -> Self {
        KeySource::Pem(other.to_vec())
    }
}

impl From<Vec<u8>> for KeySource {
    fn from(other: Vec<u8>) -> Self {
        KeySource::Pem(other)
    }
}

impl From<RsaPrivateKey> for KeySource {
    fn from(other: RsaPrivateKey) -> Self {
        KeySource::Rsa(other)
    }
}

impl From<KeyMaterial> for KeySource {
    fn from(other: KeyMaterial) -> Self {
        KeySource::Material(other)
    }
}
