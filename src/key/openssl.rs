use ::openssl::pkey::{Id, PKey, Private};
use ::openssl::rsa::Rsa;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::RsaPrivateKey;

use super::{KeyFormatError, KeyMaterial, KeySource};

pub(super) fn from_pkey(pkey: &PKey<Private>) -> Result<KeyMaterial, KeyFormatError> {
    if pkey.id() != Id::RSA {
        return Err(KeyFormatError::NotRsa);
    }
    let rsa = pkey.rsa().map_err(KeyFormatError::OpenSsl)?;
    from_rsa(&rsa)
}

/// Converts an OpenSSL key through its PKCS#1 DER encoding.
pub(super) fn from_rsa(rsa: &Rsa<Private>) -> Result<KeyMaterial, KeyFormatError> {
    let der = rsa.private_key_to_der().map_err(KeyFormatError::OpenSsl)?;
    let key = RsaPrivateKey::from_pkcs1_der(&der).map_err(KeyFormatError::Der)?;
    KeyMaterial::checked(key)
}

impl From<PKey<Private>> for KeySource {
    fn from(other: PKey<Private>) -> Self {
        KeySource::OpenSsl(other)
    }
}

impl From<Rsa<Private>> for KeySource {
    fn from(other: Rsa<Private>) -> Self {
        KeySource::OpenSslRsa(other)
    }
}
