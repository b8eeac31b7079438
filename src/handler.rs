use std::borrow::Cow;
use std::convert::TryFrom;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use http::header::{HeaderName, HeaderValue};
use http::Method;
use thiserror::Error;

use crate::canonicalize::{content_hash, CanonicalRequest, CanonicalizeConfig};
use crate::header::OpsHeader;
use crate::key::{KeyFormatError, KeyMaterial, KeySource};
use crate::signing::{sign, SignatureChunks, SigningError};
use crate::SIGN_VERSION;

/// Implemented for the outbound request types of HTTP clients. The signing
/// extension methods are available on any type implementing this trait.
pub trait ClientRequestLike {
    /// The request method.
    fn method(&self) -> &Method;
    /// The request path, including the query string if there is one.
    fn path(&self) -> Cow<'_, str>;
    /// The bytes that will be sent as the body, or `None` if there is no body.
    /// Implementations may need to buffer a streaming body to return it.
    fn body_bytes(&mut self) -> Result<Option<&[u8]>, BodyReadError>;
    /// Returns an existing header on the request.
    fn header(&self, name: &HeaderName) -> Option<HeaderValue>;
    /// Sets a header, replacing any existing value with the same name.
    fn set_header(&mut self, name: HeaderName, value: HeaderValue);
}

impl<T: ClientRequestLike + ?Sized> ClientRequestLike for &mut T {
    fn method(&self) -> &Method {
        (**self).method()
    }
    fn path(&self) -> Cow<'_, str> {
        (**self).path()
    }
    fn body_bytes(&mut self) -> Result<Option<&[u8]>, BodyReadError> {
        (**self).body_bytes()
    }
    fn header(&self, name: &HeaderName) -> Option<HeaderValue> {
        (**self).header(name)
    }
    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        (**self).set_header(name, value)
    }
}

/// The request body could not be read in order to hash it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BodyReadError {
    /// The body is a stream which cannot be read ahead of sending.
    #[error("request body is a stream and cannot be hashed before it is sent")]
    Streaming,
    /// Buffering the body failed.
    #[error("failed to buffer the request body: {0}")]
    Buffer(#[source] Box<dyn StdError + Send + Sync>),
}

/// The types of error which may occur whilst creating an [`AuthHandler`] or
/// signing a request. When signing fails no header has been written.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The private key could not be loaded.
    #[error("invalid signing key: {0}")]
    KeyFormat(#[from] KeyFormatError),
    /// The user id cannot be sent as an HTTP header value.
    #[error("user id {0:?} is not a valid header value")]
    InvalidUserId(String),
    /// The request body could not be read.
    #[error(transparent)]
    BodyRead(#[from] BodyReadError),
    /// The canonical request could not be signed.
    #[error(transparent)]
    Signing(#[from] SigningError),
}

type Clock = dyn Fn() -> DateTime<Utc> + Send + Sync;

/// Holds a user id and private key, and adds the `X-Ops-*` authentication
/// headers to requests.
///
/// The handler is immutable once built and may be shared between threads.
#[derive(Clone)]
pub struct AuthHandler {
    user_id: String,
    user_id_value: HeaderValue,
    key: KeyMaterial,
    clock: Arc<Clock>,
    canonicalize_config: CanonicalizeConfig,
}

impl fmt::Debug for AuthHandler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AuthHandler")
            .field("user_id", &self.user_id)
            .field("key", &self.key)
            .field("canonicalize_config", &self.canonicalize_config)
            .finish_non_exhaustive()
    }
}

impl AuthHandler {
    /// Creates a handler signing as `user_id` with a key from any supported source.
    pub fn new(user_id: &str, key: impl Into<KeySource>) -> Result<Self, AuthError> {
        let user_id_value = HeaderValue::from_str(user_id)
            .map_err(|_| AuthError::InvalidUserId(user_id.into()))?;
        Ok(AuthHandler {
            user_id: user_id.into(),
            user_id_value,
            key: KeyMaterial::load(key)?,
            clock: Arc::new(Utc::now),
            canonicalize_config: CanonicalizeConfig::default(),
        })
    }

    /// The user id requests are signed as.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
    /// The signing key.
    pub fn key(&self) -> &KeyMaterial {
        &self.key
    }
    /// Replaces the time source (in-place). It is called exactly once per signed
    /// request.
    pub fn set_clock<F>(&mut self, clock: F) -> &mut Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }
    /// Replaces the time source. It is called exactly once per signed request.
    ///
    /// This is `Utc::now` by default.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.set_clock(clock);
        self
    }
    /// Returns the configuration used to canonicalize requests.
    pub fn canonicalize_config(&self) -> &CanonicalizeConfig {
        &self.canonicalize_config
    }
    /// Sets the configuration used to canonicalize requests (in-place).
    pub fn set_canonicalize_config(&mut self, config: CanonicalizeConfig) -> &mut Self {
        self.canonicalize_config = config;
        self
    }
    /// Sets the configuration used to canonicalize requests.
    pub fn with_canonicalize_config(mut self, config: CanonicalizeConfig) -> Self {
        self.set_canonicalize_config(config);
        self
    }

    /// Builds the canonical request for the current time.
    pub fn canonical_request(&self, method: &str, path: &str, body: &[u8]) -> CanonicalRequest {
        self.canonical_request_for_hash(method, path, &content_hash(body))
    }

    fn canonical_request_for_hash(
        &self,
        method: &str,
        path: &str,
        content_hash: &str,
    ) -> CanonicalRequest {
        CanonicalRequest::new(
            &self.canonicalize_config,
            method,
            path,
            content_hash,
            (self.clock)().into(),
            &self.user_id,
        )
    }

    /// Computes every authentication header for a request without touching it.
    pub fn signed_headers(
        &self,
        method: &str,
        path: &str,
        body: &[u8],
    ) -> Result<SignedHeaders, AuthError> {
        self.sign_canonical(self.canonical_request(method, path, body))
    }

    fn sign_canonical(&self, canonical: CanonicalRequest) -> Result<SignedHeaders, AuthError> {
        trace!("Canonical request:\n{}", canonical);

        let signature = sign(&canonical.to_string(), &self.key)?;

        let mut headers = vec![
            (OpsHeader::Sign, HeaderValue::from_static(SIGN_VERSION)),
            (OpsHeader::UserId, self.user_id_value.clone()),
            (
                OpsHeader::Timestamp,
                HeaderValue::try_from(canonical.timestamp().to_string())
                    .expect("Timestamps should always be valid header values"),
            ),
            (
                OpsHeader::ContentHash,
                HeaderValue::from_str(canonical.content_hash())
                    .expect("Base64 should always be a valid header value"),
            ),
        ];
        headers.extend(signature.headers().map(|(header, chunk)| {
            (
                header,
                HeaderValue::from_str(chunk).expect("Base64 should always be a valid header value"),
            )
        }));

        Ok(SignedHeaders {
            canonical,
            signature,
            headers,
        })
    }

    /// Signs `request` in place. Nothing is written unless signing succeeds.
    pub fn apply_in_place<R>(&self, request: &mut R) -> Result<(), AuthError>
    where
        R: ClientRequestLike + ?Sized,
    {
        let body_hash = content_hash(request.body_bytes()?.unwrap_or_default());
        let method = request.method().as_str().to_owned();
        let path = request.path().into_owned();

        debug!("Signing {} {} as {}", method, path, self.user_id);
        let canonical = self.canonical_request_for_hash(&method, &path, &body_hash);
        let signed = self.sign_canonical(canonical)?;

        for (header, value) in signed.headers {
            request.set_header(header.header_name(), value);
        }
        Ok(())
    }

    /// Signs `request` and hands it back.
    pub fn apply<R: ClientRequestLike>(&self, mut request: R) -> Result<R, AuthError> {
        self.apply_in_place(&mut request)?;
        Ok(request)
    }
}

/// The complete set of authentication headers for one request, in the order
/// they are written.
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    canonical: CanonicalRequest,
    signature: SignatureChunks,
    headers: Vec<(OpsHeader, HeaderValue)>,
}

impl SignedHeaders {
    /// The canonical request that was signed.
    pub fn canonical_request(&self) -> &CanonicalRequest {
        &self.canonical
    }
    /// The signature, before it was split across headers.
    pub fn signature(&self) -> &SignatureChunks {
        &self.signature
    }
    /// Looks up the value of one header.
    pub fn get(&self, header: OpsHeader) -> Option<&HeaderValue> {
        self.headers
            .iter()
            .find(|(name, _)| *name == header)
            .map(|(_, value)| value)
    }
    /// All headers, in order.
    pub fn iter(&self) -> impl Iterator<Item = (OpsHeader, &HeaderValue)> + '_ {
        self.headers.iter().map(|(name, value)| (*name, value))
    }
}

/// Import this trait to get access to the `sign` and `signed` methods on all
/// types implementing `ClientRequestLike`.
pub trait SigningExt: Sized {
    /// Signs the request and returns it.
    fn signed(mut self, handler: &AuthHandler) -> Result<Self, AuthError> {
        self.sign(handler)?;
        Ok(self)
    }

    /// Signs the request in place.
    fn sign(&mut self, handler: &AuthHandler) -> Result<(), AuthError>;
}

impl<R: ClientRequestLike> SigningExt for R {
    fn sign(&mut self, handler: &AuthHandler) -> Result<(), AuthError> {
        handler.apply_in_place(self)
    }
}
