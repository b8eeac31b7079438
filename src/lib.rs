#![deny(missing_docs)]
//! Implementation of the `X-Ops` request signing protocol (version 1.0), which lets
//! a client prove its identity to a server holding its RSA public key.
//!
//! For every outbound request a canonical string is built from the method, the
//! hashed path, the hashed body, a timestamp and the user id. That string is
//! transformed with the client's RSA private key (PKCS#1 v1.5 type 1 padding,
//! *without* a DigestInfo prefix), base64 encoded and spread across a numbered
//! series of `X-Ops-Authorization-<n>` headers, 60 characters each.
//!
//! ## Features
//!
//! This crate is intended to be used with multiple different HTTP clients.
//! As such, client-specific implementations are gated by correspondingly named
//! features.
//!
//! | Crate / Feature name                              | Notes                                                         |
//! | ------------------------------------------------- | ------------------------------------------------------------- |
//! | [reqwest](https://crates.io/crates/reqwest)       | Supports blocking and non-blocking requests.<sup>1</sup>      |
//! | [openssl](https://crates.io/crates/openssl)       | Accepts `PKey<Private>` / `Rsa<Private>` as key sources.      |
//!
//! 1. Non-blocking requests with a streaming body cannot be signed, because the body
//!    must be hashed before the request is sent.
//!
//! ## Headers written
//!
//! - `X-Ops-Sign: version=1.0`
//! - `X-Ops-UserId`
//! - `X-Ops-Timestamp`
//! - `X-Ops-Content-Hash`
//! - `X-Ops-Authorization-1` ... `X-Ops-Authorization-N`
//!
//! ## Example usage (reqwest)
//!
//! ```rust,no_run
//! # #[cfg(feature = "reqwest")]
//! # {
//! use ops_sig::*;
//!
//! let pem = std::fs::read("client.pem").unwrap();
//! let handler = AuthHandler::new("patsy", pem).unwrap();
//!
//! let client = reqwest::blocking::Client::new();
//!
//! let req = client
//!     .get("https://chef.example.com/organizations/acme/nodes")
//!     .build()
//!     .unwrap()
//!     .signed(&handler)
//!     .unwrap();
//!
//! let result = client.execute(req).unwrap();
//! # }
//! ```

/// Value of the `X-Ops-Sign` header for the algorithm implemented here.
pub const SIGN_VERSION: &str = "version=1.0";
/// Width of each `X-Ops-Authorization-<n>` header value.
pub const CHUNK_WIDTH: usize = 60;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[macro_use]
mod macros;

mod key;
pub use key::*;

mod header;
pub use header::*;

mod canonicalize;
pub use canonicalize::*;

mod signing;
pub use signing::*;

mod handler;
pub use handler::*;

/// Module containing a mock request type which implements
/// `ClientRequestLike` for testing.
pub mod mock_request;

#[cfg(feature = "reqwest")]
mod reqwest_impls;
#[cfg(feature = "reqwest")]
pub use reqwest_impls::*;

#[cfg(test)]
pub(crate) mod test_keys {
    use std::sync::OnceLock;

    use rsa::RsaPrivateKey;

    pub const PKCS1_PEM: &str = include_str!("../test_data/private.pem");
    pub const PKCS8_PEM: &str = include_str!("../test_data/private_pkcs8.pem");
    pub const ED25519_PEM: &str = include_str!("../test_data/ed25519.pem");

    /// Signature chunks for `GET /` by `patsy` at 2015-06-29T15:30:22Z, with the
    /// body `07af154a81a86ccec33c213a0c71487a19cc3b76`, under `PKCS1_PEM`.
    pub const FIXTURE_CHUNKS: [&str; 6] = [
        "MaSsVyiVPNP3J5H7HkRQOJbzteu/NDNU6eLzmoOTcR0AbeIAL4JTyb7HMlNL",
        "ApOOKfQymMyrP6uA26rwwh62/VVWE7vVhT6FbRZ3E2Zja+HvkkILczZ35piE",
        "2zwEdBRqSQsxgF6Hog6NpEF0iNgaTbBOwqrr3PYJN+tSAFDPwXARlV5zVaCW",
        "lXHFbSlIVd8XjMdMUkpKmc5Q59H74G4qH1mtCmtjBYx5Ce14Gp2YWITy25LA",
        "DacNjwi5gO7DiQACwgHqO7RICJKxKpGXdFpDKafPRf3JKhajqYweJPuXjZS+",
        "/8Nw43VYcrUDs3NhnYoC4lNbrQkxBUm+BUl6F4Qsjg==",
    ];

    pub const FIXTURE_BODY: &[u8] = b"07af154a81a86ccec33c213a0c71487a19cc3b76";

    /// A freshly generated 2048 bit key, shared by every test in the run.
    pub fn generated() -> &'static RsaPrivateKey {
        static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
        KEY.get_or_init(|| {
            RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("key generation to succeed")
        })
    }
}
