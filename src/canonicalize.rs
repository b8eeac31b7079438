use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};

use crate::header::OpsHeader;
use crate::TIMESTAMP_FORMAT;

/// The moment a request is signed. Displays as ISO-8601 with a literal `Z`
/// suffix and whole seconds, e.g. `2015-06-29T15:30:22Z`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// The wrapped date and time.
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(other: DateTime<Utc>) -> Self {
        Timestamp(other)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

fn sha1_base64(bytes: &[u8]) -> String {
    STANDARD.encode(Sha1::digest(bytes))
}

/// Returns the value of the `X-Ops-Content-Hash` header for a body.
pub fn content_hash(body: &[u8]) -> String {
    sha1_base64(body)
}

/// Returns the `Hashed Path` line of the canonical request for a path.
pub fn hashed_path(path: &str, config: &CanonicalizeConfig) -> String {
    sha1_base64(canonical_path(path, config).as_bytes())
}

/// Normalizes a request path before it is hashed.
///
/// The fragment is always dropped and the query string is dropped unless
/// `include_query` is set. Runs of `/` are collapsed (unless disabled), a
/// leading `/` is guaranteed, and a trailing `/` is removed from anything but
/// the root path.
pub fn canonical_path(path: &str, config: &CanonicalizeConfig) -> String {
    let path = path.split('#').next().unwrap_or_default();
    let (path, query) = match path.find('?') {
        Some(idx) => (&path[..idx], Some(&path[idx + 1..])),
        None => (path, None),
    };

    let mut result = String::with_capacity(path.len() + 1);
    if !path.starts_with('/') {
        result.push('/');
    }
    for c in path.chars() {
        if c == '/' && config.collapse_slashes && result.ends_with('/') {
            continue;
        }
        result.push(c);
    }
    if result.len() > 1 && result.ends_with('/') {
        result.pop();
    }

    if config.include_query {
        if let Some(query) = query {
            result.push('?');
            result.push_str(query);
        }
    }
    result
}

/// Configuration for computing the canonical request string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalizeConfig {
    include_query: bool,
    collapse_slashes: bool,
}

impl Default for CanonicalizeConfig {
    fn default() -> Self {
        CanonicalizeConfig {
            include_query: false,
            collapse_slashes: true,
        }
    }
}

impl CanonicalizeConfig {
    /// Creates a new canonicalization configuration using the default values.
    pub fn new() -> Self {
        Self::default()
    }
    /// Returns whether the query string is part of the hashed path.
    ///
    /// This is set to `false` by default.
    pub fn include_query(&self) -> bool {
        self.include_query
    }
    /// Controls whether the query string is part of the hashed path (in-place).
    pub fn set_include_query(&mut self, include_query: bool) -> &mut Self {
        self.include_query = include_query;
        self
    }
    /// Controls whether the query string is part of the hashed path.
    pub fn with_include_query(mut self, include_query: bool) -> Self {
        self.set_include_query(include_query);
        self
    }
    /// Returns whether repeated slashes are collapsed before hashing the path.
    ///
    /// This is set to `true` by default.
    pub fn collapse_slashes(&self) -> bool {
        self.collapse_slashes
    }
    /// Controls whether repeated slashes are collapsed before hashing the path (in-place).
    pub fn set_collapse_slashes(&mut self, collapse_slashes: bool) -> &mut Self {
        self.collapse_slashes = collapse_slashes;
        self
    }
    /// Controls whether repeated slashes are collapsed before hashing the path.
    pub fn with_collapse_slashes(mut self, collapse_slashes: bool) -> Self {
        self.set_collapse_slashes(collapse_slashes);
        self
    }
}

/// The five fields of the string that gets signed. `Display` renders them in
/// their fixed order, joined by `\n` with no trailing newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    method: String,
    hashed_path: String,
    content_hash: String,
    timestamp: Timestamp,
    user_id: String,
}

impl CanonicalRequest {
    /// Builds the canonical request, upper-casing the method and hashing the path.
    pub fn new(
        config: &CanonicalizeConfig,
        method: &str,
        path: &str,
        content_hash: &str,
        timestamp: Timestamp,
        user_id: &str,
    ) -> Self {
        CanonicalRequest {
            method: method.to_ascii_uppercase(),
            hashed_path: hashed_path(path, config),
            content_hash: content_hash.into(),
            timestamp,
            user_id: user_id.into(),
        }
    }

    /// The upper-cased method.
    pub fn method(&self) -> &str {
        &self.method
    }
    /// base64(sha1(canonical path))
    pub fn hashed_path(&self) -> &str {
        &self.hashed_path
    }
    /// base64(sha1(body))
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }
    /// Time of signing.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
    /// The signing user.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl fmt::Display for CanonicalRequest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Method:{}\nHashed Path:{}\n{}:{}\n{}:{}\n{}:{}",
            self.method,
            self.hashed_path,
            OpsHeader::ContentHash,
            self.content_hash,
            OpsHeader::Timestamp,
            self.timestamp,
            OpsHeader::UserId,
            self.user_id
        )
    }
}

/// Computes the canonical request string with the default configuration.
pub fn canonicalize(
    method: &str,
    path: &str,
    content_hash: &str,
    timestamp: Timestamp,
    user_id: &str,
) -> String {
    CanonicalRequest::new(
        &CanonicalizeConfig::default(),
        method,
        path,
        content_hash,
        timestamp,
        user_id,
    )
    .to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn timestamp() -> Timestamp {
        Utc.with_ymd_and_hms(2015, 6, 29, 15, 30, 22)
            .single()
            .expect("valid date")
            .into()
    }

    #[test]
    fn formats_timestamp() {
        assert_eq!(timestamp().to_string(), "2015-06-29T15:30:22Z");

        let with_nanos: Timestamp = Utc
            .timestamp_opt(1_435_591_822, 999_999_999)
            .single()
            .expect("valid date")
            .into();
        assert_eq!(with_nanos.to_string(), "2015-06-29T15:30:22Z");
    }

    #[test]
    fn hashes_content() {
        assert_eq!(content_hash(b""), "2jmj7l5rSw0yVb/vlWAYkK/YBwk=");
        assert_eq!(
            content_hash(b"07af154a81a86ccec33c213a0c71487a19cc3b76"),
            "aHdx6owad8NyrGEyjOcr5dWC0Nw="
        );
    }

    #[test]
    fn canonical_paths() {
        let config = CanonicalizeConfig::default();
        for (input, expected) in &[
            ("/", "/"),
            ("", "/"),
            ("//", "/"),
            ("/organizations/test/nodes/", "/organizations/test/nodes"),
            ("//organizations//test///nodes", "/organizations/test/nodes"),
            ("organizations/test", "/organizations/test"),
            ("/nodes?q=name:foo", "/nodes"),
            ("/nodes/#frag", "/nodes"),
        ] {
            assert_eq!(canonical_path(input, &config), *expected, "{:?}", input);
        }
    }

    #[test]
    fn canonical_path_options() {
        let config = CanonicalizeConfig::new()
            .with_include_query(true)
            .with_collapse_slashes(false);
        assert!(config.include_query());
        assert!(!config.collapse_slashes());

        assert_eq!(canonical_path("/a//b/?x=1#y", &config), "/a//b?x=1");
        assert_eq!(canonical_path("/a", &config), "/a");
    }

    #[test]
    fn hashes_path() {
        let config = CanonicalizeConfig::default();
        assert_eq!(hashed_path("/", &config), "QgmbSvAh5T/Y/U4FbCVo18Lj/6g=");
        assert_eq!(
            hashed_path("/organizations/test/nodes/", &config),
            "R0QqIiRFLcCVnfHHCsVRnNpQSmc="
        );
    }

    #[test]
    fn builds_canonical_string() {
        let canonical = canonicalize(
            "get",
            "/",
            "aHdx6owad8NyrGEyjOcr5dWC0Nw=",
            timestamp(),
            "patsy",
        );
        assert_eq!(
            canonical,
            "Method:GET\n\
             Hashed Path:QgmbSvAh5T/Y/U4FbCVo18Lj/6g=\n\
             X-Ops-Content-Hash:aHdx6owad8NyrGEyjOcr5dWC0Nw=\n\
             X-Ops-Timestamp:2015-06-29T15:30:22Z\n\
             X-Ops-UserId:patsy"
        );
    }

    #[test]
    fn exposes_fields() {
        let request = CanonicalRequest::new(
            &CanonicalizeConfig::default(),
            "Post",
            "/nodes",
            "hash",
            timestamp(),
            "patsy",
        );
        assert_eq!(request.method(), "POST");
        assert_eq!(request.content_hash(), "hash");
        assert_eq!(request.timestamp(), timestamp());
        assert_eq!(request.user_id(), "patsy");
        assert_eq!(request.hashed_path(), hashed_path("/nodes", &CanonicalizeConfig::default()));
    }
}
