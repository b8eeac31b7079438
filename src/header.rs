use std::fmt;
use std::str::FromStr;

use http::header::HeaderName;
use thiserror::Error;

const AUTHORIZATION_PREFIX: &str = "X-Ops-Authorization-";

/// The fixed vocabulary of headers written by the signing process.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpsHeader {
    /// `X-Ops-Sign`, naming the protocol version.
    Sign,
    /// `X-Ops-UserId`
    UserId,
    /// `X-Ops-Timestamp`
    Timestamp,
    /// `X-Ops-Content-Hash`
    ContentHash,
    /// `X-Ops-Authorization-<n>`, 1-indexed.
    Authorization(usize),
}

impl OpsHeader {
    /// The header name with its conventional capitalization. `HeaderName`s are
    /// always lower case, and HTTP header names are case insensitive.
    pub fn name(&self) -> String {
        match self {
            OpsHeader::Sign => "X-Ops-Sign".into(),
            OpsHeader::UserId => "X-Ops-UserId".into(),
            OpsHeader::Timestamp => "X-Ops-Timestamp".into(),
            OpsHeader::ContentHash => "X-Ops-Content-Hash".into(),
            OpsHeader::Authorization(n) => format!("{}{}", AUTHORIZATION_PREFIX, n),
        }
    }

    /// The header name for use with the `http` crate.
    pub fn header_name(&self) -> HeaderName {
        match self {
            OpsHeader::Sign => HeaderName::from_static("x-ops-sign"),
            OpsHeader::UserId => HeaderName::from_static("x-ops-userid"),
            OpsHeader::Timestamp => HeaderName::from_static("x-ops-timestamp"),
            OpsHeader::ContentHash => HeaderName::from_static("x-ops-content-hash"),
            OpsHeader::Authorization(_) => HeaderName::from_bytes(self.name().as_bytes())
                .expect("Authorization header names should always be valid"),
        }
    }
}

impl fmt::Display for OpsHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// The name is not one of the headers in [`OpsHeader`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not an X-Ops signing header: {0:?}")]
pub struct UnknownHeader(pub String);

impl FromStr for OpsHeader {
    type Err = UnknownHeader;
    fn from_str(s: &str) -> Result<OpsHeader, Self::Err> {
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "x-ops-sign" => Ok(OpsHeader::Sign),
            "x-ops-userid" => Ok(OpsHeader::UserId),
            "x-ops-timestamp" => Ok(OpsHeader::Timestamp),
            "x-ops-content-hash" => Ok(OpsHeader::ContentHash),
            _ => lower
                .strip_prefix("x-ops-authorization-")
                .filter(|n| !n.starts_with('0') && n.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|n| n.parse().ok())
                .map(OpsHeader::Authorization)
                .ok_or_else(|| UnknownHeader(s.into())),
        }
    }
}

impl From<OpsHeader> for HeaderName {
    fn from(other: OpsHeader) -> Self {
        other.header_name()
    }
}
