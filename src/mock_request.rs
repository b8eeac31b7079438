use std::borrow::Cow;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{self, Display};
use std::io::{BufRead, Write};

use anyhow::Context;
use http::{header::HeaderName, HeaderValue, Method};
use url::Url;

use crate::{BodyReadError, ClientRequestLike};

/// Generic error returned when the input to `from_reader` does not look like
/// a HTTP request.
#[derive(Debug)]
pub struct ParseError;

impl Error for ParseError {}
impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Malformed HTTP request")
    }
}

/// A mock request type
#[derive(Debug, Clone, PartialEq)]
pub struct MockRequest {
    method: Method,
    path: String,
    headers: HashMap<HeaderName, HeaderValue>,
    body: Option<Vec<u8>>,
}

impl MockRequest {
    /// Returns the path used by this mock request
    pub fn path(&self) -> &str {
        &self.path
    }
    /// Returns the headers used by this mock request
    pub fn headers(&self) -> impl IntoIterator<Item = (&HeaderName, &HeaderValue)> {
        &self.headers
    }
    /// Returns the body used by this mock request
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Constructs a new mock request from an absolute URL, which also sets the
    /// `Host` header, or from a bare path.
    pub fn new(method: Method, url: &str) -> Self {
        let (path, host) = match Url::parse(url) {
            Ok(url) => {
                let path = if let Some(query) = url.query() {
                    format!("{}?{}", url.path(), query)
                } else {
                    url.path().into()
                };
                (path, url.host_str().map(ToOwned::to_owned))
            }
            Err(_) => (url.into(), None),
        };
        let mut res = Self {
            method,
            path,
            headers: Default::default(),
            body: None,
        };
        if let Some(host) = host {
            res = res.with_header("Host", &host)
        }
        res
    }
    /// Convenience method for setting a header
    ///
    /// # Panics
    ///
    /// If `name` or `value` are not valid in a HTTP header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(
            HeaderName::from_bytes(name.as_bytes()).expect("a valid header name"),
            HeaderValue::from_bytes(value.as_bytes()).expect("a valid header value"),
        );
        self
    }
    /// Method for setting a request body
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        let l = body.len();
        self.body = Some(body);
        self.with_header("Content-Length", &l.to_string())
    }

    /// Parse a HTTP request into this mock request object
    pub fn from_reader<R: BufRead>(reader: &mut R) -> Result<Self, Box<dyn Error>> {
        let mut line = String::new();

        // Read request line
        reader.read_line(&mut line)?;
        let mut parts = line.split_ascii_whitespace();

        // Extract method
        let method: Method = parts.next().ok_or(ParseError)?.parse()?;

        // Extract path
        let path: String = parts.next().ok_or(ParseError)?.into();

        // Extract headers
        #[allow(clippy::mutable_key_type)]
        let mut headers = HashMap::new();
        let has_body = loop {
            line.truncate(0);
            if reader.read_line(&mut line)? == 0 {
                break false;
            }
            if line.trim().is_empty() {
                break true;
            }

            let mut parts = line.splitn(2, ':');

            let name_str = parts.next().ok_or(ParseError)?.trim();
            let header_name: HeaderName = name_str
                .parse()
                .with_context(|| format!("{:?}", name_str))?;
            let value_str = parts.next().ok_or(ParseError)?.trim();
            let header_value: HeaderValue = value_str
                .parse()
                .with_context(|| format!("{:?}", value_str))?;
            headers.insert(header_name, header_value);
        };

        let body = if has_body {
            let mut body = Vec::new();
            reader.read_to_end(&mut body)?;
            Some(body)
        } else {
            None
        };

        Ok(Self {
            method,
            path,
            headers,
            body,
        })
    }

    /// Write out this HTTP request in standard format, with headers sorted by name
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<(), Box<dyn Error>> {
        writeln!(writer, "{} {} HTTP/1.1", self.method.as_str(), self.path)?;

        let mut headers: Vec<_> = self.headers.iter().collect();
        headers.sort_by(|(a, _), (b, _)| a.as_str().cmp(b.as_str()));
        for (header_name, header_value) in headers {
            writeln!(
                writer,
                "{}: {}",
                header_name.as_str(),
                header_value.to_str()?
            )?;
        }

        if let Some(body) = &self.body {
            writeln!(writer)?;
            writer.write_all(body)?;
        }

        Ok(())
    }
}

impl ClientRequestLike for MockRequest {
    fn method(&self) -> &Method {
        &self.method
    }
    fn path(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.path)
    }
    fn body_bytes(&mut self) -> Result<Option<&[u8]>, BodyReadError> {
        Ok(self.body.as_deref())
    }
    fn header(&self, name: &HeaderName) -> Option<HeaderValue> {
        self.headers.get(name).cloned()
    }
    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};

    use crate::test_keys::{FIXTURE_CHUNKS, PKCS8_PEM};
    use crate::{AuthHandler, SigningExt};

    /// The fixture request, as it would arrive from a client
    ///
    /// ```text
    /// GET / HTTP/1.1
    /// host: chef-server.com
    /// content-length: 40
    ///
    /// 07af154a81a86ccec33c213a0c71487a19cc3b76
    /// ```
    const RAW_REQUEST: &str = "GET / HTTP/1.1\n\
        host: chef-server.com\n\
        content-length: 40\n\
        \n\
        07af154a81a86ccec33c213a0c71487a19cc3b76";

    fn test_handler() -> AuthHandler {
        AuthHandler::new("patsy", PKCS8_PEM).unwrap().with_clock(|| {
            Utc.with_ymd_and_hms(2015, 6, 29, 15, 30, 22)
                .single()
                .expect("valid date")
        })
    }

    #[test]
    fn builds_from_url() {
        let req = MockRequest::new(Method::GET, "http://chef-server.com/nodes?q=a");
        assert_eq!(req.path(), "/nodes?q=a");
        assert_eq!(
            req.header(&http::header::HOST).unwrap(),
            "chef-server.com"
        );

        let req = MockRequest::new(Method::GET, "/nodes");
        assert_eq!(req.path(), "/nodes");
        assert!(req.header(&http::header::HOST).is_none());
    }

    #[test]
    fn parses_and_writes() {
        let req = MockRequest::from_reader(&mut RAW_REQUEST.as_bytes()).unwrap();
        assert_eq!(*req.method(), Method::GET);
        assert_eq!(req.path(), "/");
        assert_eq!(req.body(), Some(&b"07af154a81a86ccec33c213a0c71487a19cc3b76"[..]));

        let mut out = Vec::new();
        req.write(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "GET / HTTP/1.1\n\
             content-length: 40\n\
             host: chef-server.com\n\
             \n\
             07af154a81a86ccec33c213a0c71487a19cc3b76"
        );
    }

    #[test]
    fn rejects_malformed_requests() {
        assert!(MockRequest::from_reader(&mut "".as_bytes()).is_err());
        assert!(MockRequest::from_reader(&mut "GET\n".as_bytes()).is_err());
        assert!(MockRequest::from_reader(&mut "GET / HTTP/1.1\nno-colon\n".as_bytes()).is_err());
    }

    #[test]
    fn signs_parsed_request() {
        let req = MockRequest::from_reader(&mut RAW_REQUEST.as_bytes())
            .unwrap()
            .signed(&test_handler())
            .unwrap();

        let mut out = Vec::new();
        req.write(&mut out).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.starts_with("GET / HTTP/1.1\ncontent-length: 40\nhost: chef-server.com\n"));
        for (i, chunk) in FIXTURE_CHUNKS.iter().enumerate() {
            assert!(
                out.contains(&format!("x-ops-authorization-{}: {}\n", i + 1, chunk)),
                "missing chunk {} in {}",
                i + 1,
                out
            );
        }
        assert!(out.contains("x-ops-content-hash: aHdx6owad8NyrGEyjOcr5dWC0Nw=\n"));
        assert!(out.contains("x-ops-sign: version=1.0\n"));
        assert!(out.contains("x-ops-timestamp: 2015-06-29T15:30:22Z\n"));
        assert!(out.contains("x-ops-userid: patsy\n"));
    }
}
