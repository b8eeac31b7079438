use std::borrow::Cow;

use http::header::{HeaderName, HeaderValue};
use http::Method;

use super::*;

/// Returns the path of a URL with its query string, if any.
fn path_from_url(url: &url::Url) -> Cow<'_, str> {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query).into(),
        None => url.path().into(),
    }
}

impl ClientRequestLike for reqwest::Request {
    fn method(&self) -> &Method {
        reqwest::Request::method(self)
    }
    fn path(&self) -> Cow<'_, str> {
        path_from_url(self.url())
    }
    fn body_bytes(&mut self) -> Result<Option<&[u8]>, BodyReadError> {
        match self.body() {
            None => Ok(None),
            Some(body) => body.as_bytes().map(Some).ok_or(BodyReadError::Streaming),
        }
    }
    fn header(&self, name: &HeaderName) -> Option<HeaderValue> {
        self.headers().get(name).cloned()
    }
    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers_mut().insert(name, value);
    }
}

impl ClientRequestLike for reqwest::blocking::Request {
    fn method(&self) -> &Method {
        reqwest::blocking::Request::method(self)
    }
    fn path(&self) -> Cow<'_, str> {
        path_from_url(self.url())
    }
    fn body_bytes(&mut self) -> Result<Option<&[u8]>, BodyReadError> {
        match self.body_mut().as_mut() {
            None => Ok(None),
            Some(body) => body
                .buffer()
                .map(Some)
                .map_err(|e| BodyReadError::Buffer(Box::new(e))),
        }
    }
    fn header(&self, name: &HeaderName) -> Option<HeaderValue> {
        self.headers().get(name).cloned()
    }
    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers_mut().insert(name, value);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{offset::TimeZone, DateTime, Utc};
    use http::header::CONTENT_TYPE;

    use super::*;
    use crate::test_keys::{FIXTURE_BODY, FIXTURE_CHUNKS, PKCS1_PEM};

    fn frozen() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 6, 29, 15, 30, 22)
            .single()
            .expect("valid date")
    }

    fn handler() -> AuthHandler {
        AuthHandler::new("patsy", PKCS1_PEM)
            .unwrap()
            .with_clock(frozen)
    }

    fn assert_fixture_headers(headers: &http::HeaderMap) {
        assert_eq!(headers.get("X-Ops-Sign").unwrap(), "version=1.0");
        assert_eq!(headers.get("X-Ops-UserId").unwrap(), "patsy");
        assert_eq!(
            headers.get("X-Ops-Timestamp").unwrap(),
            "2015-06-29T15:30:22Z"
        );
        assert_eq!(
            headers.get("X-Ops-Content-Hash").unwrap(),
            "aHdx6owad8NyrGEyjOcr5dWC0Nw="
        );
        for (i, chunk) in FIXTURE_CHUNKS.iter().enumerate() {
            let name = format!("X-Ops-Authorization-{}", i + 1);
            assert_eq!(headers.get(name.as_str()).unwrap(), chunk);
        }
        assert!(headers.get("X-Ops-Authorization-7").is_none());
    }

    #[test]
    fn it_works() {
        let client = reqwest::Client::new();

        let without_sig = client
            .get("http://chef-server.com")
            .header(CONTENT_TYPE, "text/plain")
            .body(FIXTURE_BODY)
            .build()
            .unwrap();

        let with_sig = without_sig.signed(&handler()).unwrap();

        assert_fixture_headers(with_sig.headers());
        assert_eq!(with_sig.headers().get(CONTENT_TYPE).unwrap(), "text/plain");
    }

    #[test]
    fn it_works_blocking() {
        let client = reqwest::blocking::Client::new();

        let without_sig = client
            .get("http://chef-server.com")
            .header(CONTENT_TYPE, "text/plain")
            .body(FIXTURE_BODY)
            .build()
            .unwrap();

        let with_sig = without_sig.signed(&handler()).unwrap();

        assert_fixture_headers(with_sig.headers());
    }

    #[test]
    fn hashes_query_free_path() {
        let client = reqwest::blocking::Client::new();
        let handler = handler();

        let mut with_query = client
            .get("http://chef-server.com/search/node?q=name:web*")
            .build()
            .unwrap();
        assert_eq!(with_query.path(), "/search/node?q=name:web*");

        let mut without_query = client
            .get("http://chef-server.com/search/node")
            .build()
            .unwrap();

        with_query.sign(&handler).unwrap();
        without_query.sign(&handler).unwrap();
        assert_eq!(
            with_query.headers().get("X-Ops-Authorization-1"),
            without_query.headers().get("X-Ops-Authorization-1")
        );
    }

    #[test]
    fn missing_body_is_empty() {
        let client = reqwest::Client::new();
        let req = client
            .delete("http://chef-server.com/nodes/web1")
            .build()
            .unwrap()
            .signed(&handler())
            .unwrap();
        assert_eq!(
            req.headers().get("X-Ops-Content-Hash").unwrap(),
            "2jmj7l5rSw0yVb/vlWAYkK/YBwk="
        );
    }
}
