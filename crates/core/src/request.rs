//! Intercepted requests, stored responses, and the network seam.

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::Error;

/// A request intercepted on its way from a client page to the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRequest {
    /// Upper-case HTTP method.
    pub method: String,
    /// Absolute request URL.
    pub url: Url,
}

impl SiteRequest {
    pub fn new(method: impl AsRef<str>, url: Url) -> Self {
        Self { method: method.as_ref().to_ascii_uppercase(), url }
    }

    /// Shorthand for a `GET` request.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// Only `GET` requests may be read from or written to a bucket.
    pub fn is_cacheable(&self) -> bool {
        self.method == "GET"
    }
}

/// A response as received from the network or read back from a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    /// Final URL the response was served from.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response headers in arrival order.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Bytes,
}

impl StoredResponse {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Bytes>) -> Self {
        Self { url: url.into(), status, headers: Vec::new(), body: body.into() }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// True for 2xx statuses.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup; first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Network fetch interface.
///
/// Any HTTP status counts as a successful fetch; only transport failures
/// (DNS, connect, timeout, oversized body) are errors.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &SiteRequest) -> Result<StoredResponse, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_normalized() {
        let req = SiteRequest::new("post", Url::parse("https://example.com/").unwrap());
        assert_eq!(req.method, "POST");
        assert!(!req.is_cacheable());
        assert!(SiteRequest::get(Url::parse("https://example.com/").unwrap()).is_cacheable());
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let resp = StoredResponse::new("https://example.com/noticias.json", 200, r#"{"a":1}"#)
            .with_header("Content-Type", "application/json");
        assert_eq!(resp.content_type(), Some("application/json"));
        assert_eq!(resp.header("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(resp.header("etag"), None);
        assert_eq!(resp.text(), r#"{"a":1}"#);
    }

    #[test]
    fn test_is_ok() {
        assert!(StoredResponse::new("u", 200, "").is_ok());
        assert!(StoredResponse::new("u", 204, "").is_ok());
        assert!(!StoredResponse::new("u", 304, "").is_ok());
        assert!(!StoredResponse::new("u", 404, "").is_ok());
    }
}
