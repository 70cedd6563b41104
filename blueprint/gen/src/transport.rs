//! Transport-level request and response values.
//!
//! These are what request plans evaluate to and what dispatch tables
//! consume. No I/O happens here.

use blueprint_define::HttpMethod;
use percent_encoding::percent_decode_str;

/// A fully assembled HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Returns the first header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Returns the raw (still encoded) query string.
    pub fn query(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, query)| query)
    }

    /// Returns the raw (still encoded) query entries in order.
    pub fn query_entries(&self) -> Vec<(&str, &str)> {
        self.query()
            .into_iter()
            .flat_map(|query| query.split('&'))
            .filter(|entry| !entry.is_empty())
            .map(|entry| entry.split_once('=').unwrap_or((entry, "")))
            .collect()
    }

    /// Returns the decoded values of every query entry named `name`.
    pub fn query_values(&self, name: &str) -> Vec<String> {
        self.query_entries()
            .into_iter()
            .filter(|(key, _)| percent_decode_str(key).decode_utf8_lossy() == name)
            .map(|(_, value)| percent_decode_str(value).decode_utf8_lossy().into_owned())
            .collect()
    }

    /// Returns the URI without its query string.
    pub fn path(&self) -> &str {
        self.uri.split_once('?').map_or(self.uri.as_str(), |(path, _)| path)
    }
}

/// A received HTTP response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates an empty response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the first header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_match_case_insensitively() {
        let response = HttpResponse::new(200).with_header("ETag", "\"v1\"");
        assert_eq!(response.header("etag"), Some("\"v1\""));
        assert_eq!(response.header("x-missing"), None);
    }

    #[test]
    fn query_values_are_decoded() {
        let request = HttpRequest {
            method: HttpMethod::Get,
            uri: "https://vault.test/secrets?tags=a,b&q=a%20b&q=c".to_string(),
            headers: Vec::new(),
            body: None,
        };
        assert_eq!(request.path(), "https://vault.test/secrets");
        assert_eq!(request.query_values("tags"), vec!["a,b"]);
        assert_eq!(request.query_values("q"), vec!["a b", "c"]);
        assert_eq!(request.query_entries().len(), 3);
    }

    #[test]
    fn uri_without_query_has_no_entries() {
        let request = HttpRequest {
            method: HttpMethod::Delete,
            uri: "/secrets/a".to_string(),
            headers: Vec::new(),
            body: None,
        };
        assert!(request.query().is_none());
        assert!(request.query_entries().is_empty());
    }
}
