//! Request targets
//!
//! A [`RequestTarget`] is the immutable description of the endpoint under
//! load. It is built once per run, shared by every worker through an `Arc`,
//! and turned into a fresh [`reqwest::Request`] for every dispatch by
//! [`RequestTarget::materialize`].

use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, COOKIE, HOST};
use reqwest::{Body, Request, Url};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;
use crate::metrics::ServerInfo;

/// Separator between entries of a header line (`"a: 1; b: 2"`)
pub const HEADER_SEPARATOR: char = ';';

/// Content type used when a body is given without one
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

// ============================================================================
// Method
// ============================================================================

/// HTTP methods a target may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// HEAD
    Head,
    /// GET
    #[default]
    Get,
    /// PUT
    Put,
    /// POST
    Post,
    /// PATCH
    Patch,
    /// OPTIONS
    Options,
    /// DELETE
    Delete,
}

impl Method {
    /// Every supported method
    pub const ALL: [Method; 7] = [
        Method::Head,
        Method::Get,
        Method::Put,
        Method::Post,
        Method::Patch,
        Method::Options,
        Method::Delete,
    ];

    /// Wire name of the method
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Head => "HEAD",
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Options => "OPTIONS",
            Method::Delete => "DELETE",
        }
    }

    /// Parse a method, falling back to GET for anything unsupported
    pub fn parse_or_default(raw: &str) -> Method {
        raw.parse().unwrap_or_else(|err: UnsupportedMethod| {
            tracing::warn!(method = %err.0, "Unsupported http method, using GET");
            Method::Get
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Method name outside the supported set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported http method: {0:?}")]
pub struct UnsupportedMethod(pub String);

impl FromStr for Method {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Method::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnsupportedMethod(s.to_string()))
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Head => reqwest::Method::HEAD,
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Options => reqwest::Method::OPTIONS,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

// ============================================================================
// Cookie
// ============================================================================

/// Cookie sent with every request of a run
///
/// Only `name=value` travels in a request's `Cookie` header; the remaining
/// attributes describe the cookie and are kept for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Path attribute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Domain attribute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Expiry attribute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    /// Max-Age attribute in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,
}

impl Cookie {
    /// Create a cookie with no attributes
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: None,
            domain: None,
            expires: None,
            max_age: None,
        }
    }

    /// Parse a `name=value` pair
    pub fn parse(pair: &str) -> Result<Self, ConfigError> {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidCookie(format!("expected name=value, got {pair:?}")))?;
        let cookie = Cookie::new(name.trim(), value.trim());
        cookie.validate()?;
        Ok(cookie)
    }

    /// Set the path attribute
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the domain attribute
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set the expiry attribute
    pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Set the max-age attribute
    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Check the name and value can travel in a `Cookie` header
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::InvalidCookie("empty cookie name".into()));
        }
        if self
            .name
            .chars()
            .any(|c| c == '=' || c == ';' || c.is_whitespace() || c.is_control())
        {
            return Err(ConfigError::InvalidCookie(format!(
                "invalid cookie name {:?}",
                self.name
            )));
        }
        if self
            .value
            .chars()
            .any(|c| c == ';' || c.is_control())
        {
            return Err(ConfigError::InvalidCookie(format!(
                "invalid value for cookie {:?}",
                self.name
            )));
        }
        Ok(())
    }

    /// The `name=value` pair written into the request
    pub fn header_value(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

// ============================================================================
// RequestTarget
// ============================================================================

/// Errors raised while turning a target into a request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstructionError {
    /// URL does not parse
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl {
        /// Offending URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// Cookie cannot be encoded as a header value
    #[error("invalid cookie header: {0}")]
    InvalidCookie(String),
}

/// Immutable description of one HTTP endpoint
#[derive(Debug, Clone)]
pub struct RequestTarget {
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Bytes,
    cookie: Option<Cookie>,
}

impl RequestTarget {
    /// Start building a target
    pub fn builder() -> RequestTargetBuilder {
        RequestTargetBuilder::default()
    }

    /// Request method
    pub fn method(&self) -> Method {
        self.method
    }

    /// Target URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Headers copied into every request
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Request body
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Cookie attached to every request
    pub fn cookie(&self) -> Option<&Cookie> {
        self.cookie.as_ref()
    }

    /// Bytes a request built from this target puts on the wire as body
    pub fn sent_bytes(&self) -> u64 {
        self.body.len() as u64
    }

    /// Host taken from an explicit `Host` header
    pub fn host_override(&self) -> Option<&str> {
        self.headers.get(HOST).and_then(|v| v.to_str().ok())
    }

    /// Describe the server under test
    pub fn server_info(&self) -> ServerInfo {
        let parsed = Url::parse(&self.url).ok();
        let host = self
            .host_override()
            .map(str::to_string)
            .or_else(|| parsed.as_ref().and_then(|u| u.host_str().map(str::to_string)))
            .unwrap_or_default();
        let port = parsed
            .as_ref()
            .and_then(|u| u.port_or_known_default())
            .unwrap_or(0);

        ServerInfo {
            url: self.url.clone(),
            host,
            port,
        }
    }

    /// Target that skips builder validation
    #[cfg(test)]
    pub(crate) fn unchecked(method: Method, url: &str) -> Self {
        Self {
            method,
            url: url.to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            cookie: None,
        }
    }

    /// Build a fresh request for one dispatch
    ///
    /// Every call produces an independent header map, so workers never share
    /// mutable header state with the target or with each other. An explicit
    /// `Host` header travels as-is and takes precedence over the URL host.
    pub fn materialize(&self) -> Result<Request, ConstructionError> {
        let url = Url::parse(&self.url).map_err(|e| ConstructionError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;

        let mut request = Request::new(self.method.into(), url);
        *request.headers_mut() = self.headers.clone();

        if let Some(cookie) = &self.cookie {
            let pair = cookie.header_value();
            let merged = match request.headers().get(COOKIE).and_then(|v| v.to_str().ok()) {
                Some(existing) => format!("{existing}; {pair}"),
                None => pair,
            };
            let value = HeaderValue::from_str(&merged)
                .map_err(|e| ConstructionError::InvalidCookie(e.to_string()))?;
            request.headers_mut().insert(COOKIE, value);
        }

        if !self.body.is_empty() {
            *request.body_mut() = Some(Body::from(self.body.clone()));
        }

        Ok(request)
    }
}

/// Builder for [`RequestTarget`]
///
/// # Example
/// ```
/// use boom_core::RequestTarget;
///
/// let target = RequestTarget::builder()
///     .method("POST")
///     .url("http://localhost:8080/items")
///     .headers_line("Accept: application/json; X-Trace: 1")
///     .body("{}")
///     .content_type("application/json")
///     .build()
///     .unwrap();
/// assert_eq!(target.sent_bytes(), 2);
/// ```
#[derive(Debug, Default)]
pub struct RequestTargetBuilder {
    method: Option<String>,
    url: Option<String>,
    headers: Vec<(String, String)>,
    header_lines: Vec<String>,
    body: Bytes,
    content_type: Option<String>,
    cookie: Option<Cookie>,
}

impl RequestTargetBuilder {
    /// Set the method; unsupported names fall back to GET
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Set the URL
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Append one header value
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Append headers from a `name: value; name: value` line
    pub fn headers_line(mut self, line: impl Into<String>) -> Self {
        self.header_lines.push(line.into());
        self
    }

    /// Set the body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the body content type
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Attach a cookie
    pub fn cookie(mut self, cookie: Cookie) -> Self {
        self.cookie = Some(cookie);
        self
    }

    /// Build the target
    ///
    /// # Errors
    /// Returns a [`ConfigError`] for a missing or malformed URL, a malformed
    /// header entry, or an invalid cookie.
    pub fn build(self) -> Result<RequestTarget, ConfigError> {
        let method = self
            .method
            .as_deref()
            .map(Method::parse_or_default)
            .unwrap_or_default();

        let url = self.url.map(|u| u.trim().to_string()).unwrap_or_default();
        if url.is_empty() {
            return Err(ConfigError::EmptyUrl);
        }
        let parsed = Url::parse(&url).map_err(|e| ConfigError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url,
                reason: format!("unsupported scheme {:?}", parsed.scheme()),
            });
        }

        let mut pairs = self.headers;
        for line in &self.header_lines {
            pairs.extend(parse_header_line(line)?);
        }

        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            let header_name = HeaderName::from_bytes(name.trim().as_bytes())
                .map_err(|_| ConfigError::InvalidHeader(format!("{name}:{value}")))?;
            let header_value = HeaderValue::from_str(value.trim())
                .map_err(|_| ConfigError::InvalidHeader(format!("{name}:{value}")))?;
            headers.append(header_name, header_value);
        }

        if let Some(content_type) = &self.content_type {
            let value = HeaderValue::from_str(content_type.trim())
                .map_err(|_| ConfigError::InvalidHeader(format!("Content-Type:{content_type}")))?;
            headers.insert(CONTENT_TYPE, value);
        } else if !self.body.is_empty() && !headers.contains_key(CONTENT_TYPE) {
            tracing::info!("Body set without Content-Type, using {DEFAULT_CONTENT_TYPE}");
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        }

        if let Some(cookie) = &self.cookie {
            cookie.validate()?;
        }

        Ok(RequestTarget {
            method,
            url,
            headers,
            body: self.body,
            cookie: self.cookie,
        })
    }
}

/// Split a `name: value; name: value` line into pairs
fn parse_header_line(line: &str) -> Result<Vec<(String, String)>, ConfigError> {
    line.split(HEADER_SEPARATOR)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .split_once(':')
                .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
                .filter(|(name, _)| !name.is_empty())
                .ok_or_else(|| ConfigError::InvalidHeader(entry.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{ACCEPT, USER_AGENT};

    fn target() -> RequestTarget {
        RequestTarget::builder()
            .url("http://example.com/path")
            .header("Accept", "text/html")
            .header("Accept", "application/json")
            .header("User-Agent", "boom")
            .build()
            .unwrap()
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("POST".parse::<Method>().unwrap(), Method::Post);
        assert_eq!("patch".parse::<Method>().unwrap(), Method::Patch);
        assert!("TRACE".parse::<Method>().is_err());
        assert_eq!(Method::parse_or_default("CONNECT"), Method::Get);
        assert_eq!(Method::parse_or_default(""), Method::Get);
        assert_eq!(Method::parse_or_default("DELETE"), Method::Delete);
    }

    #[test]
    fn test_method_to_reqwest() {
        for method in Method::ALL {
            let converted: reqwest::Method = method.into();
            assert_eq!(converted.as_str(), method.as_str());
        }
    }

    #[test]
    fn test_builder_defaults_to_get() {
        let target = RequestTarget::builder()
            .url("http://example.com")
            .build()
            .unwrap();
        assert_eq!(target.method(), Method::Get);

        let target = RequestTarget::builder()
            .method("BREW")
            .url("http://example.com")
            .build()
            .unwrap();
        assert_eq!(target.method(), Method::Get);
    }

    #[test]
    fn test_builder_rejects_missing_url() {
        let result = RequestTarget::builder().build();
        assert_eq!(result.unwrap_err(), ConfigError::EmptyUrl);

        let result = RequestTarget::builder().url("   ").build();
        assert_eq!(result.unwrap_err(), ConfigError::EmptyUrl);
    }

    #[test]
    fn test_builder_rejects_malformed_url() {
        let result = RequestTarget::builder().url("not a url").build();
        assert!(matches!(result, Err(ConfigError::InvalidUrl { .. })));

        let result = RequestTarget::builder().url("ftp://example.com").build();
        assert!(matches!(result, Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn test_headers_line() {
        let target = RequestTarget::builder()
            .url("http://example.com")
            .headers_line("X-One: 1; X-Two: a:b ;")
            .build()
            .unwrap();

        assert_eq!(target.headers().get("x-one").unwrap(), "1");
        assert_eq!(target.headers().get("X-TWO").unwrap(), "a:b");
    }

    #[test]
    fn test_headers_line_rejects_entry_without_colon() {
        let result = RequestTarget::builder()
            .url("http://example.com")
            .headers_line("X-One 1")
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidHeader(_))));
    }

    #[test]
    fn test_body_defaults_content_type() {
        let target = RequestTarget::builder()
            .method("POST")
            .url("http://example.com")
            .body("hello")
            .build()
            .unwrap();

        assert_eq!(target.headers().get(CONTENT_TYPE).unwrap(), "text/plain");
        assert_eq!(target.sent_bytes(), 5);
    }

    #[test]
    fn test_explicit_content_type() {
        let target = RequestTarget::builder()
            .method("POST")
            .url("http://example.com")
            .body("{}")
            .content_type("application/json")
            .build()
            .unwrap();

        assert_eq!(
            target.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_materialize_copies_target() {
        let target = target();
        let request = target.materialize().unwrap();

        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(request.url().as_str(), "http://example.com/path");
        let accepts: Vec<_> = request.headers().get_all(ACCEPT).iter().collect();
        assert_eq!(accepts, vec!["text/html", "application/json"]);
        assert!(request.body().is_none());
    }

    #[test]
    fn test_materialize_requests_do_not_share_headers() {
        let target = target();
        let mut first = target.materialize().unwrap();
        let second = target.materialize().unwrap();

        first.headers_mut().remove(ACCEPT);
        first
            .headers_mut()
            .insert(USER_AGENT, HeaderValue::from_static("mutated"));

        assert_eq!(second.headers().get_all(ACCEPT).iter().count(), 2);
        assert_eq!(second.headers().get(USER_AGENT).unwrap(), "boom");
        assert_eq!(target.headers().get_all(ACCEPT).iter().count(), 2);
        assert_eq!(target.headers().get(USER_AGENT).unwrap(), "boom");
    }

    #[test]
    fn test_concurrent_materialize_is_independent() {
        let target = target();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let target = &target;
                    scope.spawn(move || {
                        let mut request = target.materialize().unwrap();
                        let value = HeaderValue::from_str(&format!("worker-{i}")).unwrap();
                        request.headers_mut().insert(USER_AGENT, value);
                        request
                    })
                })
                .collect();

            for (i, handle) in handles.into_iter().enumerate() {
                let request = handle.join().unwrap();
                assert_eq!(
                    request.headers().get(USER_AGENT).unwrap(),
                    format!("worker-{i}").as_str()
                );
            }
        });

        assert_eq!(target.headers().get(USER_AGENT).unwrap(), "boom");
    }

    #[test]
    fn test_materialize_keeps_host_header() {
        let target = RequestTarget::builder()
            .url("http://127.0.0.1:8080/")
            .header("Host", "api.example.com")
            .build()
            .unwrap();

        assert_eq!(target.host_override(), Some("api.example.com"));
        let request = target.materialize().unwrap();
        assert_eq!(request.headers().get(HOST).unwrap(), "api.example.com");
        assert_eq!(request.url().host_str(), Some("127.0.0.1"));
    }

    #[test]
    fn test_materialize_attaches_cookie() {
        let target = RequestTarget::builder()
            .url("http://example.com")
            .cookie(Cookie::new("session", "abc").with_path("/"))
            .build()
            .unwrap();

        let request = target.materialize().unwrap();
        assert_eq!(request.headers().get(COOKIE).unwrap(), "session=abc");
    }

    #[test]
    fn test_materialize_merges_cookie_header() {
        let target = RequestTarget::builder()
            .url("http://example.com")
            .header("Cookie", "a=1")
            .cookie(Cookie::new("b", "2"))
            .build()
            .unwrap();

        let request = target.materialize().unwrap();
        assert_eq!(request.headers().get(COOKIE).unwrap(), "a=1; b=2");
    }

    #[test]
    fn test_materialize_sets_body() {
        let target = RequestTarget::builder()
            .method("PUT")
            .url("http://example.com")
            .body("payload")
            .build()
            .unwrap();

        let request = target.materialize().unwrap();
        assert_eq!(request.method(), reqwest::Method::PUT);
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(body, b"payload");
    }

    #[test]
    fn test_materialize_malformed_url() {
        let target = RequestTarget::unchecked(Method::Get, "http://[::1");

        assert!(matches!(
            target.materialize(),
            Err(ConstructionError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_cookie_parse() {
        let cookie = Cookie::parse("token = xyz").unwrap();
        assert_eq!(cookie.name, "token");
        assert_eq!(cookie.value, "xyz");
        assert_eq!(cookie.header_value(), "token=xyz");

        assert!(Cookie::parse("novalue").is_err());
        assert!(Cookie::parse("=x").is_err());
        assert!(Cookie::new("a b", "c").validate().is_err());
        assert!(Cookie::new("a", "c;d").validate().is_err());
    }

    #[test]
    fn test_cookie_attributes() {
        let expires = Utc::now();
        let cookie = Cookie::new("id", "7")
            .with_domain("example.com")
            .with_expires(expires)
            .with_max_age(60);

        assert_eq!(cookie.domain.as_deref(), Some("example.com"));
        assert_eq!(cookie.expires, Some(expires));
        assert_eq!(cookie.max_age, Some(60));
        assert_eq!(cookie.header_value(), "id=7");
    }

    #[test]
    fn test_server_info() {
        let info = target().server_info();
        assert_eq!(info.host, "example.com");
        assert_eq!(info.port, 80);
        assert_eq!(info.url, "http://example.com/path");

        let https = RequestTarget::builder()
            .url("https://example.com:8443/")
            .build()
            .unwrap();
        assert_eq!(https.server_info().port, 8443);
    }
}
