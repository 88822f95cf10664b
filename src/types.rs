use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};

/// Outgoing request for one attempt.
#[derive(Clone, Debug)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    /// Encoded body, re-attached before every attempt.
    pub body: Option<Bytes>,
}

impl Request {
    /// Request without headers or body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

/// Fully buffered response.
#[derive(Clone, Debug)]
pub struct Response {
    pub status: StatusCode,
    /// Reason phrase sent by the server when it differs from the canonical one.
    pub reason: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    /// Empty response, mostly for custom transports and tests.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            reason: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Reason phrase the server sent, else the canonical one (`"Not Found"`).
    /// Empty for unknown codes without a phrase.
    pub fn status_text(&self) -> &str {
        match self.reason.as_deref() {
            Some(reason) if !reason.is_empty() => reason,
            _ => self.status.canonical_reason().unwrap_or_default(),
        }
    }

    /// Raw `Content-Type` header, parameters included.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE)?.to_str().ok()
    }

    /// Body as UTF-8, lossy.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
