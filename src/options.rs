use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};

use crate::{Backoff, CallContext, ConstantBackoff, ContentType, Hook, Hooks, HttpError, Result};

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Configures client construction: transport timeouts, base URL and
/// client-level hooks.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Whole-exchange timeout enforced by the transport.
    pub timeout: Duration,
    /// Connection establishment timeout, TLS handshake included.
    pub connect_timeout: Duration,
    /// TCP keep-alive interval; `None` disables it.
    pub keep_alive: Option<Duration>,
    /// Prefix for relative call URLs.
    pub base_url: Option<String>,
    /// Run after call-level hooks on every attempt.
    pub hooks: Hooks,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: Duration::from_secs(60),
            keep_alive: Some(Duration::from_secs(60)),
            base_url: None,
            hooks: Hooks::new(),
        }
    }
}

impl ClientOptions {
    /// Reads overrides from the environment.
    ///
    /// - `HOOKHTTP_BASE_URL`: base URL for relative paths
    /// - `HOOKHTTP_TIMEOUT_MS`: transport timeout in milliseconds
    /// - `HOOKHTTP_CONNECT_TIMEOUT_MS`: connect timeout in milliseconds
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> std::result::Result<Self, String> {
        let mut options = Self::default();
        if let Ok(base_url) = std::env::var("HOOKHTTP_BASE_URL") {
            if base_url.trim().is_empty() {
                return Err("HOOKHTTP_BASE_URL is set but empty".to_owned());
            }
            options.base_url = Some(base_url.trim().to_owned());
        }
        if let Some(timeout) = env_millis("HOOKHTTP_TIMEOUT_MS")? {
            options.timeout = timeout;
        }
        if let Some(timeout) = env_millis("HOOKHTTP_CONNECT_TIMEOUT_MS")? {
            options.connect_timeout = timeout;
        }
        Ok(options)
    }

    /// Prefix for relative call URLs.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Adds a client-level hook, run after the call's own hooks.
    pub fn with_hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }
}

fn env_millis(name: &str) -> std::result::Result<Option<Duration>, String> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|err| format!("{name} must be milliseconds: {err}")),
        Err(_) => Ok(None),
    }
}

/// Cookie attached to the request's `Cookie` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cookie {
    /// Sent as given, not encoded.
    pub name: String,
    pub value: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Per-call settings. Built once, read-only while the call runs.
#[derive(Clone)]
pub struct CallOptions {
    /// Cancellation and deadline for the whole call, backoff waits included.
    pub context: CallContext,
    /// Overrides the client base URL.
    pub base_url: Option<String>,
    /// Per-attempt timeout; `None` leaves only the call context.
    pub timeout: Option<Duration>,
    /// Extra attempts allowed after the first, timeouts only.
    pub retry: usize,
    /// Consulted once per retry.
    pub backoff: Arc<dyn Backoff>,
    /// Encodes the body and decodes responses that declare no type.
    pub content_type: ContentType,
    /// Appended to the outgoing `Content-Type`.
    pub charset: Option<String>,
    pub headers: HeaderMap,
    /// Appended to any query already on the URL; duplicate keys allowed.
    pub query: Vec<(String, String)>,
    pub cookies: Vec<Cookie>,
    /// Opaque values handed to hooks.
    pub data: HashMap<String, String>,
    /// Run before client-level hooks.
    pub hooks: Hooks,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            context: CallContext::new(),
            base_url: None,
            timeout: Some(DEFAULT_TIMEOUT),
            retry: 0,
            backoff: Arc::new(ConstantBackoff::new(DEFAULT_BACKOFF)),
            content_type: ContentType::default(),
            charset: None,
            headers: HeaderMap::new(),
            query: Vec::new(),
            cookies: Vec::new(),
            data: HashMap::new(),
            hooks: Hooks::new(),
        }
    }
}

impl fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallOptions")
            .field("context", &self.context)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("content_type", &self.content_type)
            .field("charset", &self.charset)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("query", &self.query)
            .field("cookies", &self.cookies.len())
            .field("data", &self.data)
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the call context.
    pub fn with_context(mut self, context: CallContext) -> Self {
        self.context = context;
        self
    }

    /// Base URL for this call only; wins over the client's.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attempts run until the call context ends.
    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Extra attempts after the first; only timeouts use them.
    pub fn with_retry(mut self, retry: usize) -> Self {
        self.retry = retry;
        self
    }

    /// Pass a fresh instance per call for an independent progression.
    pub fn with_backoff(mut self, backoff: Arc<dyn Backoff>) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<ContentType>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Appends a header value; existing values for `name` are kept.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        self.add_header(name, value)?;
        Ok(self)
    }

    /// Appends each pair as with [`CallOptions::with_header`].
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in headers {
            self.add_header(name.as_ref(), value.as_ref())?;
        }
        Ok(self)
    }

    /// Appends one query pair.
    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn with_queries<I, K, V>(mut self, queries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(queries.into_iter().map(|(key, value)| (key.into(), value.into())));
        self
    }

    /// Cookies merge into a single `Cookie` header in order.
    pub fn with_cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    pub fn with_cookies(mut self, cookies: impl IntoIterator<Item = Cookie>) -> Self {
        self.cookies.extend(cookies);
        self
    }

    /// Extension value visible to hooks through [`crate::Event::data`].
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Call-level hook, run before the client's hooks.
    pub fn with_hook(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Raw `Authorization` header value.
    pub fn with_authorization(self, authorization: &str) -> Result<Self> {
        self.with_header(AUTHORIZATION.as_str(), authorization)
    }

    /// `Authorization: Basic base64(username:password)`.
    pub fn with_basic_auth(self, username: &str, password: &str) -> Result<Self> {
        let credentials = STANDARD.encode(format!("{username}:{password}"));
        self.with_authorization(&format!("Basic {credentials}"))
    }

    /// `Authorization: Bearer <token>`, token trimmed.
    pub fn with_bearer_auth(self, token: &str) -> Result<Self> {
        self.with_authorization(&format!("Bearer {}", token.trim()))
    }

    /// Sets `X-Jwt-Token`.
    pub fn with_jwt_token(self, token: &str) -> Result<Self> {
        self.with_header("X-Jwt-Token", token)
    }

    /// Sets `X-Auth-Token`.
    pub fn with_auth_token(self, token: &str) -> Result<Self> {
        self.with_header("X-Auth-Token", token)
    }

    fn add_header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| HttpError::InvalidHeader(format!("'{name}': {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| HttpError::InvalidHeader(format!("value for '{name}': {err}")))?;
        self.headers.append(name, value);
        Ok(())
    }
}
