use std::fmt;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE};
use reqwest::{Method, StatusCode, Url};
use tokio::time::sleep;

use crate::{
    codec,
    hooks::Event,
    transport::{describe_timeout, ReqwestTransport},
    CallOptions, ClientOptions, Cookie, HttpError, Hooks, Payload, Request, Response, Result,
    Sink, Transport, TransportError,
};

/// Executes logical calls: encode once, then attempt and retry timeouts
/// until success or a terminal error.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    base_url: Option<String>,
    hooks: Hooks,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl Client {
    /// Creates a client whose transport is a `reqwest` client configured from
    /// `options`. Fails if the `reqwest` client cannot be built; there is no
    /// fallback transport.
    pub fn new(options: ClientOptions) -> Result<Self> {
        let transport = ReqwestTransport::from_options(&options).map_err(HttpError::Transport)?;
        Ok(Self::with_transport(Arc::new(transport), options))
    }

    /// Creates a client over any [`Transport`].
    pub fn with_transport(transport: Arc<dyn Transport>, options: ClientOptions) -> Self {
        Self {
            transport,
            base_url: options.base_url.filter(|url| !url.trim().is_empty()),
            hooks: options.hooks,
        }
    }

    /// `GET` without a body.
    pub async fn get(&self, url: &str, sink: Sink<'_>, options: CallOptions) -> Result<Response> {
        self.execute(Method::GET, url, Payload::Empty, sink, options)
            .await
    }

    /// `POST` with `body` encoded by the configured content type.
    pub async fn post(
        &self,
        url: &str,
        body: Payload<'_>,
        sink: Sink<'_>,
        options: CallOptions,
    ) -> Result<Response> {
        self.execute(Method::POST, url, body, sink, options).await
    }

    /// Runs one logical call.
    ///
    /// Only timeout-classified transport errors are retried, at most
    /// `options.retry` times, waiting `options.backoff.next()` between
    /// attempts. Hook errors, non-timeout transport errors, non-200 statuses
    /// and decode errors end the call immediately. Cancelling
    /// `options.context` aborts an in-flight attempt or backoff wait with the
    /// context's error.
    ///
    /// On success the returned response still carries its own body bytes,
    /// whether or not `sink` consumed them.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Payload<'_>,
        mut sink: Sink<'_>,
        options: CallOptions,
    ) -> Result<Response> {
        let url = self.resolve_url(url, &options)?;
        let encoded = codec::encode(&options.content_type, &body)?;
        let mut request = build_request(method, url, encoded.is_some(), &options)?;
        let hooks = options.hooks.chain(&self.hooks);
        let context = &options.context;

        let mut attempt = 0usize;
        loop {
            request.body = encoded.clone();
            let scope = context.child_with_timeout(options.timeout);

            if let Err(err) = hooks.run(&mut Event::pre_send(attempt, &mut request, &options.data)) {
                #[cfg(feature = "tracing")]
                tracing::debug!(attempt, error = %err, "pre-send hook aborted call");
                return Err(err);
            }

            #[cfg(feature = "tracing")]
            tracing::debug!(
                attempt,
                method = %request.method,
                url = %request.url,
                "dispatching request"
            );

            let outcome = tokio::select! {
                biased;
                err = context.done() => Err(err),
                _ = scope.done() => Err(HttpError::Transport(TransportError::Timeout(
                    describe_timeout(options.timeout),
                ))),
                result = self.transport.send(&request) => result.map_err(HttpError::Transport),
            };

            let observed = hooks.run(&mut Event::post_send(
                attempt,
                &mut request,
                &outcome,
                &options.data,
            ));
            if let Err(err) = observed {
                #[cfg(feature = "tracing")]
                tracing::debug!(attempt, error = %err, "post-send hook aborted call");
                return Err(err);
            }

            match outcome {
                Ok(response) => return finish(response, &mut sink, &options),
                Err(err) if err.is_timeout() && attempt < options.retry => {
                    let wait = options.backoff.next();

                    #[cfg(feature = "tracing")]
                    tracing::debug!(attempt, ?wait, error = %err, "retrying after timeout");

                    tokio::select! {
                        biased;
                        err = context.done() => {
                            #[cfg(feature = "tracing")]
                            tracing::debug!(attempt, error = %err, "call ended during backoff");
                            return Err(err);
                        }
                        _ = sleep(wait) => {}
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn resolve_url(&self, target: &str, options: &CallOptions) -> Result<Url> {
        let base = options
            .base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .or(self.base_url.as_deref());
        let full = match base {
            Some(base) if !is_absolute(target) => join_url(base, target),
            _ => target.to_owned(),
        };

        let mut url = Url::parse(&full).map_err(|err| HttpError::InvalidUrl {
            url: full.clone(),
            reason: err.to_string(),
        })?;
        if !options.query.is_empty() {
            url.query_pairs_mut().extend_pairs(
                options
                    .query
                    .iter()
                    .map(|(key, value)| (key.as_str(), value.as_str())),
            );
        }
        Ok(url)
    }
}

fn finish(response: Response, sink: &mut Sink<'_>, options: &CallOptions) -> Result<Response> {
    if response.status != StatusCode::OK {
        #[cfg(feature = "tracing")]
        tracing::debug!(status = response.status.as_u16(), "non-200 response");

        return Err(HttpError::Status {
            code: response.status.as_u16(),
            status: response.status_text().to_owned(),
        });
    }

    let content_type = codec::resolve_content_type(&response.headers, &options.content_type);
    codec::decode(&content_type, &response.body, sink)?;
    Ok(response)
}

fn build_request(method: Method, url: Url, has_body: bool, options: &CallOptions) -> Result<Request> {
    let mut request = Request::new(method, url);
    request.headers = options.headers.clone();

    if has_body && !request.headers.contains_key(CONTENT_TYPE) {
        let value = options
            .content_type
            .header_value(options.charset.as_deref());
        let value = HeaderValue::from_str(&value)
            .map_err(|err| HttpError::InvalidHeader(format!("content type '{value}': {err}")))?;
        request.headers.insert(CONTENT_TYPE, value);
    }

    attach_cookies(&mut request.headers, &options.cookies)?;
    Ok(request)
}

/// Appends each cookie to the single `Cookie` header, `a=1; b=2`.
fn attach_cookies(headers: &mut HeaderMap, cookies: &[Cookie]) -> Result<()> {
    for cookie in cookies {
        let pair = cookie.to_string();
        let merged = match headers.get(COOKIE).and_then(|value| value.to_str().ok()) {
            Some(existing) if !existing.is_empty() => format!("{existing}; {pair}"),
            _ => pair,
        };
        let value = HeaderValue::from_str(&merged)
            .map_err(|err| HttpError::InvalidHeader(format!("cookie '{}': {err}", cookie.name)))?;
        headers.insert(COOKIE, value);
    }
    Ok(())
}

fn is_absolute(target: &str) -> bool {
    Url::parse(target)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

fn join_url(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.to_owned();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
