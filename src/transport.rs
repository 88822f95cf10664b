use std::time::Duration;

use async_trait::async_trait;
use hyper::ext::ReasonPhrase;

use crate::{ClientOptions, Request, Response, TransportError};

/// Sends one request and buffers the response.
///
/// Connection reuse, DNS and TLS belong to the implementation. Timeouts must
/// surface as errors whose [`TransportError::is_timeout`] is `true`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &Request) -> Result<Response, TransportError>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Builds the underlying client from timeout and keep-alive settings.
    pub fn from_options(options: &ClientOptions) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .connect_timeout(options.connect_timeout)
            .tcp_keepalive(options.keep_alive.filter(|value| !value.is_zero()))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let reason = response
            .extensions()
            .get::<ReasonPhrase>()
            .and_then(|reason| std::str::from_utf8(reason.as_bytes()).ok())
            .map(str::to_owned);
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(Response {
            status,
            reason,
            headers,
            body,
        })
    }
}

pub(crate) fn describe_timeout(timeout: Option<Duration>) -> String {
    match timeout {
        Some(timeout) => format!("no response within {} ms", timeout.as_millis()),
        None => "no response before attempt deadline".to_owned(),
    }
}
