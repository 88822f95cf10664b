//! `hookhttp` executes HTTP calls through a hook pipeline with timeout
//! retries and content-type negotiated bodies.
//!
//! One [`Client::execute`] call encodes the payload once, then for every
//! attempt runs pre-send hooks, dispatches through the [`Transport`], runs
//! post-send hooks and classifies the outcome:
//! - `200` decodes the body into the [`Sink`] and returns the [`Response`]
//! - any other status fails with [`HttpError::Status`]
//! - a transport timeout waits [`Backoff::next`] and retries while
//!   [`CallOptions::retry`] allows
//! - everything else fails the call

mod backoff;
mod client;
mod codec;
mod content;
mod context;
mod error;
mod form;
mod hooks;
mod options;
mod payload;
mod transport;
mod types;

pub use backoff::{Backoff, ConstantBackoff, ExponentialBackoff, JitteredBackoff};
pub use client::Client;
pub use codec::{decode, encode, resolve_content_type};
pub use content::{ContentType, TYPE_FORM, TYPE_HTML, TYPE_JSON, TYPE_TEXT, TYPE_XML, UTF8};
pub use context::CallContext;
pub use error::{BoxError, HttpError, TransportError};
pub use form::{Form, FormValue};
pub use hooks::{hook_fn, Event, Hook, Hooks, Phase};
pub use options::{CallOptions, ClientOptions, Cookie};
pub use payload::{Payload, Sink, StructuredPayload, StructuredSink};
pub use transport::{ReqwestTransport, Transport};
pub use types::{Request, Response};

pub use reqwest::{Method, StatusCode, Url};
pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, HttpError>;
