//! Observer/interceptor pipeline run around every transport send.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{BoxError, HttpError, Request, Response};

/// Where in an attempt a hook is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Before the transport send; the request may still be changed.
    PreSend,
    /// After the send, with its response or error.
    PostSend,
}

/// One pass through the attempt loop, as seen by hooks.
///
/// Pre-send hooks may rewrite the request; post-send hooks see the
/// response or transport error of the same attempt.
pub struct Event<'a> {
    phase: Phase,
    attempt: usize,
    request: &'a mut Request,
    response: Option<&'a Response>,
    error: Option<&'a HttpError>,
    data: &'a HashMap<String, String>,
}

impl<'a> Event<'a> {
    pub(crate) fn pre_send(
        attempt: usize,
        request: &'a mut Request,
        data: &'a HashMap<String, String>,
    ) -> Self {
        Self {
            phase: Phase::PreSend,
            attempt,
            request,
            response: None,
            error: None,
            data,
        }
    }

    pub(crate) fn post_send(
        attempt: usize,
        request: &'a mut Request,
        outcome: &'a Result<Response, HttpError>,
        data: &'a HashMap<String, String>,
    ) -> Self {
        Self {
            phase: Phase::PostSend,
            attempt,
            request,
            response: outcome.as_ref().ok(),
            error: outcome.as_ref().err(),
            data,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Zero-based attempt index.
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    /// Request of this attempt, body attached.
    pub fn request(&self) -> &Request {
        &*self.request
    }

    /// Changes made during [`Phase::PreSend`] are what the transport sends.
    pub fn request_mut(&mut self) -> &mut Request {
        &mut *self.request
    }

    /// Transport response; `None` before sending or when the send failed.
    pub fn response(&self) -> Option<&Response> {
        self.response
    }

    /// Send error of this attempt, if any.
    pub fn error(&self) -> Option<&HttpError> {
        self.error
    }

    /// Extension data from the call options, passed through untouched.
    pub fn data(&self) -> &HashMap<String, String> {
        self.data
    }
}

/// Observer/interceptor invoked in both phases of every attempt.
pub trait Hook: Send + Sync {
    /// Returning an error aborts the whole call; it is never retried.
    fn handle(&self, event: &mut Event<'_>) -> Result<(), BoxError>;
}

impl<F> Hook for F
where
    F: Fn(&mut Event<'_>) -> Result<(), BoxError> + Send + Sync,
{
    fn handle(&self, event: &mut Event<'_>) -> Result<(), BoxError> {
        self(event)
    }
}

/// Wraps a closure as a shareable hook.
pub fn hook_fn<F>(f: F) -> Arc<dyn Hook>
where
    F: Fn(&mut Event<'_>) -> Result<(), BoxError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Ordered hook list.
#[derive(Clone, Default)]
pub struct Hooks(Vec<Arc<dyn Hook>>);

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `hook`; it runs after those already present.
    pub fn push(&mut self, hook: Arc<dyn Hook>) {
        self.0.push(hook);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `self` first, then `other`.
    pub fn chain(&self, other: &Hooks) -> Hooks {
        Hooks(self.0.iter().chain(other.0.iter()).cloned().collect())
    }

    /// Runs hooks in order, stopping at the first error.
    pub fn run(&self, event: &mut Event<'_>) -> Result<(), HttpError> {
        for hook in &self.0 {
            hook.handle(event).map_err(HttpError::Hook)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hooks").field(&self.0.len()).finish()
    }
}

impl FromIterator<Arc<dyn Hook>> for Hooks {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Hook>>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use reqwest::header::HeaderValue;
    use reqwest::{Method, Url};

    use super::{hook_fn, Event, Hooks, Phase};
    use crate::{HttpError, Request};

    fn request() -> Request {
        Request::new(
            Method::GET,
            Url::parse("http://localhost/items").expect("valid url"),
        )
    }

    #[test]
    fn runs_in_order_and_stops_at_first_error() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = Hooks::new();
        for name in ["a", "b", "c"] {
            let seen = Arc::clone(&seen);
            hooks.push(hook_fn(move |_event| {
                seen.lock().expect("lock").push(name);
                if name == "b" {
                    return Err("rejected by b".into());
                }
                Ok(())
            }));
        }

        let mut req = request();
        let data = HashMap::new();
        let mut event = Event::pre_send(0, &mut req, &data);
        let err = hooks.run(&mut event).expect_err("b must abort");

        assert!(matches!(err, HttpError::Hook(_)));
        assert_eq!(*seen.lock().expect("lock"), vec!["a", "b"]);
    }

    #[test]
    fn pre_send_hook_can_mutate_request() {
        let mut hooks = Hooks::new();
        hooks.push(hook_fn(|event| {
            assert_eq!(event.phase(), Phase::PreSend);
            let trace = format!("attempt-{}", event.attempt());
            event
                .request_mut()
                .headers
                .insert("x-trace", HeaderValue::from_str(&trace)?);
            Ok(())
        }));

        let mut req = request();
        let data = HashMap::new();
        hooks
            .run(&mut Event::pre_send(2, &mut req, &data))
            .expect("must pass");
        assert_eq!(req.headers["x-trace"], "attempt-2");
    }

    #[test]
    fn chain_puts_call_hooks_first() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let make = |name: &'static str| {
            let order = Arc::clone(&order);
            hook_fn(move |_event| {
                order.lock().expect("lock").push(name);
                Ok(())
            })
        };
        let call: Hooks = [make("call")].into_iter().collect();
        let client: Hooks = [make("client")].into_iter().collect();

        let mut req = request();
        let data = HashMap::new();
        call.chain(&client)
            .run(&mut Event::pre_send(0, &mut req, &data))
            .expect("must pass");
        assert_eq!(*order.lock().expect("lock"), vec!["call", "client"]);
    }
}
