use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use bytes::Bytes;
use hookhttp::{
    hook_fn, Backoff, CallContext, CallOptions, Client, ClientOptions, ConstantBackoff,
    ExponentialBackoff, HttpError, Payload, Phase, Request, Response, Sink, StatusCode, Transport,
    TransportError,
};
use reqwest::header::{HeaderValue, CONTENT_TYPE};

enum Step {
    Reply(Response),
    Fail(TransportError),
    Stall(Duration),
}

/// Plays back a fixed script; once exhausted every send times out.
#[derive(Default)]
struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
    bodies: Mutex<Vec<Option<Bytes>>>,
}

impl ScriptedTransport {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into()),
            ..Self::default()
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &Request) -> Result<Response, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bodies
            .lock()
            .expect("bodies mutex")
            .push(request.body.clone());

        let step = self.script.lock().expect("script mutex").pop_front();
        match step {
            Some(Step::Reply(response)) => Ok(response),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Stall(delay)) => {
                tokio::time::sleep(delay).await;
                Err(TransportError::Other("stalled past test budget".to_owned()))
            }
            None => Err(TransportError::Timeout("scripted timeout".to_owned())),
        }
    }
}

fn client(transport: Arc<ScriptedTransport>) -> Client {
    Client::with_transport(transport, ClientOptions::default())
}

fn json_ok(body: &'static str) -> Step {
    Step::Reply(
        Response::new(StatusCode::OK)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(body),
    )
}

fn fast_retry(retry: usize) -> CallOptions {
    CallOptions::new()
        .with_retry(retry)
        .with_backoff(Arc::new(ConstantBackoff::new(Duration::from_millis(1))))
}

/// Records every wait it hands out.
struct RecordingBackoff {
    inner: ExponentialBackoff,
    waits: Mutex<Vec<Duration>>,
}

impl RecordingBackoff {
    fn fresh() -> Arc<Self> {
        Arc::new(Self {
            inner: ExponentialBackoff::new(Duration::from_millis(1), Duration::from_millis(50)),
            waits: Mutex::new(Vec::new()),
        })
    }

    fn waits(&self) -> Vec<Duration> {
        self.waits.lock().expect("waits mutex").clone()
    }
}

impl Backoff for RecordingBackoff {
    fn reset(&self) {
        self.inner.reset();
    }

    fn next(&self) -> Duration {
        let wait = self.inner.next();
        self.waits.lock().expect("waits mutex").push(wait);
        wait
    }
}

#[tokio::test]
async fn timeouts_exhaust_budget_with_r_plus_one_attempts() {
    let transport = ScriptedTransport::new(vec![]);
    let err = client(transport.clone())
        .get("http://svc.local/items", Sink::Discard, fast_retry(3))
        .await
        .expect_err("always times out");

    assert!(err.is_timeout());
    assert_eq!(transport.calls(), 4);
}

#[tokio::test]
async fn zero_budget_makes_a_single_attempt() {
    let transport = ScriptedTransport::new(vec![]);
    let err = client(transport.clone())
        .get("http://svc.local/items", Sink::Discard, fast_retry(0))
        .await
        .expect_err("always times out");

    assert!(err.is_timeout());
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn non_timeout_transport_error_is_not_retried() {
    let transport = ScriptedTransport::new(vec![Step::Fail(TransportError::Other(
        "connection refused".to_owned(),
    ))]);
    let err = client(transport.clone())
        .get("http://svc.local/items", Sink::Discard, fast_retry(5))
        .await
        .expect_err("must fail");

    assert!(matches!(err, HttpError::Transport(TransportError::Other(_))));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn status_404_is_terminal_regardless_of_budget() {
    let transport = ScriptedTransport::new(vec![Step::Reply(Response::new(StatusCode::NOT_FOUND))]);
    let err = client(transport.clone())
        .get("http://svc.local/items", Sink::Discard, fast_retry(5))
        .await
        .expect_err("must fail");

    assert_eq!(err.status_code(), Some(404));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn timeout_then_success_reattaches_identical_body() {
    let transport = ScriptedTransport::new(vec![
        Step::Fail(TransportError::Timeout("first".to_owned())),
        json_ok(r#"{"ok":true}"#),
    ]);
    let mut reply = serde_json::Value::Null;
    let response = client(transport.clone())
        .post(
            "http://svc.local/items",
            Payload::from("payload"),
            Sink::value(&mut reply),
            fast_retry(2),
        )
        .await
        .expect("second attempt succeeds");

    assert_eq!(reply, serde_json::json!({"ok": true}));
    assert_eq!(response.body, Bytes::from_static(br#"{"ok":true}"#));
    let bodies = transport.bodies.lock().expect("bodies mutex").clone();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0].as_deref(), Some(&b"payload"[..]));
    assert_eq!(bodies[0], bodies[1]);
}

#[tokio::test]
async fn cancellation_during_backoff_wins() {
    let transport = ScriptedTransport::new(vec![]);
    let context = CallContext::new();
    let canceller = context.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let err = client(transport.clone())
        .get(
            "http://svc.local/items",
            Sink::Discard,
            CallOptions::new()
                .with_context(context)
                .with_retry(3)
                .with_backoff(Arc::new(ConstantBackoff::new(Duration::from_secs(30)))),
        )
        .await
        .expect_err("cancelled");

    assert!(matches!(err, HttpError::Cancelled));
    assert_eq!(transport.calls(), 1);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn call_deadline_during_backoff_returns_deadline_error() {
    let transport = ScriptedTransport::new(vec![]);
    let err = client(transport.clone())
        .get(
            "http://svc.local/items",
            Sink::Discard,
            CallOptions::new()
                .with_context(CallContext::new().with_timeout(Duration::from_millis(30)))
                .with_retry(3)
                .with_backoff(Arc::new(ConstantBackoff::new(Duration::from_secs(30)))),
        )
        .await
        .expect_err("deadline passes");

    assert!(matches!(err, HttpError::DeadlineExceeded));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn cancellation_during_send_aborts_attempt() {
    let transport = ScriptedTransport::new(vec![Step::Stall(Duration::from_secs(30))]);
    let context = CallContext::new();
    let canceller = context.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = client(transport.clone())
        .get(
            "http://svc.local/items",
            Sink::Discard,
            fast_retry(3).with_context(context),
        )
        .await
        .expect_err("cancelled");

    assert!(matches!(err, HttpError::Cancelled));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn attempt_timeout_scope_is_retryable() {
    let transport = ScriptedTransport::new(vec![
        Step::Stall(Duration::from_secs(30)),
        Step::Stall(Duration::from_secs(30)),
    ]);
    let err = client(transport.clone())
        .get(
            "http://svc.local/items",
            Sink::Discard,
            fast_retry(1).with_timeout(Duration::from_millis(20)),
        )
        .await
        .expect_err("both attempts time out");

    assert!(matches!(err, HttpError::Transport(TransportError::Timeout(_))));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn pre_send_hook_error_aborts_before_dispatch() {
    let transport = ScriptedTransport::new(vec![json_ok("{}")]);
    let options = fast_retry(3).with_hook(hook_fn(|event| {
        if event.request().headers.get("x-api-key").is_none() {
            return Err("missing api key".into());
        }
        Ok(())
    }));

    let err = client(transport.clone())
        .get("http://svc.local/items", Sink::Discard, options)
        .await
        .expect_err("hook rejects");

    assert!(matches!(err, HttpError::Hook(_)));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn post_send_hook_error_on_timeout_is_not_retried() {
    let transport = ScriptedTransport::new(vec![]);
    let options = fast_retry(3).with_hook(hook_fn(|event| match event.error() {
        Some(err) if err.is_timeout() => Err("give up on first timeout".into()),
        _ => Ok(()),
    }));

    let err = client(transport.clone())
        .get("http://svc.local/items", Sink::Discard, options)
        .await
        .expect_err("hook aborts");

    assert!(matches!(err, HttpError::Hook(_)));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn hooks_run_in_both_phases_on_every_attempt() {
    let transport = ScriptedTransport::new(vec![
        Step::Fail(TransportError::Timeout("a".to_owned())),
        Step::Fail(TransportError::Timeout("b".to_owned())),
        json_ok("{}"),
    ]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let options = fast_retry(2)
        .with_data("tenant", "acme")
        .with_hook(hook_fn(move |event| {
            assert_eq!(event.data().get("tenant").map(String::as_str), Some("acme"));
            let detail = match event.phase() {
                Phase::PreSend => "pre",
                Phase::PostSend if event.response().is_some() => "ok",
                Phase::PostSend => "err",
            };
            log.lock().expect("log mutex").push((event.attempt(), detail));
            Ok(())
        }));

    client(transport)
        .get("http://svc.local/items", Sink::Discard, options)
        .await
        .expect("third attempt succeeds");

    assert_eq!(
        *seen.lock().expect("log mutex"),
        vec![
            (0, "pre"),
            (0, "err"),
            (1, "pre"),
            (1, "err"),
            (2, "pre"),
            (2, "ok")
        ]
    );
}

#[tokio::test]
async fn decode_error_after_success_is_terminal() {
    let transport = ScriptedTransport::new(vec![json_ok("{broken"), json_ok("{}")]);
    let mut reply = serde_json::Value::Null;
    let err = client(transport.clone())
        .get("http://svc.local/items", Sink::value(&mut reply), fast_retry(3))
        .await
        .expect_err("bad json");

    assert!(matches!(err, HttpError::Decode(_)));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn empty_success_body_with_destination_is_no_data() {
    let transport = ScriptedTransport::new(vec![Step::Reply(Response::new(StatusCode::OK))]);
    let mut text = String::new();
    let err = client(transport)
        .get("http://svc.local/items", Sink::from(&mut text), CallOptions::new())
        .await
        .expect_err("empty body");

    assert!(matches!(err, HttpError::NoData));
}

#[tokio::test]
async fn encode_failure_never_reaches_transport() {
    #[derive(serde::Serialize)]
    struct Body {
        id: u32,
    }
    let transport = ScriptedTransport::new(vec![json_ok("{}")]);
    let err = client(transport.clone())
        .post(
            "http://svc.local/items",
            Payload::value(&Body { id: 1 }),
            Sink::Discard,
            CallOptions::new().with_content_type("text/plain"),
        )
        .await
        .expect_err("text cannot carry structured value");

    assert!(matches!(err, HttpError::InvalidType));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn backoff_consulted_once_per_retry_and_fresh_instances_restart() {
    let first = RecordingBackoff::fresh();
    client(ScriptedTransport::new(vec![]))
        .get(
            "http://svc.local/items",
            Sink::Discard,
            CallOptions::new().with_retry(3).with_backoff(first.clone()),
        )
        .await
        .expect_err("always times out");
    assert_eq!(
        first.waits(),
        vec![
            Duration::from_millis(1),
            Duration::from_millis(2),
            Duration::from_millis(4)
        ]
    );

    let second = RecordingBackoff::fresh();
    client(ScriptedTransport::new(vec![]))
        .get(
            "http://svc.local/items",
            Sink::Discard,
            CallOptions::new().with_retry(1).with_backoff(second.clone()),
        )
        .await
        .expect_err("always times out");
    assert_eq!(second.waits(), vec![Duration::from_millis(1)]);
}
