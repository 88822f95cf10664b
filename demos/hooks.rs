use std::time::{Duration, Instant};

use hookhttp::{hook_fn, CallContext, CallOptions, Client, ClientOptions, Phase, Sink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let started = Instant::now();
    let timing = hook_fn(move |event| {
        match event.phase() {
            Phase::PreSend => println!(
                "[{:>5} ms] attempt {} -> {} {}",
                started.elapsed().as_millis(),
                event.attempt(),
                event.request().method,
                event.request().url
            ),
            Phase::PostSend => match (event.response(), event.error()) {
                (Some(response), _) => println!(
                    "[{:>5} ms] attempt {} <- {}",
                    started.elapsed().as_millis(),
                    event.attempt(),
                    response.status
                ),
                (_, Some(err)) => println!(
                    "[{:>5} ms] attempt {} failed: {err}",
                    started.elapsed().as_millis(),
                    event.attempt()
                ),
                _ => {}
            },
        }
        Ok(())
    });
    let client = Client::new(ClientOptions::default().with_hook(timing))?;

    let tracing_header = hook_fn(|event| {
        if event.phase() == Phase::PreSend {
            let id = event.data().get("request-id").cloned().unwrap_or_default();
            event.request_mut().headers.insert("x-request-id", id.parse()?);
        }
        Ok(())
    });

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://httpbin.org/delay/3".to_owned());
    let context = CallContext::new().with_timeout(Duration::from_secs(10));
    let options = CallOptions::new()
        .with_context(context)
        .with_timeout(Duration::from_secs(1))
        .with_retry(3)
        .with_data("request-id", "demo-1")
        .with_hook(tracing_header);

    let mut body = String::new();
    match client.get(&url, Sink::from(&mut body), options).await {
        Ok(response) => println!("{} ({} bytes)", response.status, body.len()),
        Err(err) => println!("call failed: {err}"),
    }

    Ok(())
}
