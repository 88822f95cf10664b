use std::{sync::Arc, time::Duration};

use hookhttp::{CallOptions, Client, ClientOptions, ExponentialBackoff, Payload, Sink};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct NewPost<'a> {
    title: &'a str,
    body: &'a str,
    #[serde(rename = "userId")]
    user_id: u32,
}

#[derive(Debug, Default, Deserialize)]
struct Post {
    id: u32,
    title: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let base_url = std::env::var("HOOKHTTP_BASE_URL")
        .unwrap_or_else(|_| "https://jsonplaceholder.typicode.com".to_owned());
    let client = Client::new(ClientOptions::default().with_base_url(base_url))?;

    let options = CallOptions::new()
        .with_timeout(Duration::from_secs(5))
        .with_retry(2)
        .with_backoff(Arc::new(ExponentialBackoff::new(
            Duration::from_millis(200),
            Duration::from_secs(2),
        )));

    let mut post = Post::default();
    client
        .get("posts/1", Sink::value(&mut post), options.clone())
        .await?;
    println!("fetched #{}: {}", post.id, post.title);

    let draft = NewPost {
        title: "hello",
        body: "from hookhttp",
        user_id: 1,
    };
    let mut created = serde_json::Value::Null;
    // The placeholder API answers POST with 201, which this client reports as a status error.
    match client
        .post("posts", Payload::value(&draft), Sink::value(&mut created), options)
        .await
    {
        Ok(_) => println!("created: {created}"),
        Err(err) if err.is_status() => println!("server answered {:?}", err.status_code()),
        Err(err) => return Err(err.into()),
    }

    Ok(())
}
