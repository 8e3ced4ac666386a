use super::mock::*;
use crate::{Config, Error, params, response::CallResult};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_subscriber_runs_before_the_call_settles() {
    let transport = Arc::new(MockTransport::echo());
    let client = client(Config::new(ENDPOINT), &transport);
    let log = Arc::new(Mutex::new(vec![]));

    let events = log.clone();
    client.on("error", move |record, result| {
        events.lock().push(format!("{} {} pending={}", record.method(), result.stat.as_deref().unwrap_or(""), record.is_pending()));
    });

    let ok = client.call("photos.get", params! {}).unwrap();
    let failed = client.call("photos.delete", params! { "stat" => "error" }).unwrap();
    assert!(ok.await.is_ok());
    let err = failed.await.unwrap_err();
    log.lock().push("settled".to_string());

    assert_eq!(err.application_result().and_then(|x| x.stat.as_deref()), Some("error"));
    assert_eq!(*log.lock(), vec!["photos.delete error pending=true", "settled"]);
}

#[tokio::test]
async fn test_ok_subscribers_see_synthesized_entries() {
    let transport = Arc::new(MockTransport::fixed(response_body(std::iter::empty())));
    let client = client(Config::new(ENDPOINT), &transport);
    let seen = Arc::new(Mutex::new(vec![]));

    let sink = seen.clone();
    client.on("ok", move |record, result| sink.lock().push((record.method().to_string(), result.clone())));

    client.call("a", params! {}).unwrap().await.unwrap();
    assert_eq!(*seen.lock(), vec![("a".to_string(), CallResult::missing())]);
}

#[tokio::test]
async fn test_failing_subscriber_does_not_prevent_settling() {
    let transport = Arc::new(MockTransport::echo());
    let client = client(Config::new(ENDPOINT), &transport);
    client.on("error", |_, _| panic!("subscriber failure"));

    let failed = client.call("a", params! { "stat" => "error" }).unwrap();
    let ok = client.call("b", params! {}).unwrap();
    assert!(matches!(failed.await, Err(Error::Application(_))));
    assert_eq!(ok.await.unwrap().result["method"], json!("b"));
}

#[tokio::test]
async fn test_unsubscribed_callback_is_not_called() {
    let transport = Arc::new(MockTransport::echo());
    let client = client(Config::new(ENDPOINT), &transport);
    let hits = Arc::new(Mutex::new(0));

    let counter = hits.clone();
    let id = client.on("error", move |_, _| *counter.lock() += 1);
    client.call("a", params! { "stat" => "error" }).unwrap().await.unwrap_err();
    assert!(client.off(id));
    client.call("a", params! { "stat" => "error" }).unwrap().await.unwrap_err();

    assert_eq!(*hits.lock(), 1);
}
