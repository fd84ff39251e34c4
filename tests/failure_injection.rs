//! Failure injection: retries, timeouts, classification and the HTTP boundary.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use netaware::http::HttpResource;
use netaware::resilience::RetryPolicy;
use netaware::{
    ApiError, DataSource, Envelope, ErrorKind, OfflineBehavior, QueryPolicy, SimplifiedApiGate,
};

mod common;
use common::{Script, Stack};

fn quick_retries() -> QueryPolicy<Vec<u32>> {
    QueryPolicy::default().with_retry(RetryPolicy::new(3, 0, 0))
}

#[tokio::test]
async fn transient_failures_retry_until_success() {
    let stack = Stack::online("products");
    let executor = stack.executor();
    let script = Script::new(vec![
        Err(ApiError::server("502")),
        Err(ApiError::network("reset")),
        Ok(vec![4, 5]),
    ]);

    let result = executor
        .execute(
            "products/list",
            (),
            |_| {
                let outcome = script.next();
                async move { outcome }
            },
            &quick_retries(),
        )
        .await
        .unwrap();

    assert_eq!(script.calls(), 3);
    assert_eq!(result.source, DataSource::Live);
    assert_eq!(result.data, Some(vec![4, 5]));
    assert_eq!(stack.tracker.snapshot().consecutive_failures, 0);
}

#[tokio::test]
async fn terminal_failures_are_not_retried_or_absorbed() {
    for error in [
        ApiError::validation("bad sku"),
        ApiError::auth("expired"),
        ApiError::not_found("missing"),
    ] {
        let stack = Stack::online("products");
        let executor = stack.executor();
        let kind = error.kind;
        let script: Script<Vec<u32>> = Script::always(Err(error));

        let err = executor
            .execute(
                "products/7",
                (),
                |_| {
                    let outcome = script.next();
                    async move { outcome }
                },
                &quick_retries().with_default(vec![]),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), kind);
        assert_eq!(script.calls(), 1, "{kind} must not retry");
    }
}

#[tokio::test(start_paused = true)]
async fn slow_fetch_times_out_as_network_failure() {
    let stack = Stack::online("products");
    let executor = stack.executor();
    let policy = QueryPolicy::default()
        .with_retry(RetryPolicy::none())
        .with_timeout(Duration::from_millis(100))
        .offline_behavior(OfflineBehavior::Error);

    let err = executor
        .execute(
            "products/slow",
            (),
            |_| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Envelope::new(vec![1u32]))
            },
            &policy,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(err.code(), "timeout");
    assert_eq!(stack.tracker.snapshot().consecutive_failures, 1);
}

#[tokio::test]
async fn exhausted_retries_fall_back_to_default() {
    let stack = Stack::online("products");
    let executor = stack.executor();
    let script: Script<Vec<u32>> = Script::always(Err(ApiError::server("503")));

    let result = executor
        .execute(
            "products/list",
            (),
            |_| {
                let outcome = script.next();
                async move { outcome }
            },
            &quick_retries().with_default(vec![0]),
        )
        .await
        .unwrap();

    assert!(result.is_offline_data);
    assert_eq!(result.source, DataSource::Default);
    assert_eq!(result.data, Some(vec![0]));
}

#[tokio::test]
async fn silent_mode_carries_error_summary() {
    let stack = Stack::online("products");
    let executor = stack.executor();
    let script: Script<Vec<u32>> = Script::always(Err(ApiError::network("unreachable")));

    let result = executor
        .execute(
            "products/list",
            (),
            |_| {
                let outcome = script.next();
                async move { outcome }
            },
            &QueryPolicy::default()
                .with_retry(RetryPolicy::none())
                .offline_behavior(OfflineBehavior::Silent),
        )
        .await
        .unwrap();

    assert_eq!(result.source, DataSource::Empty);
    assert_eq!(result.data, None);
    let meta = result.meta.unwrap();
    assert_eq!(meta["error"]["kind"], json!("network"));
    assert_eq!(meta["error"]["message"], json!("unreachable"));
}

#[tokio::test]
async fn http_server_errors_retry_then_succeed() {
    let hits = Arc::new(AtomicU32::new(0));
    let h = hits.clone();
    let addr = common::start_programmable_backend(move || {
        let h = h.clone();
        async move {
            if h.fetch_add(1, Ordering::SeqCst) < 2 {
                (503, r#"{"message":"warming up"}"#.to_string())
            } else {
                (200, r#"{"data":[1,2,3]}"#.to_string())
            }
        }
    })
    .await;

    let resource = HttpResource::new(&format!("http://{addr}/api")).unwrap();
    let stack = Stack::online("products");
    let executor = stack.executor();
    let policy = QueryPolicy::default().with_retry(RetryPolicy::new(3, 10, 50));

    let result = executor
        .execute("products/list", "products", |p| resource.get::<Vec<u32>>(p), &policy)
        .await
        .unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(result.data, Some(vec![1, 2, 3]));
    assert_eq!(result.meta.unwrap()["status"], json!(200));
}

#[tokio::test]
async fn http_status_is_classified_at_the_boundary() {
    for (status, kind) in [
        (401, ErrorKind::Auth),
        (404, ErrorKind::NotFound),
        (400, ErrorKind::Validation),
        (500, ErrorKind::Server),
    ] {
        let addr = common::start_programmable_backend(move || async move {
            (status, r#"{"message":"nope"}"#.to_string())
        })
        .await;
        let resource = HttpResource::new(&format!("http://{addr}")).unwrap();

        let err = resource.get::<Value>("/thing").await.unwrap_err();
        assert_eq!(err.kind, kind);
        assert_eq!(err.status, Some(status));
        assert_eq!(err.message, "nope");
    }
}

#[tokio::test]
async fn simplified_gate_blocks_offline_and_records_outcomes() {
    let stack = Stack::offline("checkout");
    let gate = SimplifiedApiGate::with_clock(
        "checkout",
        Arc::new(stack.network.clone()),
        stack.clock.clone(),
    );

    let err = gate
        .call(async { Ok::<_, ApiError>(1) })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "OFFLINE_ERROR");

    stack.network.go_online();
    let value = gate.call(async { Ok::<_, ApiError>(7) }).await.unwrap();
    assert_eq!(value, 7);
    assert_eq!(gate.metadata().last_success_at, Some(common::START_MILLIS));

    let err = gate
        .call(async { Err::<u32, _>(ApiError::server("boom")) })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(gate.metadata().recent_failures, 1);
    assert!(gate.should_use_api());

    gate.disable();
    assert!(!gate.should_use_api());
}
