//! Relay loop behaviour against the in-memory doubles.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relay_engine::testing::{
    ChannelConsumer, CommitLog, RecordingProducer, RecordingSink, ScriptedConsumer,
};
use relay_engine::Relay;
use relay_types::{CancellationToken, Consumer, Error, Message};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(3);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_engine=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn test_forwards_and_commits_then_stops_on_cancel() {
    init_tracing();

    let commits = CommitLog::new();
    let (tx, consumer) = ChannelConsumer::new(1);
    tx.send(commits.tracked("k1", "v1")).await.unwrap();

    let producer = RecordingProducer::new();
    let writes = producer.log();
    let mut relay = Relay::new(consumer, producer, None);

    let cancel = CancellationToken::new();
    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let result = relay.run(&cancel).await;
            (relay, result)
        })
    };

    timeout(WAIT, writes.wait_for(1)).await.unwrap();
    timeout(WAIT, commits.wait_for(1)).await.unwrap();
    cancel.cancel();

    let (relay, result) = timeout(WAIT, handle)
        .await
        .expect("relay did not return after cancel")
        .unwrap();
    result.unwrap();

    let records = writes.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key, b"k1");
    assert_eq!(records[0].value.as_deref(), Some(&b"v1"[..]));
    assert!(records[0].timestamp.is_some());
    assert_eq!(commits.keys(), vec!["k1".to_string()]);

    // The relay hands its resources back unclosed.
    let (consumer, producer) = relay.into_parts();
    assert!(!consumer.is_closed());
    assert!(!producer.is_closed());
    drop(tx);
}

#[tokio::test]
async fn test_write_failure_skips_commit_and_continues() {
    init_tracing();

    let commits = CommitLog::new();
    let (tx, consumer) = ChannelConsumer::new(2);
    tx.send(commits.tracked("k1", "v1")).await.unwrap();
    tx.send(commits.tracked("k2", "v2")).await.unwrap();

    let producer = RecordingProducer::failing_on([1]);
    let writes = producer.log();
    let sink = Arc::new(RecordingSink::new());
    let mut relay = Relay::new(consumer, producer, Some(sink.clone()));

    let cancel = CancellationToken::new();
    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { relay.run(&cancel).await })
    };

    timeout(WAIT, writes.wait_for(2)).await.unwrap();
    timeout(WAIT, commits.wait_for(1)).await.unwrap();
    cancel.cancel();
    timeout(WAIT, handle).await.unwrap().unwrap().unwrap();

    assert_eq!(writes.len(), 2);
    assert_eq!(writes.calls(), 2);
    assert_eq!(writes.keys(), vec!["k1".to_string(), "k2".to_string()]);
    assert_eq!(commits.keys(), vec!["k2".to_string()]);

    let failures: Vec<_> = sink
        .events()
        .into_iter()
        .filter(|e| e.name == "write failed")
        .collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0]
        .error
        .as_deref()
        .unwrap()
        .contains("injected failure on write call 1"));
}

#[tokio::test]
async fn test_commits_every_message_in_fetch_order() {
    const N: usize = 25;

    let commits = CommitLog::new();
    let (tx, consumer) = ChannelConsumer::new(N);
    let expected: Vec<String> = (0..N).map(|i| format!("key-{i:03}")).collect();
    for key in &expected {
        tx.send(commits.tracked(key, "payload")).await.unwrap();
    }

    let producer = RecordingProducer::new();
    let writes = producer.log();
    let mut relay = Relay::new(consumer, producer, Some(Arc::new(RecordingSink::new())));

    let cancel = CancellationToken::new();
    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { relay.run(&cancel).await })
    };

    timeout(WAIT, commits.wait_for(N)).await.unwrap();
    cancel.cancel();
    timeout(WAIT, handle).await.unwrap().unwrap().unwrap();

    assert_eq!(writes.keys(), expected);
    assert_eq!(commits.keys(), expected);
}

#[tokio::test]
async fn test_failed_writes_are_never_committed() {
    const N: usize = 10;
    const FAILING_CALL: usize = 4;

    let commits = CommitLog::new();
    let (tx, consumer) = ChannelConsumer::new(N);
    for i in 1..=N {
        tx.send(commits.tracked(&format!("k{i}"), "v")).await.unwrap();
    }

    let producer = RecordingProducer::failing_on([FAILING_CALL]);
    let writes = producer.log();
    let mut relay = Relay::new(consumer, producer, Some(Arc::new(RecordingSink::new())));

    let cancel = CancellationToken::new();
    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { relay.run(&cancel).await })
    };

    timeout(WAIT, writes.wait_for(N)).await.unwrap();
    timeout(WAIT, commits.wait_for(N - 1)).await.unwrap();
    cancel.cancel();
    timeout(WAIT, handle).await.unwrap().unwrap().unwrap();

    let committed = commits.keys();
    assert_eq!(committed.len(), N - 1);
    assert!(!committed.contains(&format!("k{FAILING_CALL}")));
}

#[tokio::test]
async fn test_cancel_unblocks_pending_fetch_without_write() {
    let (tx, consumer) = ChannelConsumer::new(1);
    let producer = RecordingProducer::new();
    let writes = producer.log();
    let sink = Arc::new(RecordingSink::new());
    let mut relay = Relay::new(consumer, producer, Some(sink.clone()));

    let cancel = CancellationToken::new();
    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let result = relay.run(&cancel).await;
            (relay, result)
        })
    };

    // Let the relay park inside fetch.
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let (relay, result) = timeout(WAIT, handle).await.unwrap().unwrap();
    result.unwrap();

    assert!(writes.is_empty());
    assert_eq!(relay.consumer().fetch_calls(), 1);
    assert_eq!(sink.names(), vec!["loop stopped"]);
    drop(tx);
}

#[tokio::test]
async fn test_repeated_cancel_is_noop() {
    let (_tx, consumer) = ChannelConsumer::new(1);
    let mut relay = Relay::new(consumer, RecordingProducer::new(), None);

    let cancel = CancellationToken::new();
    cancel.cancel();
    cancel.cancel();

    timeout(WAIT, relay.run(&cancel)).await.unwrap().unwrap();
    assert!(cancel.is_cancelled());
}

/// Raises the token itself, then fails with an ordinary error, the way a
/// broker client torn down mid-fetch would.
struct CancellingConsumer {
    cancel: CancellationToken,
    fetch_calls: usize,
}

#[async_trait]
impl Consumer for CancellingConsumer {
    async fn fetch(&mut self, _cancel: &CancellationToken) -> relay_types::Result<Message> {
        self.fetch_calls += 1;
        self.cancel.cancel();
        Err(Error::Consumer("connection reset".to_string()))
    }

    async fn close(&mut self) -> relay_types::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_fetch_error_after_cancel_is_treated_as_stop() {
    let cancel = CancellationToken::new();
    let consumer = CancellingConsumer {
        cancel: cancel.clone(),
        fetch_calls: 0,
    };
    let producer = RecordingProducer::new();
    let writes = producer.log();
    let sink = Arc::new(RecordingSink::new());
    let mut relay = Relay::new(consumer, producer, Some(sink.clone()));

    timeout(WAIT, relay.run(&cancel)).await.unwrap().unwrap();

    assert_eq!(relay.consumer().fetch_calls, 1);
    assert!(writes.is_empty());
    assert_eq!(sink.names(), vec!["loop stopped"]);
}

#[tokio::test]
async fn test_transient_fetch_errors_do_not_stop_loop() {
    let commits = CommitLog::new();
    let consumer = ScriptedConsumer::new(vec![
        Err(Error::Consumer("broker transport failure".to_string())),
        Ok(commits.tracked("k1", "v1")),
    ]);
    let sink = Arc::new(RecordingSink::new());
    let mut relay = Relay::new(consumer, RecordingProducer::new(), Some(sink.clone()));

    let cancel = CancellationToken::new();
    let run = relay.run(&cancel);
    let wait = async {
        timeout(WAIT, commits.wait_for(1)).await.unwrap();
        cancel.cancel();
    };
    let (result, ()) = tokio::join!(run, wait);
    result.unwrap();

    let events = sink.events();
    assert_eq!(events[0].name, "fetch failed");
    assert_eq!(
        events[0].error.as_deref(),
        Some("Consumer error: broker transport failure")
    );
    assert_eq!(commits.keys(), vec!["k1".to_string()]);
}

#[tokio::test]
async fn test_run_again_with_fresh_pair() {
    for round in 0..2 {
        let commits = CommitLog::new();
        let (tx, consumer) = ChannelConsumer::new(1);
        tx.send(commits.tracked(&format!("round-{round}"), "v"))
            .await
            .unwrap();

        let mut relay = Relay::new(consumer, RecordingProducer::new(), None);
        let cancel = CancellationToken::new();
        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { relay.run(&cancel).await })
        };

        timeout(WAIT, commits.wait_for(1)).await.unwrap();
        cancel.cancel();
        timeout(WAIT, handle).await.unwrap().unwrap().unwrap();
        assert_eq!(commits.keys(), vec![format!("round-{round}")]);
    }
}

#[tokio::test]
async fn test_same_relay_runs_twice() {
    let commits = CommitLog::new();
    let (tx, consumer) = ChannelConsumer::new(2);
    let mut relay = Relay::new(consumer, RecordingProducer::new(), None);

    for key in ["first", "second"] {
        tx.send(commits.tracked(key, "v")).await.unwrap();
        let count = commits.keys().len() + 1;

        let cancel = CancellationToken::new();
        let run = relay.run(&cancel);
        let wait = async {
            timeout(WAIT, commits.wait_for(count)).await.unwrap();
            cancel.cancel();
        };
        let (result, ()) = tokio::join!(run, wait);
        result.unwrap();
    }

    assert_eq!(
        commits.keys(),
        vec!["first".to_string(), "second".to_string()]
    );
}

#[tokio::test]
async fn test_timestamp_is_preserved() {
    let stamp = chrono_stamp();
    let (tx, consumer) = ChannelConsumer::new(1);
    tx.send(Message::new("k", "v").with_timestamp(stamp))
        .await
        .unwrap();

    let producer = RecordingProducer::new();
    let writes = producer.log();
    let mut relay = Relay::new(consumer, producer, None);

    let cancel = CancellationToken::new();
    let run = relay.run(&cancel);
    let wait = async {
        timeout(WAIT, writes.wait_for(1)).await.unwrap();
        cancel.cancel();
    };
    let (result, ()) = tokio::join!(run, wait);
    result.unwrap();

    assert_eq!(writes.records()[0].timestamp, Some(stamp));
}

#[tokio::test]
async fn test_tombstone_is_forwarded_as_null() {
    let (tx, consumer) = ChannelConsumer::new(2);
    tx.send(Message::tombstone("deleted")).await.unwrap();
    tx.send(Message::new("empty", Vec::<u8>::new())).await.unwrap();

    let producer = RecordingProducer::new();
    let writes = producer.log();
    let mut relay = Relay::new(consumer, producer, None);

    let cancel = CancellationToken::new();
    let run = relay.run(&cancel);
    let wait = async {
        timeout(WAIT, writes.wait_for(2)).await.unwrap();
        cancel.cancel();
    };
    let (result, ()) = tokio::join!(run, wait);
    result.unwrap();

    let records = writes.records();
    assert_eq!(records[0].value, None);
    assert_eq!(records[1].value, Some(Vec::new()));
}

fn chrono_stamp() -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp(1_700_000_000, 123_000_000).unwrap()
}

#[test]
fn test_idle_run_stays_pending_until_cancel() {
    let (_tx, consumer) = ChannelConsumer::new(1);
    let mut relay = Relay::new(consumer, RecordingProducer::new(), None);
    let cancel = CancellationToken::new();

    let mut run = tokio_test::task::spawn(relay.run(&cancel));
    tokio_test::assert_pending!(run.poll());
    tokio_test::assert_pending!(run.poll());

    cancel.cancel();
    assert!(run.is_woken());
    tokio_test::assert_ready_ok!(run.poll());
}
