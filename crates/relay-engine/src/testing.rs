//! In-memory Consumer/Producer doubles and recorders.
//!
//! These let the relay loop be exercised without a broker. Every recorder is
//! a cheap clonable handle, so a test can keep one while the relay owning the
//! double runs in a spawned task.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use relay_types::{Consumer, Error, Message, Producer, Result};
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

use crate::sink::{DiagnosticSink, RelayEvent};

/// Append-only list with a wakeup for waiters.
struct Shared<T> {
    items: Mutex<Vec<T>>,
    notify: Notify,
}

impl<T: Clone> Shared<T> {
    fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            notify: Notify::new(),
        }
    }

    fn push(&self, item: T) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item);
        self.notify.notify_waiters();
    }

    fn snapshot(&self) -> Vec<T> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn wait_until(&self, done: impl Fn(&[T]) -> bool) {
        loop {
            // Registered before the check so a push in between is not missed.
            let notified = self.notify.notified();
            if done(&self.snapshot()) {
                return;
            }
            notified.await;
        }
    }
}

/// Wait for a cancellation that has not happened yet.
async fn park_until_cancelled(cancel: &CancellationToken) -> Result<Message> {
    cancel.cancelled().await;
    Err(Error::Cancelled)
}

/// Consumer fed through a tokio channel.
///
/// Blocks while the channel is empty (or closed) until cancellation.
pub struct ChannelConsumer {
    rx: mpsc::Receiver<Message>,
    fetch_calls: usize,
    closed: bool,
}

impl ChannelConsumer {
    pub fn new(capacity: usize) -> (mpsc::Sender<Message>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            tx,
            Self {
                rx,
                fetch_calls: 0,
                closed: false,
            },
        )
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl Consumer for ChannelConsumer {
    async fn fetch(&mut self, cancel: &CancellationToken) -> Result<Message> {
        if self.closed {
            return Err(Error::Closed);
        }
        self.fetch_calls += 1;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            received = self.rx.recv() => match received {
                Some(message) => Ok(message),
                None => park_until_cancelled(cancel).await,
            },
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        self.closed = true;
        self.rx.close();
        Ok(())
    }
}

/// Consumer replaying a fixed script of fetch results, then blocking.
pub struct ScriptedConsumer {
    script: VecDeque<Result<Message>>,
    fetch_calls: usize,
    closed: bool,
}

impl ScriptedConsumer {
    pub fn new(script: Vec<Result<Message>>) -> Self {
        Self {
            script: script.into(),
            fetch_calls: 0,
            closed: false,
        }
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl Consumer for ScriptedConsumer {
    async fn fetch(&mut self, cancel: &CancellationToken) -> Result<Message> {
        if self.closed {
            return Err(Error::Closed);
        }
        self.fetch_calls += 1;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match self.script.pop_front() {
            Some(result) => result,
            None => park_until_cancelled(cancel).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        self.closed = true;
        Ok(())
    }
}

/// A write attempt as seen by [`RecordingProducer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenRecord {
    /// 1-based number of the `write` call that carried this record
    pub call: usize,
    pub key: Vec<u8>,
    /// `None` when a tombstone was written
    pub value: Option<Vec<u8>>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Handle onto everything a [`RecordingProducer`] was asked to write.
#[derive(Clone)]
pub struct WriteLog {
    records: Arc<Shared<WrittenRecord>>,
}

impl WriteLog {
    fn new() -> Self {
        Self {
            records: Arc::new(Shared::new()),
        }
    }

    /// All attempted records, including those whose write failed.
    pub fn records(&self) -> Vec<WrittenRecord> {
        self.records.snapshot()
    }

    pub fn len(&self) -> usize {
        self.records.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attempted keys, lossily decoded.
    pub fn keys(&self) -> Vec<String> {
        self.records()
            .iter()
            .map(|r| String::from_utf8_lossy(&r.key).into_owned())
            .collect()
    }

    /// Number of `write` calls seen so far.
    pub fn calls(&self) -> usize {
        self.records().iter().map(|r| r.call).max().unwrap_or(0)
    }

    /// Wait until at least `count` records were attempted.
    pub async fn wait_for(&self, count: usize) {
        self.records.wait_until(|records| records.len() >= count).await;
    }
}

/// Producer recording every attempted record.
///
/// Attempts are recorded before the configured outcome is decided, so a
/// failed write still shows up in the log.
pub struct RecordingProducer {
    log: WriteLog,
    fail_on_calls: Vec<usize>,
    calls: usize,
    closed: bool,
}

impl RecordingProducer {
    /// A producer whose writes always succeed.
    pub fn new() -> Self {
        Self {
            log: WriteLog::new(),
            fail_on_calls: Vec::new(),
            calls: 0,
            closed: false,
        }
    }

    /// Fail the given 1-based `write` calls.
    pub fn failing_on(calls: impl IntoIterator<Item = usize>) -> Self {
        Self {
            fail_on_calls: calls.into_iter().collect(),
            ..Self::new()
        }
    }

    pub fn log(&self) -> WriteLog {
        self.log.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Default for RecordingProducer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Producer for RecordingProducer {
    async fn write(&mut self, cancel: &CancellationToken, messages: &[Message]) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.calls += 1;

        for message in messages {
            self.log.records.push(WrittenRecord {
                call: self.calls,
                key: message.key.clone(),
                value: message.value.clone(),
                timestamp: message.timestamp,
            });
        }

        if self.fail_on_calls.contains(&self.calls) {
            return Err(Error::Producer(format!(
                "injected failure on write call {}",
                self.calls
            )));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        self.closed = true;
        Ok(())
    }
}

/// Records which messages had their commit action invoked.
#[derive(Clone)]
pub struct CommitLog {
    keys: Arc<Shared<String>>,
}

impl CommitLog {
    pub fn new() -> Self {
        Self {
            keys: Arc::new(Shared::new()),
        }
    }

    /// A message whose commit action records its key here.
    pub fn tracked(&self, key: &str, value: &str) -> Message {
        let keys = Arc::clone(&self.keys);
        let committed = key.to_string();
        Message::new(key, value)
            .with_timestamp(Utc::now())
            .with_commit(move || {
                async move {
                    keys.push(committed);
                    Ok::<(), Error>(())
                }
                .boxed()
            })
    }

    /// A message whose commit action always fails (and records nothing).
    pub fn failing(&self, key: &str, value: &str) -> Message {
        let key_owned = key.to_string();
        Message::new(key, value)
            .with_timestamp(Utc::now())
            .with_commit(move || {
                async move {
                    Err::<(), _>(Error::Commit(format!(
                        "injected commit failure for {key_owned}"
                    )))
                }
                .boxed()
            })
    }

    /// Keys in the order their commits ran.
    pub fn keys(&self) -> Vec<String> {
        self.keys.snapshot()
    }

    pub async fn wait_for(&self, count: usize) {
        self.keys.wait_until(|keys| keys.len() >= count).await;
    }
}

impl Default for CommitLog {
    fn default() -> Self {
        Self::new()
    }
}

/// An event captured by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub name: &'static str,
    pub error: Option<String>,
}

/// Sink keeping every event in memory.
pub struct RecordingSink {
    events: Shared<RecordedEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            events: Shared::new(),
        }
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.snapshot()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(|e| e.name).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events().iter().filter(|e| e.name == name).count()
    }

    pub async fn wait_for(&self, name: &str, count: usize) {
        self.events
            .wait_until(|events| events.iter().filter(|e| e.name == name).count() >= count)
            .await;
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticSink for RecordingSink {
    fn record(&self, event: &RelayEvent<'_>) {
        self.events.push(RecordedEvent {
            name: event.name(),
            error: event.error().map(|e| e.to_string()),
        });
    }
}
