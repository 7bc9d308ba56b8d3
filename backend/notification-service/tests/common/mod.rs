#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix_web::web::Bytes;
use async_trait::async_trait;
use notification_service::error::{AppError, Result};
use notification_service::stream::{FrameSink, StreamHub, StreamSettings, SubscriptionRegistry};
use notification_service::{Dispatcher, MemoryNotificationStore, NotificationStore};
use tokio::sync::watch;
use uuid::Uuid;

/// Recording sink with injectable failures
pub struct TestSink {
    frames: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    failing: AtomicBool,
    released: AtomicBool,
    hold: tokio::sync::Mutex<()>,
    disconnected: watch::Sender<bool>,
}

impl TestSink {
    pub fn new() -> Arc<Self> {
        let (disconnected, _) = watch::channel(false);
        Arc::new(Self {
            frames: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            released: AtomicBool::new(false),
            hold: tokio::sync::Mutex::new(()),
            disconnected,
        })
    }

    /// A sink whose very first write already fails
    pub fn failing() -> Arc<Self> {
        let sink = Self::new();
        sink.fail_writes();
        sink
    }

    pub fn fail_writes(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Simulate the client going away
    pub fn disconnect(&self) {
        self.disconnected.send_replace(true);
    }

    /// Block every write until the returned guard is dropped
    pub async fn hold_writes(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.hold.lock().await
    }

    /// Writes started, including ones still blocked or later failed
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Highest number of writes that were ever inside `send` at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }

    /// SSE ids of the notification frames received so far
    pub fn notification_ids(&self) -> Vec<i64> {
        self.frames()
            .iter()
            .filter(|f| f.contains("event: notification"))
            .filter_map(|f| f.lines().find_map(|l| l.strip_prefix("id: ")))
            .filter_map(|id| id.parse().ok())
            .collect()
    }

    /// JSON payloads of the notification frames received so far
    pub fn notification_payloads(&self) -> Vec<serde_json::Value> {
        self.frames()
            .iter()
            .filter(|f| f.contains("event: notification"))
            .filter_map(|f| f.lines().find_map(|l| l.strip_prefix("data: ")))
            .filter_map(|data| serde_json::from_str(data).ok())
            .collect()
    }
}

impl TestSink {
    async fn write(&self, frame: Bytes) -> Result<()> {
        let _held = self.hold.lock().await;

        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Transport("injected write failure".into()));
        }

        let text = String::from_utf8_lossy(&frame).into_owned();
        self.frames.lock().unwrap().push(text);
        Ok(())
    }
}

#[async_trait]
impl FrameSink for TestSink {
    async fn send(&self, frame: Bytes) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        // give an overlapping writer the chance to enter
        tokio::task::yield_now().await;

        let result = self.write(frame).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn closed(&self) {
        let mut rx = self.disconnected.subscribe();
        let _ = rx.wait_for(|gone| *gone).await;
    }

    async fn close(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub hub: StreamHub,
    pub store: Arc<MemoryNotificationStore>,
    pub dispatcher: Dispatcher,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(StreamSettings::default())
    }

    pub fn with_settings(settings: StreamSettings) -> Self {
        let hub = StreamHub::new(SubscriptionRegistry::new(), settings);
        let store = Arc::new(MemoryNotificationStore::new());
        let dispatcher = Dispatcher::new(
            store.clone() as Arc<dyn NotificationStore>,
            hub.clone(),
        );

        Self {
            hub,
            store,
            dispatcher,
        }
    }

    pub async fn user(&self, nickname: &str) -> Uuid {
        let user_id = Uuid::new_v4();
        self.store.insert_user(user_id, nickname).await;
        user_id
    }
}

/// Poll `condition` until it holds, yielding to background tasks in between
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached in time");
}
