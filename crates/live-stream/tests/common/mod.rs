//! Shared test transport: an in-memory factory whose clients can be told to
//! fail, fed messages, or closed from the test body.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};

use live_core::{
    AppConfig, BsmFeature, IntersectionId, IntersectionRef, LiveEvent, MessageKind,
    SubscriptionKey, Topic, VehicleId,
};
use live_stream::{LiveIntersectionManager, SubscriptionStatus};
use live_transport::{
    ConnectionClient, ConnectionFactory, Credentials, TransportError, TransportEvent,
    TransportResult,
};

#[derive(Default)]
struct MockState {
    attempts: HashMap<SubscriptionKey, usize>,
    connects: HashMap<SubscriptionKey, usize>,
    failing: HashSet<SubscriptionKey>,
    rejecting: HashSet<SubscriptionKey>,
    stalled: HashSet<SubscriptionKey>,
    senders: HashMap<SubscriptionKey, mpsc::Sender<TransportEvent>>,
}

/// In-memory connection factory.
#[derive(Clone, Default)]
pub struct MockFactory {
    state: Arc<Mutex<MockState>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future connect for `key` fail.
    pub fn fail(&self, key: SubscriptionKey) {
        self.state.lock().unwrap().failing.insert(key);
    }

    /// Make every future connect for `key` end in a server ERROR frame.
    pub fn reject(&self, key: SubscriptionKey) {
        self.state.lock().unwrap().rejecting.insert(key);
    }

    /// Make every future connect for `key` hang until the connect timeout.
    pub fn stall(&self, key: SubscriptionKey) {
        self.state.lock().unwrap().stalled.insert(key);
    }

    pub fn heal(&self, key: SubscriptionKey) {
        let mut state = self.state.lock().unwrap();
        state.failing.remove(&key);
        state.rejecting.remove(&key);
        state.stalled.remove(&key);
    }

    /// Connect calls so far for `key`, successful or not.
    pub fn attempts(&self, key: SubscriptionKey) -> usize {
        self.state
            .lock()
            .unwrap()
            .attempts
            .get(&key)
            .copied()
            .unwrap_or(0)
    }

    /// Successful connects so far for `key`.
    pub fn connects(&self, key: SubscriptionKey) -> usize {
        self.state
            .lock()
            .unwrap()
            .connects
            .get(&key)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_connects(&self) -> usize {
        self.state.lock().unwrap().connects.values().sum()
    }

    /// Sender of the most recent subscription for `key`.
    pub fn sender(&self, key: SubscriptionKey) -> Option<mpsc::Sender<TransportEvent>> {
        self.state.lock().unwrap().senders.get(&key).cloned()
    }

    /// Push a raw body to the current subscription for `key`.
    pub async fn push(&self, key: SubscriptionKey, body: impl Into<String>) -> bool {
        match self.sender(key) {
            Some(sender) => sender
                .send(TransportEvent::Message(body.into()))
                .await
                .is_ok(),
            None => false,
        }
    }

    /// Simulate the transport dropping the subscription for `key`.
    pub async fn drop_stream(&self, key: SubscriptionKey) {
        if let Some(sender) = self.sender(key) {
            let _ = sender
                .send(TransportEvent::Closed("connection reset".to_string()))
                .await;
        }
    }
}

impl ConnectionFactory for MockFactory {
    fn create(
        &self,
        intersection: &IntersectionRef,
        kind: MessageKind,
    ) -> TransportResult<Box<dyn ConnectionClient>> {
        Ok(Box::new(MockClient {
            name: format!("mock-{}-{}", intersection.intersection_id, kind),
            key: SubscriptionKey::new(intersection.intersection_id, kind),
            connected: false,
            state: self.state.clone(),
        }))
    }

    fn stream_root(&self) -> &str {
        "live"
    }

    fn connect_timeout(&self) -> Duration {
        Duration::from_secs(1)
    }
}

struct MockClient {
    name: String,
    key: SubscriptionKey,
    connected: bool,
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl ConnectionClient for MockClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self, _credentials: &Credentials) -> TransportResult<()> {
        let stalled = self.state.lock().unwrap().stalled.contains(&self.key);
        if stalled {
            std::future::pending::<()>().await;
        }

        let mut state = self.state.lock().unwrap();
        *state.attempts.entry(self.key).or_default() += 1;
        if state.rejecting.contains(&self.key) {
            return Err(TransportError::Protocol(format!(
                "{} ERROR frame",
                self.key
            )));
        }
        if state.failing.contains(&self.key) {
            return Err(TransportError::Connection(format!(
                "{} refused",
                self.key
            )));
        }
        *state.connects.entry(self.key).or_default() += 1;
        self.connected = true;
        Ok(())
    }

    async fn subscribe(&mut self, topic: &Topic) -> TransportResult<mpsc::Receiver<TransportEvent>> {
        if !self.connected {
            return Err(TransportError::Subscription(format!(
                "{} not connected",
                topic
            )));
        }
        let (tx, rx) = mpsc::channel(64);
        self.state.lock().unwrap().senders.insert(self.key, tx);
        Ok(rx)
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        self.connected = false;
        Ok(())
    }
}

/// Config with the publisher off and a short reconnect policy.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.publisher.autostart = false;
    config.reconnect.max_attempts = 2;
    config.reconnect.initial_delay_ms = 100;
    config.reconnect.max_delay_ms = 400;
    config
}

pub async fn manager_with(
    factory: &MockFactory,
    directory: Vec<IntersectionRef>,
) -> LiveIntersectionManager {
    let manager = LiveIntersectionManager::create(&test_config(), Arc::new(factory.clone())).await;
    manager.update_directory(directory).await;
    manager
}

pub fn key(id: i32, kind: MessageKind) -> SubscriptionKey {
    SubscriptionKey::new(IntersectionId(id), kind)
}

pub fn bsm_body(vehicle: &str, speed: f64, at: DateTime<Utc>) -> String {
    let feature = BsmFeature::new(VehicleId::new(vehicle), -104.886, 39.594, speed, 90.0, at);
    serde_json::to_string(&feature).unwrap()
}

/// Wait for the next raw event, failing the test after a second.
pub async fn next_event(rx: &mut broadcast::Receiver<Arc<LiveEvent>>) -> Arc<LiveEvent> {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("no event within 1s")
        .expect("event channel closed")
}

/// Poll the registry until `key` reaches `expected`.
pub async fn wait_for_status(
    manager: &LiveIntersectionManager,
    key: SubscriptionKey,
    expected: SubscriptionStatus,
) {
    for _ in 0..200 {
        if manager.registry().status(key).await == Some(expected) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "{} never reached {:?} (last: {:?})",
        key,
        expected,
        manager.registry().status(key).await
    );
}
