//! # Loopback Bus
//!
//! An in-process broker built on a tokio broadcast channel. It backs the
//! server's offline mode and the end-to-end tests, and can be told to fail
//! upcoming connects, subscribes, deliveries or publishes to exercise the
//! relay's recovery path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::connections::{InboundMessage, TopicPublisher, TopicSubscriber, Transport};
use crate::error::TransportError;

#[derive(Debug, Default)]
struct Faults {
    connects: usize,
    subscribes: usize,
    deliveries: usize,
    publishes: usize,
}

struct LocalBusInner {
    tx: broadcast::Sender<InboundMessage>,
    faults: Mutex<Faults>,
    connects: AtomicUsize,
}

/// Cheap-to-clone handle onto one in-process broker.
#[derive(Clone)]
pub struct LocalBus {
    inner: Arc<LocalBusInner>,
}

impl LocalBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(LocalBusInner {
                tx,
                faults: Mutex::new(Faults::default()),
                connects: AtomicUsize::new(0),
            }),
        }
    }

    /// Publishes as an outside client would (a team device, a test).
    pub fn publish(&self, topic: &str, payload: impl Into<Vec<u8>>) {
        // No receivers simply means nobody is listening.
        let _ = self.inner.tx.send(InboundMessage {
            topic: topic.to_string(),
            payload: payload.into(),
        });
    }

    /// Raw tap on every message crossing the bus, as a display device sees it.
    pub fn tap(&self) -> broadcast::Receiver<InboundMessage> {
        self.inner.tx.subscribe()
    }

    /// Makes the next `n` connection attempts fail.
    pub fn fail_next_connects(&self, n: usize) {
        self.faults().connects = n;
    }

    /// Makes the next `n` subscribe requests fail.
    pub fn fail_next_subscribes(&self, n: usize) {
        self.faults().subscribes = n;
    }

    /// The next `n` messages a subscriber would receive end its stream
    /// instead, as a dropped broker connection would.
    pub fn fail_next_deliveries(&self, n: usize) {
        self.faults().deliveries = n;
    }

    /// Makes the next `n` publishes through a connection fail.
    pub fn fail_next_publishes(&self, n: usize) {
        self.faults().publishes = n;
    }

    /// Successful connections handed out so far.
    pub fn connect_count(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.inner.faults.lock().expect("LocalBus fault lock poisoned")
    }

    fn take_fault(&self, pick: impl FnOnce(&mut Faults) -> &mut usize) -> bool {
        let mut faults = self.faults();
        let pending = pick(&mut *faults);
        if *pending > 0 {
            *pending -= 1;
            true
        } else {
            false
        }
    }
}

pub struct LocalPublisher {
    bus: LocalBus,
}

pub struct LocalSubscriber {
    bus: LocalBus,
    rx: Option<broadcast::Receiver<InboundMessage>>,
    topics: Vec<String>,
}

impl Transport for LocalBus {
    type Publisher = LocalPublisher;
    type Subscriber = LocalSubscriber;

    async fn connect(&self) -> Result<(LocalPublisher, LocalSubscriber), TransportError> {
        if self.take_fault(|f| &mut f.connects) {
            return Err(TransportError::Connect("injected connect failure".to_string()));
        }
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        Ok((
            LocalPublisher { bus: self.clone() },
            LocalSubscriber {
                bus: self.clone(),
                rx: None,
                topics: Vec::new(),
            },
        ))
    }
}

impl TopicPublisher for LocalPublisher {
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        if self.bus.take_fault(|f| &mut f.publishes) {
            return Err(TransportError::Publish("injected publish failure".to_string()));
        }
        self.bus.publish(topic, payload);
        Ok(())
    }
}

impl TopicSubscriber for LocalSubscriber {
    async fn subscribe(&mut self, topics: &[String]) -> Result<(), TransportError> {
        if self.bus.take_fault(|f| &mut f.subscribes) {
            return Err(TransportError::Subscribe("injected subscribe failure".to_string()));
        }
        self.topics = topics.to_vec();
        self.rx = Some(self.bus.tap());
        Ok(())
    }

    async fn next_message(&mut self) -> Result<InboundMessage, TransportError> {
        let rx = self
            .rx
            .as_mut()
            .ok_or_else(|| TransportError::Subscribe("not subscribed".to_string()))?;
        loop {
            match rx.recv().await {
                Ok(msg) if self.topics.contains(&msg.topic) => {
                    if self.bus.take_fault(|f| &mut f.deliveries) {
                        return Err(TransportError::Closed("injected stream loss".to_string()));
                    }
                    return Ok(msg);
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Loopback subscriber lagged, {} messages skipped.", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(TransportError::Closed("loopback bus closed".to_string()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_only_sees_its_topics() {
        let bus = LocalBus::new(16);
        let (_publisher, mut subscriber) = bus.connect().await.unwrap();
        subscriber.subscribe(&["/red".to_string()]).await.unwrap();

        bus.publish("/blue", "b");
        bus.publish("/red", "r");
        let msg = subscriber.next_message().await.unwrap();
        assert_eq!(msg.topic, "/red");
        assert_eq!(msg.payload, b"r".to_vec());
    }

    #[tokio::test]
    async fn test_injected_faults_are_consumed() {
        let bus = LocalBus::new(16);
        bus.fail_next_connects(1);
        assert!(bus.connect().await.is_err());
        let (mut publisher, _subscriber) = bus.connect().await.unwrap();
        assert_eq!(bus.connect_count(), 1);

        bus.fail_next_publishes(1);
        assert!(publisher.publish("/referee", b"{}".to_vec()).await.is_err());
        assert!(publisher.publish("/referee", b"{}".to_vec()).await.is_ok());
    }

    #[tokio::test]
    async fn test_injected_subscribe_and_delivery_faults() {
        let bus = LocalBus::new(16);
        let topics = ["/blue".to_string()];
        let (_publisher, mut subscriber) = bus.connect().await.unwrap();

        bus.fail_next_subscribes(1);
        assert!(matches!(subscriber.subscribe(&topics).await, Err(TransportError::Subscribe(_))));
        subscriber.subscribe(&topics).await.unwrap();

        bus.fail_next_deliveries(1);
        bus.publish("/blue", "lost");
        bus.publish("/blue", "kept");
        assert!(matches!(subscriber.next_message().await, Err(TransportError::Closed(_))));
        assert_eq!(subscriber.next_message().await.unwrap().payload, b"kept".to_vec());
    }
}
