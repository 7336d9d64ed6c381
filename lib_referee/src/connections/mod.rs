//! # Connections Module
//!
//! The pub/sub transport the referee talks through. The engine only needs
//! three things from it: connect, subscribe to the team topics and yield their
//! messages, and publish the match record. Those sit behind the traits below
//! so the relay loop is the same whether it runs over MQTT, Redis or
//! in-process.

use std::future::Future;

use crate::error::TransportError;

/// In-process loopback bus.
pub mod pubsub_local;
/// MQTT transport, QoS 1 both ways.
#[cfg(feature = "connections")]
pub mod pubsub_mqtt;
/// Redis pub/sub transport.
#[cfg(feature = "connections")]
pub mod pubsub_redis;

pub use pubsub_local::LocalBus;
#[cfg(feature = "connections")]
pub use pubsub_mqtt::MqttTransport;
#[cfg(feature = "connections")]
pub use pubsub_redis::RedisTransport;

/// A message delivered on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Something that can open a connection to the broker.
///
/// A connection is split into its publishing and subscribing halves so both
/// can be driven concurrently. Dropping both halves releases the connection.
pub trait Transport: Send + Sync {
    type Publisher: TopicPublisher;
    type Subscriber: TopicSubscriber;

    fn connect(
        &self,
    ) -> impl Future<Output = Result<(Self::Publisher, Self::Subscriber), TransportError>> + Send;
}

pub trait TopicPublisher: Send {
    fn publish(
        &mut self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

pub trait TopicSubscriber: Send {
    fn subscribe(&mut self, topics: &[String]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Waits for the next message on any subscribed topic. An error means the
    /// subscription is gone and the connection must be rebuilt.
    fn next_message(&mut self) -> impl Future<Output = Result<InboundMessage, TransportError>> + Send;
}
