//! # Redis Pub/Sub Transport
//!
//! Team telemetry and the referee record travel over Redis pub/sub channels
//! named after the topics. Publishing goes through a multiplexed connection;
//! subscribing uses a dedicated pub/sub connection whose message stream ends
//! when the server goes away.

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use redis::{AsyncCommands, Client};

use crate::connections::{InboundMessage, TopicPublisher, TopicSubscriber, Transport};
use crate::error::TransportError;

pub struct RedisTransport {
    client: Client,
}

impl RedisTransport {
    /// Validates the URL; no connection is made until `connect`.
    ///
    /// # Arguments
    /// * `url` - The redis URL (e.g., "redis://127.0.0.1/").
    pub fn open(url: &str) -> Result<Self, TransportError> {
        let client = Client::open(url).map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Self { client })
    }
}

pub struct RedisPublisher {
    conn: redis::aio::MultiplexedConnection,
}

pub struct RedisSubscriber {
    pubsub: Option<redis::aio::PubSub>,
    messages: Option<BoxStream<'static, redis::Msg>>,
}

impl Transport for RedisTransport {
    type Publisher = RedisPublisher;
    type Subscriber = RedisSubscriber;

    async fn connect(&self) -> Result<(RedisPublisher, RedisSubscriber), TransportError> {
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok((
            RedisPublisher { conn },
            RedisSubscriber {
                pubsub: Some(pubsub),
                messages: None,
            },
        ))
    }
}

impl TopicPublisher for RedisPublisher {
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let _receivers: i64 = self
            .conn
            .publish(topic, payload)
            .await
            .map_err(|e| TransportError::Publish(e.to_string()))?;
        Ok(())
    }
}

impl TopicSubscriber for RedisSubscriber {
    async fn subscribe(&mut self, topics: &[String]) -> Result<(), TransportError> {
        let mut pubsub = self
            .pubsub
            .take()
            .ok_or_else(|| TransportError::Subscribe("pub/sub connection already consumed".to_string()))?;
        pubsub
            .subscribe(topics.to_vec())
            .await
            .map_err(|e| TransportError::Subscribe(e.to_string()))?;
        self.messages = Some(pubsub.into_on_message().boxed());
        Ok(())
    }

    async fn next_message(&mut self) -> Result<InboundMessage, TransportError> {
        let messages = self
            .messages
            .as_mut()
            .ok_or_else(|| TransportError::Subscribe("not subscribed".to_string()))?;
        match messages.next().await {
            Some(msg) => Ok(InboundMessage {
                topic: msg.get_channel_name().to_string(),
                payload: msg.get_payload_bytes().to_vec(),
            }),
            None => Err(TransportError::Closed("redis pub/sub stream ended".to_string())),
        }
    }
}
