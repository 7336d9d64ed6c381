//! # MQTT Transport
//!
//! Team devices and displays speak MQTT. Every session opens a fresh
//! clean-session client; subscriptions to the team topics and publishes of
//! the match record both use QoS 1 (at least once).
//!
//! `rumqttc` splits a client into a request handle and an event loop. The
//! handle goes to the publisher, the event loop to the subscriber: polling it
//! for inbound messages is also what flushes queued publishes and their
//! acknowledgements, so the relay always drives both halves together.

use std::collections::VecDeque;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeFilter, SubscribeReasonCode};
use url::Url;

use crate::connections::{InboundMessage, TopicPublisher, TopicSubscriber, Transport};
use crate::error::TransportError;

const DEFAULT_PORT: u16 = 1883;
const REQUEST_CAPACITY: usize = 64;
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct MqttTransport {
    host: String,
    port: u16,
    client_id: String,
    keep_alive: Duration,
}

impl MqttTransport {
    /// Parses `mqtt://host[:port]` (or `tcp://`). No connection is made
    /// until `connect`.
    pub fn open(url: &str, client_id: &str) -> Result<Self, TransportError> {
        let parsed = Url::parse(url).map_err(|e| TransportError::Connect(format!("{}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "mqtt" | "tcp") {
            return Err(TransportError::Connect(format!(
                "unsupported scheme '{}' in {}",
                parsed.scheme(),
                url
            )));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| TransportError::Connect(format!("no host in {}", url)))?
            .to_string();
        if client_id.is_empty() {
            return Err(TransportError::Connect("empty MQTT client id".to_string()));
        }
        Ok(Self {
            host,
            port: parsed.port().unwrap_or(DEFAULT_PORT),
            client_id: client_id.to_string(),
            keep_alive: Duration::from_secs(5),
        })
    }

    pub fn endpoint(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(self.client_id.clone(), self.host.clone(), self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        options
    }
}

pub struct MqttPublisher {
    client: AsyncClient,
}

pub struct MqttSubscriber {
    client: AsyncClient,
    events: EventLoop,
    // Messages that arrived while waiting for the subscription acknowledgement.
    pending: VecDeque<InboundMessage>,
}

impl MqttSubscriber {
    async fn poll(&mut self) -> Result<Packet, TransportError> {
        loop {
            match self.events.poll().await {
                Ok(Event::Incoming(packet)) => return Ok(packet),
                Ok(Event::Outgoing(_)) => continue,
                Err(e) => return Err(TransportError::Closed(e.to_string())),
            }
        }
    }
}

impl Transport for MqttTransport {
    type Publisher = MqttPublisher;
    type Subscriber = MqttSubscriber;

    async fn connect(&self) -> Result<(MqttPublisher, MqttSubscriber), TransportError> {
        let (client, mut events) = AsyncClient::new(self.options(), REQUEST_CAPACITY);

        let handshake = async {
            loop {
                match events.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
                    Ok(_) => continue,
                    Err(e) => return Err(TransportError::Connect(e.to_string())),
                }
            }
        };
        tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake)
            .await
            .map_err(|_| TransportError::Connect(format!("no CONNACK within {:?}", HANDSHAKE_TIMEOUT)))??;

        log::debug!("MQTT connected to {}:{} as {}.", self.host, self.port, self.client_id);
        Ok((
            MqttPublisher { client: client.clone() },
            MqttSubscriber {
                client,
                events,
                pending: VecDeque::new(),
            },
        ))
    }
}

impl TopicPublisher for MqttPublisher {
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| TransportError::Publish(e.to_string()))
    }
}

impl TopicSubscriber for MqttSubscriber {
    async fn subscribe(&mut self, topics: &[String]) -> Result<(), TransportError> {
        let filters: Vec<SubscribeFilter> = topics
            .iter()
            .map(|topic| SubscribeFilter::new(topic.clone(), QoS::AtLeastOnce))
            .collect();
        self.client
            .subscribe_many(filters)
            .await
            .map_err(|e| TransportError::Subscribe(e.to_string()))?;

        loop {
            match self.poll().await.map_err(|e| TransportError::Subscribe(e.to_string()))? {
                Packet::SubAck(ack) => {
                    if ack.return_codes.iter().any(|code| matches!(code, SubscribeReasonCode::Failure)) {
                        return Err(TransportError::Subscribe(format!("broker refused {:?}", topics)));
                    }
                    return Ok(());
                }
                Packet::Publish(publish) => self.pending.push_back(InboundMessage {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                }),
                _ => {}
            }
        }
    }

    async fn next_message(&mut self) -> Result<InboundMessage, TransportError> {
        if let Some(msg) = self.pending.pop_front() {
            return Ok(msg);
        }
        loop {
            match self.poll().await? {
                Packet::Publish(publish) => {
                    return Ok(InboundMessage {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    });
                }
                Packet::Disconnect => {
                    return Err(TransportError::Closed("broker sent DISCONNECT".to_string()));
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_parses_endpoint() {
        let transport = MqttTransport::open("mqtt://10.0.0.5:1884", "referee").unwrap();
        assert_eq!(transport.endpoint(), ("10.0.0.5", 1884));

        let transport = MqttTransport::open("mqtt://broker.local", "referee").unwrap();
        assert_eq!(transport.endpoint(), ("broker.local", DEFAULT_PORT));
    }

    #[test]
    fn test_open_rejects_bad_input() {
        assert!(matches!(MqttTransport::open("not a url", "referee"), Err(TransportError::Connect(_))));
        assert!(matches!(
            MqttTransport::open("redis://127.0.0.1:6379/", "referee"),
            Err(TransportError::Connect(_))
        ));
        assert!(matches!(MqttTransport::open("mqtt://127.0.0.1", ""), Err(TransportError::Connect(_))));
    }

    #[tokio::test]
    async fn test_connect_fails_without_broker() {
        // Port 9 (discard) on loopback has no MQTT broker behind it.
        let transport = MqttTransport::open("mqtt://127.0.0.1:9", "referee-test").unwrap();
        assert!(matches!(transport.connect().await, Err(TransportError::Connect(_))));
    }
}
