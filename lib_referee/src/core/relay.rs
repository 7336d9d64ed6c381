//! # Referee Relay
//!
//! Drives the transport for the lifetime of the process. One session is:
//! connect, subscribe to the team topics, then run the publish loop and the
//! subscribe loop side by side until either fails. Any failure ends the
//! session: the connection is dropped, both sides' telemetry is forgotten and
//! a new session starts after the backoff delay.
//!
//! The match clock runs as its own task (`run_match_clock`) and never waits
//! on the transport.

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, sleep, MissedTickBehavior};

use crate::connections::{TopicPublisher, TopicSubscriber, Transport};
use crate::core::record::encode_record;
use crate::core::referee::Referee;
use crate::error::TransportError;
use crate::ingestors::TelemetryIngestor;

/// Timing of the relay.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Period between two referee-topic publishes.
    pub publish_interval: Duration,
    /// Delay before the first reconnect attempt after a failure.
    pub reconnect_base_delay: Duration,
    /// Ceiling for the reconnect delay.
    pub reconnect_max_delay: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            publish_interval: Duration::from_millis(100),
            reconnect_base_delay: Duration::from_millis(100),
            reconnect_max_delay: Duration::from_millis(2000),
        }
    }
}

/// Reconnect delay that doubles per consecutive failure up to a ceiling.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        let max = max.max(base);
        Self { base, max, current: base }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    /// Back to the base delay after a healthy session.
    pub fn reset(&mut self) {
        self.current = self.base;
    }
}

pub struct RefereeRelay<T: Transport> {
    transport: T,
    ingestor: TelemetryIngestor,
    referee: Referee,
    settings: RelaySettings,
}

impl<T: Transport> RefereeRelay<T> {
    pub fn new(transport: T, ingestor: TelemetryIngestor, referee: Referee, settings: RelaySettings) -> Self {
        Self {
            transport,
            ingestor,
            referee,
            settings,
        }
    }

    /// Runs sessions back to back until shutdown is signalled.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut backoff = Backoff::new(self.settings.reconnect_base_delay, self.settings.reconnect_max_delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    log::info!("Relay shutting down...");
                    return;
                }
                err = self.session(&mut backoff) => {
                    log::error!("Transport session ended: {}", err);
                }
            }

            self.referee.reset_telemetry();
            let delay = backoff.next_delay();
            log::info!("Reconnecting in {} ms.", delay.as_millis());

            tokio::select! {
                _ = shutdown.recv() => {
                    log::info!("Relay shutting down...");
                    return;
                }
                _ = sleep(delay) => {}
            }
        }
    }

    // Only ever returns with the error that ended the session; the halves of
    // the connection are dropped on the way out.
    async fn session(&self, backoff: &mut Backoff) -> TransportError {
        log::info!("Connecting to pub/sub transport.");
        let (mut publisher, mut subscriber) = match self.transport.connect().await {
            Ok(halves) => halves,
            Err(e) => return e,
        };

        let topics = self.ingestor.topics();
        if let Err(e) = subscriber.subscribe(&topics.inbound()).await {
            return e;
        }
        log::info!("Connected; subscribed to {} and {}.", topics.red, topics.blue);
        backoff.reset();

        tokio::select! {
            err = publish_loop(&mut publisher, &self.referee, &topics.referee, self.settings.publish_interval) => err,
            err = subscribe_loop(&mut subscriber, &self.ingestor) => err,
        }
    }
}

async fn publish_loop<P: TopicPublisher>(
    publisher: &mut P,
    referee: &Referee,
    topic: &str,
    every: Duration,
) -> TransportError {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let payload = match encode_record(&referee.snapshot()) {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("Failed to encode match record: {}", e);
                continue;
            }
        };
        if let Err(e) = publisher.publish(topic, payload).await {
            return e;
        }
    }
}

async fn subscribe_loop<S: TopicSubscriber>(subscriber: &mut S, ingestor: &TelemetryIngestor) -> TransportError {
    loop {
        match subscriber.next_message().await {
            Ok(msg) => {
                if let Err(e) = ingestor.handle(&msg.topic, &msg.payload) {
                    log::warn!("Dropping message on '{}': {}", msg.topic, e);
                }
            }
            Err(e) => return e,
        }
    }
}

/// Fixed-rate evaluator task.
pub async fn run_match_clock(referee: Referee, every: Duration, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                log::info!("Match clock stopped.");
                return;
            }
            _ = ticker.tick() => {
                referee.tick();
            }
        }
    }
}
