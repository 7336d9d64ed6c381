use anyhow::{Context, Result};
use lib_referee::connections::{LocalBus, MqttTransport, RedisTransport, Transport};
use lib_referee::core::{run_match_clock, Referee, RefereeRelay, RelaySettings};
use lib_referee::ingestors::TelemetryIngestor;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

mod referee_logic;
use referee_logic::config::{self, TransportKind};
use referee_logic::{console, logger};

fn spawn_relay<T>(
    transport: T,
    ingestor: TelemetryIngestor,
    referee: Referee,
    settings: RelaySettings,
    shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()>
where
    T: Transport + Send + Sync + 'static,
{
    let relay = RefereeRelay::new(transport, ingestor, referee, settings);
    tokio::spawn(async move { relay.run(shutdown).await })
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let (settings, notices) = config::load_config().context("invalid configuration")?;
    logger::setup_logging(&settings.log_dir, &settings.log_level)
        .with_context(|| format!("cannot set up logging in {}", settings.log_dir.display()))?;
    for (level, notice) in notices {
        log::log!(level, "{}", notice);
    }
    log::info!(
        "Referee console starting: transport {:?}, match {}s, topics {} {} -> {}",
        settings.transport,
        settings.referee.match_duration.as_secs(),
        settings.topics.red,
        settings.topics.blue,
        settings.topics.referee
    );

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
    let referee = Referee::new(&settings.referee);
    let ingestor = TelemetryIngestor::new(referee.clone(), settings.topics.clone());

    let relay_handle = match settings.transport {
        TransportKind::Mqtt => spawn_relay(
            MqttTransport::open(&settings.broker_url, &settings.mqtt_client_id)
                .with_context(|| format!("invalid broker url {}", settings.broker_url))?,
            ingestor,
            referee.clone(),
            settings.relay.clone(),
            shutdown_tx.subscribe(),
        ),
        TransportKind::Redis => spawn_relay(
            RedisTransport::open(&settings.broker_url)
                .with_context(|| format!("invalid broker url {}", settings.broker_url))?,
            ingestor,
            referee.clone(),
            settings.relay.clone(),
            shutdown_tx.subscribe(),
        ),
        TransportKind::Local => {
            log::warn!("Local transport selected; only in-process publishers reach the referee.");
            spawn_relay(
                LocalBus::new(256),
                ingestor,
                referee.clone(),
                settings.relay.clone(),
                shutdown_tx.subscribe(),
            )
        }
    };

    let clock_handle = tokio::spawn(run_match_clock(
        referee.clone(),
        settings.tick_interval,
        shutdown_tx.subscribe(),
    ));

    let status_handle = settings.status_interval.map(|every| {
        tokio::spawn(console::run_status_line(referee.clone(), every, shutdown_tx.subscribe()))
    });

    let console_handle = tokio::spawn(console::run_console(
        referee.clone(),
        console::spawn_stdin_reader(),
        shutdown_tx.subscribe(),
        shutdown_tx.clone(),
    ));

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = shutdown_rx.recv() => {
            log::info!("Shutdown requested from console.");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut term_signal) => {
                        term_signal.recv().await;
                        log::info!("SIGTERM received, initiating shutdown.");
                    }
                    Err(e) => {
                        log::error!("Cannot install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {}
    }

    // Send shutdown signal to all components
    let _ = shutdown_tx.send(());

    let _ = tokio::try_join!(relay_handle, clock_handle, console_handle);
    if let Some(handle) = status_handle {
        let _ = handle.await;
    }

    log::info!("Shutdown complete. Final state: {}", lib_referee::core::display::headline(&referee.snapshot()));
    Ok(())
}
