use clap::{Parser, ValueEnum};
use lib_referee::core::{RefereeSettings, RelaySettings};
use lib_referee::ingestors::TopicMap;
use lib_referee::RefereeError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which pub/sub transport carries the topics.
#[derive(ValueEnum, Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// MQTT broker on `broker_url`, QoS 1.
    Mqtt,
    /// Redis pub/sub channels on `broker_url`.
    Redis,
    /// In-process loopback bus, for rehearsing without a broker.
    Local,
}

impl TransportKind {
    fn default_broker_url(self) -> &'static str {
        match self {
            TransportKind::Mqtt => "mqtt://127.0.0.1:1883",
            TransportKind::Redis => "redis://127.0.0.1:6379/",
            TransportKind::Local => "local",
        }
    }
}

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "Robotics competition referee console", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "REFEREE_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, value_enum, env = "REFEREE_TRANSPORT", help = "Pub/sub transport (mqtt, redis or local).")]
    pub transport: Option<TransportKind>,

    #[clap(long, env = "REFEREE_BROKER_URL", help = "Broker URL; defaults to the local broker of the chosen transport.")]
    pub broker_url: Option<String>,

    #[clap(long, env = "REFEREE_MQTT_CLIENT_ID", help = "Client id presented to the MQTT broker.")]
    pub mqtt_client_id: Option<String>,

    #[clap(long, env = "REFEREE_RED_TOPIC", help = "Topic the red team publishes telemetry on.")]
    pub red_topic: Option<String>,

    #[clap(long, env = "REFEREE_BLUE_TOPIC", help = "Topic the blue team publishes telemetry on.")]
    pub blue_topic: Option<String>,

    #[clap(long, env = "REFEREE_REFEREE_TOPIC", help = "Topic the match record is published on.")]
    pub referee_topic: Option<String>,

    #[clap(long, env = "REFEREE_TICK_HZ", help = "Match clock evaluations per second.")]
    pub tick_hz: Option<u32>,

    #[clap(long, env = "REFEREE_PUBLISH_HZ", help = "Match record publishes per second.")]
    pub publish_hz: Option<u32>,

    #[clap(long, env = "REFEREE_MATCH_SECONDS", help = "Length of the in-match window in seconds.")]
    pub match_seconds: Option<u64>,

    #[clap(long, env = "REFEREE_RECONNECT_BASE_DELAY_MS", help = "Base delay in milliseconds for reconnect attempts.")]
    pub reconnect_base_delay_ms: Option<u64>,

    #[clap(long, env = "REFEREE_RECONNECT_MAX_DELAY_MS", help = "Maximum delay in milliseconds for reconnect attempts.")]
    pub reconnect_max_delay_ms: Option<u64>,

    #[clap(long, env = "REFEREE_RED_NAME", help = "Initial red team name.")]
    pub red_name: Option<String>,

    #[clap(long, env = "REFEREE_BLUE_NAME", help = "Initial blue team name.")]
    pub blue_name: Option<String>,

    #[clap(long, env = "REFEREE_STATUS_INTERVAL_MS", help = "Interval of the status log line in milliseconds, 0 disables it.")]
    pub status_interval_ms: Option<u64>,

    #[clap(long, env = "REFEREE_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "REFEREE_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub transport: TransportKind,
    pub broker_url: String,
    pub mqtt_client_id: String,
    pub topics: TopicMap,
    pub referee: RefereeSettings,
    pub relay: RelaySettings,
    pub tick_interval: Duration,
    pub status_interval: Option<Duration>,
    pub log_dir: PathBuf,
    pub log_level: String,
}

impl Config {
    pub fn defaults() -> Config {
        Config {
            transport: Some(TransportKind::Mqtt),
            mqtt_client_id: Some("referee-console".to_string()),
            red_topic: Some("/red".to_string()),
            blue_topic: Some("/blue".to_string()),
            referee_topic: Some("/referee".to_string()),
            tick_hz: Some(10),
            publish_hz: Some(10),
            match_seconds: Some(180),
            reconnect_base_delay_ms: Some(100),
            reconnect_max_delay_ms: Some(2000),
            red_name: Some("Red Team".to_string()),
            blue_name: Some("Blue Team".to_string()),
            status_interval_ms: Some(1000),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            ..Default::default()
        }
    }

    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            transport: other.transport.or(self.transport),
            broker_url: other.broker_url.or(self.broker_url),
            mqtt_client_id: other.mqtt_client_id.or(self.mqtt_client_id),
            red_topic: other.red_topic.or(self.red_topic),
            blue_topic: other.blue_topic.or(self.blue_topic),
            referee_topic: other.referee_topic.or(self.referee_topic),
            tick_hz: other.tick_hz.or(self.tick_hz),
            publish_hz: other.publish_hz.or(self.publish_hz),
            match_seconds: other.match_seconds.or(self.match_seconds),
            reconnect_base_delay_ms: other.reconnect_base_delay_ms.or(self.reconnect_base_delay_ms),
            reconnect_max_delay_ms: other.reconnect_max_delay_ms.or(self.reconnect_max_delay_ms),
            red_name: other.red_name.or(self.red_name),
            blue_name: other.blue_name.or(self.blue_name),
            status_interval_ms: other.status_interval_ms.or(self.status_interval_ms),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
        }
    }

    /// Checks the merged values and turns them into runtime settings.
    pub fn resolve(self) -> Result<Settings, RefereeError> {
        let defaults = Config::defaults();
        let cfg = defaults.merge(self);
        let missing = |name: &str| RefereeError::Config(format!("{} is not set", name));

        let tick_hz = cfg.tick_hz.ok_or_else(|| missing("tickHz"))?;
        let publish_hz = cfg.publish_hz.ok_or_else(|| missing("publishHz"))?;
        let match_seconds = cfg.match_seconds.ok_or_else(|| missing("matchSeconds"))?;
        let base_ms = cfg.reconnect_base_delay_ms.ok_or_else(|| missing("reconnectBaseDelayMs"))?;
        let max_ms = cfg.reconnect_max_delay_ms.ok_or_else(|| missing("reconnectMaxDelayMs"))?;

        if tick_hz == 0 || publish_hz == 0 {
            return Err(RefereeError::Config("tick and publish rates must be at least 1 Hz".to_string()));
        }
        if match_seconds == 0 {
            return Err(RefereeError::Config("match length must be at least one second".to_string()));
        }
        if max_ms < base_ms {
            return Err(RefereeError::Config(format!(
                "reconnect max delay ({} ms) is below the base delay ({} ms)",
                max_ms, base_ms
            )));
        }

        let status_interval = match cfg.status_interval_ms.unwrap_or(0) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        let transport = cfg.transport.ok_or_else(|| missing("transport"))?;

        Ok(Settings {
            transport,
            broker_url: cfg
                .broker_url
                .unwrap_or_else(|| transport.default_broker_url().to_string()),
            mqtt_client_id: cfg.mqtt_client_id.ok_or_else(|| missing("mqttClientId"))?,
            topics: TopicMap {
                red: cfg.red_topic.ok_or_else(|| missing("redTopic"))?,
                blue: cfg.blue_topic.ok_or_else(|| missing("blueTopic"))?,
                referee: cfg.referee_topic.ok_or_else(|| missing("refereeTopic"))?,
            },
            referee: RefereeSettings {
                match_duration: Duration::from_secs(match_seconds),
                red_name: cfg.red_name.ok_or_else(|| missing("redName"))?,
                blue_name: cfg.blue_name.ok_or_else(|| missing("blueName"))?,
            },
            relay: RelaySettings {
                publish_interval: hz_to_period(publish_hz),
                reconnect_base_delay: Duration::from_millis(base_ms),
                reconnect_max_delay: Duration::from_millis(max_ms),
            },
            tick_interval: hz_to_period(tick_hz),
            status_interval,
            log_dir: cfg.log_dir.ok_or_else(|| missing("logDir"))?,
            log_level: cfg.log_level.ok_or_else(|| missing("logLevel"))?,
        })
    }
}

fn hz_to_period(hz: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(hz))
}

/// Something worth reporting about how the configuration was assembled.
/// Collected while loading and logged once the logger is installed.
pub type ConfigNotice = (log::Level, String);

/// Reads a JSON config file. A missing file is not an error.
fn read_config_file(path: &Path, notices: &mut Vec<ConfigNotice>) -> Option<Config> {
    if !path.exists() {
        notices.push((
            log::Level::Info,
            format!("Config file not found at {}. Using defaults and environment/CLI variables.", path.display()),
        ));
        return None;
    }
    let parsed = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))
        .and_then(|config_str| {
            serde_json::from_str::<Config>(&config_str)
                .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))
        });
    match parsed {
        Ok(file_config) => {
            notices.push((log::Level::Info, format!("Loaded config file {}.", path.display())));
            Some(file_config)
        }
        Err(e) => {
            notices.push((log::Level::Warn, format!("{}. Falling back to other sources.", e)));
            None
        }
    }
}

/// Layers defaults, the config file and the CLI/environment values.
pub fn layer_config(cli_args: Config) -> (Config, Vec<ConfigNotice>) {
    let config_file_path = cli_args
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("server_referee.conf"));

    let mut notices = Vec::new();
    let mut current_config = Config::defaults();
    if let Some(file_config) = read_config_file(&config_file_path, &mut notices) {
        current_config = current_config.merge(file_config);
    }
    (current_config.merge(cli_args), notices)
}

pub fn load_config() -> Result<(Settings, Vec<ConfigNotice>), RefereeError> {
    let (config, notices) = layer_config(Config::parse());
    Ok((config.resolve()?, notices))
}
