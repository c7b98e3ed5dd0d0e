//! Environment-derived configuration.
//!
//! All configuration is read once at process start into an explicit [`Config`]
//! which is then passed into the component constructors. Nothing in the crate
//! reads the environment after startup.

use std::path::PathBuf;
use std::time::Duration;

use tracing::trace;

const DB_PATH: &str = "DB_PATH";
const CHECK_INTERVAL: &str = "CHECK_INTERVAL";
const PROBE_TIMEOUT: &str = "PROBE_TIMEOUT";

const SMTP_SERVER: &str = "SMTP_SERVER";
const SMTP_PORT: &str = "SMTP_PORT";
const SMTP_USER: &str = "SMTP_USER";
const SMTP_PASS: &str = "SMTP_PASS";
const ALERT_EMAIL: &str = "ALERT_EMAIL";

const WEBHOOK_ENDPOINT: &str = "WEBHOOK_ENDPOINT";
const WEBHOOK_API_KEY: &str = "WEBHOOK_API_KEY";
const WEBHOOK_INSTANCE_ID: &str = "WEBHOOK_INSTANCE_ID";
const WEBHOOK_RECIPIENT: &str = "WEBHOOK_RECIPIENT";

/// Device store backend configuration
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// In-memory store (no persistence)
    Memory,

    /// SQLite database (default)
    Sqlite {
        /// Path to the SQLite database file
        path: PathBuf,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Sqlite {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./devices.db")
}

fn default_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_smtp_server() -> String {
    String::from("smtp.office365.com")
}

fn default_smtp_port() -> u16 {
    587
}

fn default_webhook_endpoint() -> String {
    String::from("https://api.wacloud.app/send-message")
}

/// Scheduler and prober parameters.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Pause between the end of one cycle and the start of the next.
    pub interval: Duration,

    /// Upper bound on a single echo probe.
    pub probe_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            probe_timeout: default_probe_timeout(),
        }
    }
}

impl MonitorConfig {
    fn from_env() -> Self {
        Self {
            interval: env_secs(CHECK_INTERVAL).unwrap_or_else(default_interval),
            probe_timeout: env_secs(PROBE_TIMEOUT).unwrap_or_else(default_probe_timeout),
        }
    }
}

/// SMTP submission settings for the email alert channel.
///
/// The channel is inert unless username, password and recipient are all set.
#[derive(Clone)]
pub struct EmailConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub recipient: String,
}

// Manual impl so the password never ends up in log output.
impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("recipient", &self.recipient)
            .finish()
    }
}

impl EmailConfig {
    /// Load from the environment.
    ///
    /// Returns `None` if any of `SMTP_USER`, `SMTP_PASS` or `ALERT_EMAIL` is
    /// missing, signalling that email alerts are not configured.
    pub fn from_env() -> Option<Self> {
        let username = env_non_empty(SMTP_USER)?;
        let password = env_non_empty(SMTP_PASS)?;
        let recipient = env_non_empty(ALERT_EMAIL)?;

        Some(Self {
            server: env_non_empty(SMTP_SERVER).unwrap_or_else(default_smtp_server),
            port: std::env::var(SMTP_PORT)
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(default_smtp_port),
            username,
            password,
            recipient,
        })
    }
}

/// Webhook/chat alert channel settings.
///
/// The channel is inert unless api key, instance id and recipient are all set.
#[derive(Clone)]
pub struct WebhookConfig {
    pub endpoint: String,
    pub api_key: String,
    pub instance_id: String,
    pub recipient: String,
}

// Manual impl so the api key never ends up in log output.
impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("instance_id", &self.instance_id)
            .field("recipient", &self.recipient)
            .finish()
    }
}

impl WebhookConfig {
    /// Load from the environment.
    ///
    /// Returns `None` if any of `WEBHOOK_API_KEY`, `WEBHOOK_INSTANCE_ID` or
    /// `WEBHOOK_RECIPIENT` is missing.
    pub fn from_env() -> Option<Self> {
        let api_key = env_non_empty(WEBHOOK_API_KEY)?;
        let instance_id = env_non_empty(WEBHOOK_INSTANCE_ID)?;
        let recipient = env_non_empty(WEBHOOK_RECIPIENT)?;

        Some(Self {
            endpoint: env_non_empty(WEBHOOK_ENDPOINT).unwrap_or_else(default_webhook_endpoint),
            api_key,
            instance_id,
            recipient,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub store: StoreConfig,
    pub monitor: MonitorConfig,

    /// Email channel; `None` means the channel is disabled.
    pub email: Option<EmailConfig>,

    /// Webhook channel; `None` means the channel is disabled.
    pub webhook: Option<WebhookConfig>,
}

impl Config {
    /// Build the full configuration from the environment.
    pub fn from_env() -> Self {
        let config = Self {
            store: StoreConfig::Sqlite {
                path: std::env::var(DB_PATH)
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| default_db_path()),
            },
            monitor: MonitorConfig::from_env(),
            email: EmailConfig::from_env(),
            webhook: WebhookConfig::from_env(),
        };
        trace!("loaded config: {config:?}");
        config
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_secs(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
}
