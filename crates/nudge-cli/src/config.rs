use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use nudge_core::db::StoreConfig;
use nudge_core::dispatch::DispatchConfig;
use nudge_core::messaging::{TelegramConfig, DEFAULT_API_BASE_URL};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "nudge.toml";

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub database_path: String,
    /// Held exclusively for the duration of a dispatch pass.
    pub lock_file: String,
    pub log_level: String,
    /// IANA zone that fire times are written in.
    pub timezone: String,
    pub telegram: TelegramSettings,
    pub dispatch: DispatchSettings,
    pub store: StoreSettings,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub api_base_url: String,
    pub timeout_secs: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DispatchSettings {
    pub lookback_minutes: u32,
    pub send_timeout_secs: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StoreSettings {
    pub busy_timeout_ms: u64,
    pub retry_delay_ms: u64,
    pub max_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "nudge.db".to_string(),
            lock_file: "nudge.lock".to_string(),
            log_level: "info".to_string(),
            timezone: detect_system_timezone(),
            telegram: TelegramSettings::default(),
            dispatch: DispatchSettings::default(),
            store: StoreSettings::default(),
        }
    }
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            lookback_minutes: 1,
            send_timeout_secs: 15,
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        let store = StoreConfig::default();
        Self {
            busy_timeout_ms: store.busy_timeout.as_millis() as u64,
            retry_delay_ms: store.retry_delay.as_millis() as u64,
            max_connections: store.max_connections,
        }
    }
}

impl Config {
    /// Loads `path` (or `nudge.toml`), then `NUDGE_*` environment variables.
    /// Nested keys use a double underscore: `NUDGE_TELEGRAM__BOT_TOKEN`.
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(file))
                .merge(Env::prefixed("NUDGE_").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self, figment::Error> {
        figment.extract()
    }

    pub fn tz(&self) -> Result<Tz, String> {
        validate_timezone(&self.timezone)
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            max_connections: self.store.max_connections.max(1),
            busy_timeout: Duration::from_millis(self.store.busy_timeout_ms),
            retry_delay: Duration::from_millis(self.store.retry_delay_ms),
            ..StoreConfig::default()
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            lookback_minutes: self.dispatch.lookback_minutes,
            send_timeout: Duration::from_secs(self.dispatch.send_timeout_secs.max(1)),
        }
    }

    pub fn telegram_config(&self) -> TelegramConfig {
        TelegramConfig {
            bot_token: self.telegram.bot_token.clone(),
            api_base_url: self.telegram.api_base_url.clone(),
            timeout: Duration::from_secs(self.telegram.timeout_secs.max(1)),
        }
    }
}

/// Validates that a timezone string is a valid IANA timezone name
pub fn validate_timezone(timezone: &str) -> Result<Tz, String> {
    Tz::from_str(timezone).map_err(|_| {
        format!("Invalid timezone: '{timezone}'. Use IANA timezone names like 'Europe/Moscow'")
    })
}

/// Detects the system timezone, falling back to UTC if detection fails
pub fn detect_system_timezone() -> String {
    if let Ok(tz) = std::env::var("TZ") {
        if validate_timezone(&tz).is_ok() {
            return tz;
        }
    }

    if let Ok(local_tz) = iana_time_zone::get_timezone() {
        if validate_timezone(&local_tz).is_ok() {
            return local_tz;
        }
    }

    "UTC".to_string()
}
