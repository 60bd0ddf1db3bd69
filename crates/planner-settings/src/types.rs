//! Settings types. Every section defaults independently so a partial
//! settings file is always valid.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlannerSettings {
    pub telegram: TelegramSettings,
    pub database: DatabaseSettings,
    pub admins: AdminSettings,
    pub logging: LoggingSettings,
    pub runtime: RuntimeSettings,
}

impl PlannerSettings {
    /// Check the values the bot cannot start without.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.token.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "telegram.token is empty; set PLANNER_TELEGRAM_TOKEN".into(),
            ));
        }
        if !(1..=600).contains(&self.telegram.poll_timeout_secs) {
            return Err(SettingsError::InvalidValue(format!(
                "telegram.pollTimeoutSecs must be within 1..=600, got {}",
                self.telegram.poll_timeout_secs
            )));
        }
        if self.database.path.trim().is_empty() {
            return Err(SettingsError::InvalidValue("database.path is empty".into()));
        }
        Ok(())
    }
}

/// Bot API connection.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelegramSettings {
    /// Bot token. Never has a compiled-in value.
    pub token: String,
    /// Base URL of the Bot API.
    pub api_url: String,
    /// Long-poll timeout passed to `getUpdates`.
    pub poll_timeout_secs: u64,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_url: "https://api.telegram.org".to_string(),
            poll_timeout_secs: 60,
        }
    }
}

impl fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.token.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("TelegramSettings")
            .field("token", &token)
            .field("api_url", &self.api_url)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// SQLite file path. Parent directories are created on open.
    pub path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "data/events.db".to_string(),
        }
    }
}

/// Users granted admin rights on first contact.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdminSettings {
    pub platform_ids: Vec<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level; `RUST_LOG` still wins when set.
    pub level: String,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
    /// Per-module levels, e.g. `{"planner_store": "debug"}`.
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            modules: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeSettings {
    /// How long shutdown waits for in-flight message handlers.
    pub shutdown_grace_secs: u64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            shutdown_grace_secs: 10,
        }
    }
}
