use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the logging subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by RUST_LOG env var.
    pub log_level: Level,
    /// Per-module level overrides (e.g. "planner_store" => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// JSON lines on stdout instead of compact text.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            json: false,
        }
    }
}

impl TelemetryConfig {
    /// Build a config from a level name such as `"debug"`.
    pub fn from_level_name(level: &str, json: bool) -> Result<Self, TelemetryError> {
        let log_level = Level::from_str(level.trim())
            .map_err(|_| TelemetryError::InvalidLevel(level.to_string()))?;
        Ok(Self {
            log_level,
            json,
            ..Self::default()
        })
    }

    pub fn with_module_level(mut self, module: impl Into<String>, level: Level) -> Self {
        self.module_levels.push((module.into(), level));
        self
    }

    /// Add per-module overrides given as `(module, level name)` pairs.
    pub fn with_module_level_names<'a>(
        mut self,
        modules: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, TelemetryError> {
        for (module, level) in modules {
            let parsed = Level::from_str(level.trim())
                .map_err(|_| TelemetryError::InvalidLevel(format!("{module}={level}")))?;
            self = self.with_module_level(module, parsed);
        }
        Ok(self)
    }

    /// The `EnvFilter` directive string used when RUST_LOG is unset.
    pub fn filter_directives(&self) -> String {
        let mut filter = self.log_level.to_string().to_lowercase();
        for (module, level) in &self.module_levels {
            filter.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
        }
        filter
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("unknown log level: {0}")]
    InvalidLevel(String),
    #[error("failed to install subscriber: {0}")]
    Init(String),
}

/// Install the global tracing subscriber. Call once at startup.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter))
        .try_init()
        .map_err(|e| TelemetryError::Init(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_is_info() {
        assert_eq!(TelemetryConfig::default().filter_directives(), "info");
    }

    #[test]
    fn module_levels_are_appended() {
        let config = TelemetryConfig::default()
            .with_module_level("planner_store", Level::DEBUG)
            .with_module_level("reqwest", Level::WARN);
        assert_eq!(
            config.filter_directives(),
            "info,planner_store=debug,reqwest=warn"
        );
    }

    #[test]
    fn from_level_name_accepts_any_case() {
        let config = TelemetryConfig::from_level_name("DEBUG", true).unwrap();
        assert_eq!(config.log_level, Level::DEBUG);
        assert!(config.json);
    }

    #[test]
    fn module_level_names_feed_the_filter() {
        let config = TelemetryConfig::from_level_name("warn", false)
            .unwrap()
            .with_module_level_names([("planner_store", "DEBUG"), ("planner_bot", "trace")])
            .unwrap();
        assert_eq!(
            config.filter_directives(),
            "warn,planner_store=debug,planner_bot=trace"
        );
    }

    #[test]
    fn module_level_names_reject_unknown_level() {
        let err = TelemetryConfig::default()
            .with_module_level_names([("planner_store", "loud")])
            .unwrap_err();
        assert!(err.to_string().contains("planner_store=loud"));
    }

    #[test]
    fn from_level_name_rejects_unknown() {
        let err = TelemetryConfig::from_level_name("chatty", false).unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidLevel(_)));
    }
}
