//! `event-planner`: Telegram event planning bot.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use planner_bot::{CommandRouter, IdentityResolver, Runtime, TelegramConfig, TelegramTransport};
use planner_core::PlatformId;
use planner_settings::PlannerSettings;
use planner_store::{Database, UserRepo};
use planner_telemetry::TelemetryConfig;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "event-planner", about = "Event planning chat bot", version)]
struct Cli {
    /// Settings file (defaults to $PLANNER_SETTINGS or ~/.event-planner/settings.json).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// SQLite database path; overrides settings and env.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Run the bot until interrupted.
    Run,
    /// Grant admin rights to a registered user.
    Promote {
        #[arg(allow_hyphen_values = true)]
        platform_id: i64,
    },
    /// List registered users.
    Users,
}

impl Cli {
    fn load_settings(&self) -> Result<PlannerSettings> {
        let path = self
            .settings
            .clone()
            .unwrap_or_else(planner_settings::settings_path);
        let mut settings = planner_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        if let Some(db) = &self.db {
            settings.database.path = db.to_string_lossy().into_owned();
        }
        Ok(settings)
    }
}

fn open_database(settings: &PlannerSettings) -> Result<Database> {
    let path = Path::new(&settings.database.path);
    Database::open(path).with_context(|| format!("Failed to open database at {}", path.display()))
}

fn telemetry_config(settings: &PlannerSettings) -> Result<TelemetryConfig> {
    let logging = &settings.logging;
    TelemetryConfig::from_level_name(&logging.level, logging.json)
        .context("Invalid logging.level")?
        .with_module_level_names(
            logging
                .modules
                .iter()
                .map(|(module, level)| (module.as_str(), level.as_str())),
        )
        .context("Invalid logging.modules")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.load_settings()?;

    let telemetry = telemetry_config(&settings)?;
    planner_telemetry::init_telemetry(&telemetry).context("Failed to initialize logging")?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(settings).await,
        Command::Promote { platform_id } => promote(&settings, PlatformId::new(platform_id)),
        Command::Users => list_users(&settings),
    }
}

async fn run(settings: PlannerSettings) -> Result<()> {
    settings.validate().context("Invalid settings")?;
    let db = open_database(&settings)?;

    let identity = IdentityResolver::new(db.clone()).with_bootstrap_admins(
        settings
            .admins
            .platform_ids
            .iter()
            .copied()
            .map(PlatformId::new),
    );
    let router = Arc::new(CommandRouter::new(db, identity));

    let transport = TelegramTransport::new(TelegramConfig {
        api_url: settings.telegram.api_url.clone(),
        token: settings.telegram.token.clone(),
        poll_timeout_secs: settings.telegram.poll_timeout_secs,
    })
    .context("Failed to create Telegram transport")?;

    let runtime = Runtime::new(Arc::new(transport), router)
        .with_shutdown_grace(Duration::from_secs(settings.runtime.shutdown_grace_secs));

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Shutting down...");
        signal.cancel();
    });

    tracing::info!(db = %settings.database.path, "event planner started");
    let summary = runtime.run(shutdown).await;
    tracing::info!(
        dispatched = summary.dispatched,
        abandoned = summary.abandoned,
        "Shutdown complete"
    );
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

fn promote(settings: &PlannerSettings, platform_id: PlatformId) -> Result<()> {
    let db = open_database(settings)?;
    IdentityResolver::new(db)
        .promote_to_admin(platform_id)
        .with_context(|| format!("Failed to promote user {platform_id}"))?;
    println!("User {platform_id} is now an admin.");
    Ok(())
}

fn list_users(settings: &PlannerSettings) -> Result<()> {
    let db = open_database(settings)?;
    let users = UserRepo::new(db).list().context("Failed to list users")?;
    if users.is_empty() {
        println!("No registered users.");
        return Ok(());
    }
    for user in users {
        println!(
            "{}\t{}\t{}\t{}",
            user.platform_id,
            user.username.as_deref().unwrap_or("-"),
            user.given_name,
            if user.is_admin { "admin" } else { "" }
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_run() {
        let cli = Cli::parse_from(["event-planner"]);
        assert!(cli.command.is_none());
        assert!(cli.settings.is_none());
    }

    #[test]
    fn promote_takes_platform_id() {
        let cli = Cli::parse_from(["event-planner", "promote", "300"]);
        assert_eq!(cli.command, Some(Command::Promote { platform_id: 300 }));
    }

    #[test]
    fn negative_platform_ids_are_accepted() {
        let cli = Cli::parse_from(["event-planner", "promote", "-100200"]);
        assert_eq!(cli.command, Some(Command::Promote { platform_id: -100200 }));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["event-planner", "users", "--db", "/tmp/x.db"]);
        assert_eq!(cli.command, Some(Command::Users));
        assert_eq!(cli.db.as_deref(), Some(Path::new("/tmp/x.db")));
    }

    #[test]
    fn settings_file_module_levels_reach_filter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"logging": {"level": "info", "modules": {"planner_store": "debug"}}}"#,
        )
        .unwrap();
        let cli = Cli::parse_from(["event-planner", "--settings", path.to_str().unwrap()]);
        let settings = cli.load_settings().unwrap();
        let config = telemetry_config(&settings).unwrap();
        assert!(config.filter_directives().ends_with(",planner_store=debug"));
    }

    #[test]
    fn bad_module_level_is_rejected() {
        let mut settings = PlannerSettings::default();
        settings.logging.modules.insert("planner_bot".into(), "noisy".into());
        assert!(telemetry_config(&settings).is_err());
    }

    #[test]
    fn db_flag_overrides_settings() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::parse_from([
            "event-planner",
            "--settings",
            dir.path().join("missing.json").to_str().unwrap(),
            "--db",
            "/tmp/override.db",
        ]);
        let settings = cli.load_settings().unwrap();
        assert_eq!(settings.database.path, "/tmp/override.db");
    }
}
