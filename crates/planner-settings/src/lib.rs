//! # planner-settings
//!
//! Configuration for the event planner bot, loaded in three layers
//! (lowest priority first):
//! 1. **Compiled defaults**: [`PlannerSettings::default()`]. These carry no
//!    token and no administrator ids.
//! 2. **Settings file**: `~/.event-planner/settings.json`, or the path in
//!    `PLANNER_SETTINGS`, deep-merged over the defaults.
//! 3. **Environment variables**: `PLANNER_*` overrides.
//!
//! ```no_run
//! let settings = planner_settings::load_settings().unwrap_or_default();
//! println!("database: {}", settings.database.path);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::*;
