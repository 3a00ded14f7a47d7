//! # taskboard-settings
//!
//! Configuration for the taskboard channel, consumers and binary.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`TaskboardSettings::default()`]
//! 2. **User file**: `~/.taskboard/settings.json`, or
//!    `$TASKBOARD_HOME/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `TASKBOARD_*` overrides (highest priority)
//!
//! There is no global instance. The binary loads settings once and passes
//! the pieces each component needs.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_from, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::*;
