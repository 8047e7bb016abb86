/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Service settings loaded from `settings.yaml`
//!
//! Settings cover deployment knobs only (instance naming, startup behavior).
//! Rule tables are not configuration files in this service - they are
//! materialized, immutable lists provided to the engine at construction.

use lazy_static::lazy_static;
use serde::Deserialize;

const DEFAULT_SETTINGS_PATH: &str = "/etc/statemanager/settings.yaml";
const DEFAULT_CONTROLLER_NAME: &str = "MainController";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub machine: MachineSettings,
}

/// Naming and startup behavior of the machine-wide Controller instance
#[derive(Debug, Clone, Deserialize)]
pub struct MachineSettings {
    /// Name of the Controller state machine instance
    #[serde(default = "default_controller_name")]
    pub controller_name: String,
    /// Request the Running state automatically after start
    #[serde(default)]
    pub auto_running: bool,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            controller_name: default_controller_name(),
            auto_running: false,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            machine: MachineSettings::default(),
        }
    }
}

fn default_controller_name() -> String {
    DEFAULT_CONTROLLER_NAME.to_string()
}

fn parse_settings() -> Settings {
    let path =
        std::env::var("STATEMANAGER_SETTINGS").unwrap_or_else(|_| DEFAULT_SETTINGS_PATH.into());

    let built = config::Config::builder()
        .add_source(config::File::with_name(&path).required(false))
        .build();

    match built.and_then(|c| c.try_deserialize::<Settings>()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("[Setting] Falling back to defaults: {e}");
            Settings::default()
        }
    }
}

lazy_static! {
    static ref SETTINGS: Settings = parse_settings();
}

/// Process-wide settings accessor
pub fn get_config() -> &'static Settings {
    &SETTINGS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_settings_file() {
        let settings = Settings::default();
        assert_eq!(settings.machine.controller_name, DEFAULT_CONTROLLER_NAME);
        assert!(!settings.machine.auto_running);
    }

    #[test]
    fn test_get_config_is_stable() {
        // Missing settings file must not fail - the loader falls back to
        // defaults so the service can always start.
        let first = get_config();
        let second = get_config();
        assert_eq!(first.machine.controller_name, second.machine.controller_name);
    }
}
