//! Engine-wide configuration, loaded beside the test file.
//!
//! Grounded in `supershuckie-frontend/src/settings.rs`'s
//! `try_to_init_user_dir_and_get_settings` idiom: a small serde struct with
//! const-fn defaults, tolerant of a missing or corrupt file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// The settings file name, written beside the test path's working
/// directory.
pub const SETTINGS_FILE_NAME: &str = "gmt-settings.json";

/// Engine-wide knobs that are process configuration, not recorded data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// How many failed assertions before the run is forcibly failed.
    #[serde(default = "EngineSettings::DEFAULT_FAIL_ASSERTION_TRIGGER_COUNT")]
    pub fail_assertion_trigger_count: u32,

    /// `TRACK` float comparisons use `|a - b| < float_eps`.
    #[serde(default = "EngineSettings::DEFAULT_FLOAT_EPS")]
    pub float_eps: f32,

    /// `TRACK` double comparisons use `|a - b| < double_eps`.
    #[serde(default = "EngineSettings::DEFAULT_DOUBLE_EPS")]
    pub double_eps: f64,

    /// Whether `InputSnapshot` captures gamepad slots.
    #[serde(default = "EngineSettings::DEFAULT_GAMEPADS_ENABLED")]
    pub gamepads_enabled: bool,

    /// Whether RECORD mode runs the stream writer on a background thread.
    #[serde(default = "EngineSettings::DEFAULT_BACKGROUND_WRITER_THREAD")]
    pub background_writer_thread: bool,
}

impl EngineSettings {
    const DEFAULT_FAIL_ASSERTION_TRIGGER_COUNT: fn() -> u32 = || 1;
    const DEFAULT_FLOAT_EPS: fn() -> f32 = || crate::track::FLOAT_EPS;
    const DEFAULT_DOUBLE_EPS: fn() -> f64 = || crate::track::DOUBLE_EPS;
    const DEFAULT_GAMEPADS_ENABLED: fn() -> bool = || false;
    const DEFAULT_BACKGROUND_WRITER_THREAD: fn() -> bool = || true;
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            fail_assertion_trigger_count: Self::DEFAULT_FAIL_ASSERTION_TRIGGER_COUNT(),
            float_eps: Self::DEFAULT_FLOAT_EPS(),
            double_eps: Self::DEFAULT_DOUBLE_EPS(),
            gamepads_enabled: Self::DEFAULT_GAMEPADS_ENABLED(),
            background_writer_thread: Self::DEFAULT_BACKGROUND_WRITER_THREAD(),
        }
    }
}

/// Read `<work_dir>/gmt-settings.json`, falling back to
/// [`EngineSettings::default`] on a missing file, an unreadable directory,
/// or a parse failure. Never fatal to `Init`.
pub fn load_or_default(work_dir: &Path) -> EngineSettings {
    let path = work_dir.join(SETTINGS_FILE_NAME);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(error) => {
            log::warn!("settings file {} unreadable: {error}; using defaults", path.display());
            return EngineSettings::default();
        }
    };
    match serde_json::from_str(&contents) {
        Ok(settings) => settings,
        Err(error) => {
            log::warn!("settings file {} is corrupt: {error}; using defaults", path.display());
            EngineSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_constants() {
        let settings = EngineSettings::default();
        assert_eq!(settings.fail_assertion_trigger_count, 1);
        assert_eq!(settings.float_eps, 1e-5);
        assert_eq!(settings.double_eps, 1e-11);
        assert!(!settings.gamepads_enabled);
        assert!(settings.background_writer_thread);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join("gmt-settings-test-missing");
        let settings = load_or_default(&dir);
        assert_eq!(settings, EngineSettings::default());
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join("gmt-settings-test-corrupt");
        fs::create_dir_all(&dir).expect("create temp dir");
        fs::write(dir.join(SETTINGS_FILE_NAME), b"not json").expect("write corrupt file");
        let settings = load_or_default(&dir);
        assert_eq!(settings, EngineSettings::default());
    }

    #[test]
    fn partial_file_fills_missing_fields_from_defaults() {
        let dir = std::env::temp_dir().join("gmt-settings-test-partial");
        fs::create_dir_all(&dir).expect("create temp dir");
        fs::write(
            dir.join(SETTINGS_FILE_NAME),
            br#"{"fail_assertion_trigger_count": 5}"#,
        )
        .expect("write partial file");
        let settings = load_or_default(&dir);
        assert_eq!(settings.fail_assertion_trigger_count, 5);
        assert_eq!(settings.gamepads_enabled, EngineSettings::default().gamepads_enabled);
    }
}
