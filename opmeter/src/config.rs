//! Frozen snapshot of formatting and behaviour toggles.
//!
//! Loaded once per process (or once per [`crate::Meter`] in tests) and
//! never mutated afterwards; updates apply only to meters constructed after
//! a new snapshot is installed via [`crate::init`]. Read from plain
//! environment variables; this crate has no file-based settings layer.

use std::env;

/// Environment variable names, one per [`Config`] field, following the
/// `OPMETER_`-prefixed, `SCREAMING_SNAKE_CASE` environment variables.
mod env_keys {
    pub const PROGRESS_PERIOD_MS: &str = "OPMETER_PROGRESS_PERIOD_MS";
    pub const PRINT_CATEGORY: &str = "OPMETER_PRINT_CATEGORY";
    pub const PRINT_STATUS: &str = "OPMETER_PRINT_STATUS";
    pub const PRINT_POSITION: &str = "OPMETER_PRINT_POSITION";
    pub const PRINT_LOAD: &str = "OPMETER_PRINT_LOAD";
    pub const PRINT_MEMORY: &str = "OPMETER_PRINT_MEMORY";
    pub const DATA_PREFIX: &str = "OPMETER_DATA_PREFIX";
    pub const DATA_SUFFIX: &str = "OPMETER_DATA_SUFFIX";
    pub const MESSAGE_PREFIX: &str = "OPMETER_MESSAGE_PREFIX";
    pub const MESSAGE_SUFFIX: &str = "OPMETER_MESSAGE_SUFFIX";
    pub const JSON_OUTPUT: &str = "OPMETER_JSON_OUTPUT";
}

/// Formatting and behaviour toggles consumed by the renderer and the state
/// machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Minimum interval between `progress()` emissions. Default `2000`.
    pub progress_period_ms: u64,
    /// Include the category in the human-readable scope prefix. Default `false`.
    pub print_category: bool,
    /// Emit the `STATUS:` prefix. Default `true`.
    pub print_status: bool,
    /// Include `#position` in the scope. Default `false`.
    pub print_position: bool,
    /// Append process load into the data record. Default `false`.
    pub print_load: bool,
    /// Append a memory snapshot into the data record. Default `false`.
    pub print_memory: bool,
    /// Prefix for the structured-data logger name. Default `""`.
    pub data_prefix: String,
    /// Suffix for the structured-data logger name. Default `""`.
    pub data_suffix: String,
    /// Prefix for the human-readable logger name. Default `""`.
    pub message_prefix: String,
    /// Suffix for the human-readable logger name. Default `""`.
    pub message_suffix: String,
    /// Emit newline-delimited JSON instead of the human-readable terminal
    /// format. Default `false`.
    pub json_output: bool,
    /// Non-fatal parse errors collected while loading this snapshot from
    /// the environment: an invalid value falls back to the field's default
    /// and is appended here instead of aborting initialization.
    pub init_errors: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            progress_period_ms: 2000,
            print_category: false,
            print_status: true,
            print_position: false,
            print_load: false,
            print_memory: false,
            data_prefix: String::new(),
            data_suffix: String::new(),
            message_prefix: String::new(),
            message_suffix: String::new(),
            json_output: false,
            init_errors: Vec::new(),
        }
    }
}

impl Config {
    /// Loads a snapshot from environment variables, falling back to
    /// defaults (and recording a diagnostic in `init_errors`) for any
    /// variable present but unparseable.
    pub fn from_env() -> Self {
        let mut cfg = Config::default();

        if let Some(v) = parse_env_u64(env_keys::PROGRESS_PERIOD_MS, &mut cfg.init_errors) {
            cfg.progress_period_ms = v;
        }
        if let Some(v) = parse_env_bool(env_keys::PRINT_CATEGORY, &mut cfg.init_errors) {
            cfg.print_category = v;
        }
        if let Some(v) = parse_env_bool(env_keys::PRINT_STATUS, &mut cfg.init_errors) {
            cfg.print_status = v;
        }
        if let Some(v) = parse_env_bool(env_keys::PRINT_POSITION, &mut cfg.init_errors) {
            cfg.print_position = v;
        }
        if let Some(v) = parse_env_bool(env_keys::PRINT_LOAD, &mut cfg.init_errors) {
            cfg.print_load = v;
        }
        if let Some(v) = parse_env_bool(env_keys::PRINT_MEMORY, &mut cfg.init_errors) {
            cfg.print_memory = v;
        }
        if let Ok(v) = env::var(env_keys::DATA_PREFIX) {
            cfg.data_prefix = v;
        }
        if let Ok(v) = env::var(env_keys::DATA_SUFFIX) {
            cfg.data_suffix = v;
        }
        if let Ok(v) = env::var(env_keys::MESSAGE_PREFIX) {
            cfg.message_prefix = v;
        }
        if let Ok(v) = env::var(env_keys::MESSAGE_SUFFIX) {
            cfg.message_suffix = v;
        }
        if let Some(v) = parse_env_bool(env_keys::JSON_OUTPUT, &mut cfg.init_errors) {
            cfg.json_output = v;
        }

        cfg
    }

    /// Installs `config` as the current thread's [`Config`], returning a
    /// guard that restores the previous override when dropped. Scoped to
    /// the calling thread, so parallel tests don't stomp on each other's
    /// behavior toggles.
    #[cfg(any(test, feature = "testing"))]
    pub fn override_for_testing(config: Config) -> ConfigOverrideGuard {
        let previous = crate::backend::config_override();
        crate::backend::set_config_override(Some(config));
        ConfigOverrideGuard { previous }
    }
}

/// RAII guard returned by [`Config::override_for_testing`]. Restores the
/// thread's previous config override (or clears it) on drop.
#[cfg(any(test, feature = "testing"))]
pub struct ConfigOverrideGuard {
    previous: Option<Config>,
}

#[cfg(any(test, feature = "testing"))]
impl Drop for ConfigOverrideGuard {
    fn drop(&mut self) {
        crate::backend::set_config_override(self.previous.take());
    }
}

fn parse_env_u64(key: &str, errors: &mut Vec<String>) -> Option<u64> {
    match env::var(key) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(v) => Some(v),
            Err(_) => {
                errors.push(format!("invalid value for {key}: {raw:?}, using default"));
                None
            }
        },
        Err(_) => None,
    }
}

fn parse_env_bool(key: &str, errors: &mut Vec<String>) -> Option<bool> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" => Some(false),
            _ => {
                errors.push(format!("invalid value for {key}: {raw:?}, using default"));
                None
            }
        },
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serializes env-var-mutating tests; `std::env::set_var` is process-global.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_are_stable() {
        let cfg = Config::default();
        assert_eq!(cfg.progress_period_ms, 2000);
        assert!(!cfg.print_category);
        assert!(cfg.print_status);
        assert!(!cfg.print_position);
        assert!(!cfg.print_load);
        assert!(!cfg.print_memory);
        assert_eq!(cfg.data_prefix, "");
    }

    #[test]
    fn invalid_env_value_falls_back_and_records_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            env::set_var(env_keys::PROGRESS_PERIOD_MS, "not-a-number");
        }
        let cfg = Config::from_env();
        assert_eq!(cfg.progress_period_ms, 2000);
        assert_eq!(cfg.init_errors.len(), 1);
        unsafe {
            env::remove_var(env_keys::PROGRESS_PERIOD_MS);
        }
    }

    #[test]
    fn valid_env_value_overrides_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            env::set_var(env_keys::PRINT_CATEGORY, "true");
        }
        let cfg = Config::from_env();
        assert!(cfg.print_category);
        unsafe {
            env::remove_var(env_keys::PRINT_CATEGORY);
        }
    }

    #[test]
    fn override_for_testing_is_visible_through_backend_config_and_restored_on_drop() {
        assert!(!crate::backend::config().print_category);
        {
            let _guard = Config::override_for_testing(Config {
                print_category: true,
                ..Config::default()
            });
            assert!(crate::backend::config().print_category);
        }
        assert!(!crate::backend::config().print_category);
    }
}
