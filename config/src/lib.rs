//! Load configuration from XDG `config.toml` and project `.env`, then apply to the process
//! environment with priority: **existing env > .env > XDG**.
//!
//! On top of the raw env overlay, [`Settings`] gives the pipeline a typed view of the
//! `BURNISH_*` keys with sane defaults for anything unset.

mod dotenv;
mod toml_file;

use std::path::Path;
use thiserror::Error;

/// Env key for the model identifier handed to the text-generation backend.
pub const ENV_MODEL: &str = "BURNISH_MODEL";
/// Env key for an alternative API base URL (proxies, self-hosted gateways).
pub const ENV_API_BASE: &str = "BURNISH_API_BASE";
/// Env key for the revision budget.
pub const ENV_MAX_ITERATIONS: &str = "BURNISH_MAX_ITERATIONS";
/// Env key for the inclusive approval threshold.
pub const ENV_APPROVAL_THRESHOLD: &str = "BURNISH_APPROVAL_THRESHOLD";
/// Env key for the per-stage timeout in seconds.
pub const ENV_STAGE_TIMEOUT_SECS: &str = "BURNISH_STAGE_TIMEOUT_SECS";

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("resolve config dir: {0}")]
    ConfigDir(String),
    #[error("read config.toml: {0}")]
    TomlRead(std::io::Error),
    #[error("parse config.toml: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("read .env: {0}")]
    DotenvRead(std::io::Error),
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Typed settings for the refinement pipeline, resolved from the process environment
/// after [`load_and_apply`] has merged the file-based sources in.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Model identifier passed to the text-generation backend.
    pub model: String,
    /// Optional API base URL override.
    pub api_base: Option<String>,
    /// Maximum number of refinement iterations after the initial draft.
    pub max_iterations: u32,
    /// Inclusive score threshold for approval.
    pub approval_threshold: u8,
    /// Wall-clock limit per stage invocation, in seconds.
    pub stage_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: "openai-gpt-4.1".to_string(),
            api_base: None,
            max_iterations: 3,
            approval_threshold: 7,
            stage_timeout_secs: 60,
        }
    }
}

impl Settings {
    /// Reads the `BURNISH_*` keys from the process environment, falling back to
    /// defaults for unset keys. Set keys with unparseable values are an error
    /// rather than a silent default.
    pub fn from_env() -> Result<Self, LoadError> {
        let mut settings = Settings::default();
        if let Ok(v) = std::env::var(ENV_MODEL) {
            if !v.trim().is_empty() {
                settings.model = v;
            }
        }
        if let Ok(v) = std::env::var(ENV_API_BASE) {
            if !v.trim().is_empty() {
                settings.api_base = Some(v);
            }
        }
        if let Ok(v) = std::env::var(ENV_MAX_ITERATIONS) {
            settings.max_iterations = v.trim().parse().map_err(|_| LoadError::InvalidValue {
                key: ENV_MAX_ITERATIONS,
                value: v,
            })?;
        }
        if let Ok(v) = std::env::var(ENV_APPROVAL_THRESHOLD) {
            settings.approval_threshold = v.trim().parse().map_err(|_| LoadError::InvalidValue {
                key: ENV_APPROVAL_THRESHOLD,
                value: v,
            })?;
        }
        if let Ok(v) = std::env::var(ENV_STAGE_TIMEOUT_SECS) {
            settings.stage_timeout_secs = v.trim().parse().map_err(|_| LoadError::InvalidValue {
                key: ENV_STAGE_TIMEOUT_SECS,
                value: v,
            })?;
        }
        Ok(settings)
    }
}

/// Loads config from XDG `config.toml` and optional project `.env`, then sets environment
/// variables only for keys that are **not** already set (so existing env has highest priority).
///
/// Order of precedence when a key is missing in the process environment:
/// 1. Value from project `.env` (current directory or `override_dir` if given)
/// 2. Value from `$XDG_CONFIG_HOME/<app_name>/config.toml` `[env]` table
///
/// * `app_name`: e.g. `"burnish"` — used for XDG path `~/.config/<app_name>/config.toml`.
/// * `override_dir`: if `Some`, look for `.env` in this directory instead of `std::env::current_dir()`.
pub fn load_and_apply(app_name: &str, override_dir: Option<&Path>) -> Result<(), LoadError> {
    let toml_map = toml_file::load_env_map(app_name)?;
    let dotenv_map = dotenv::load_env_map(override_dir).map_err(LoadError::DotenvRead)?;

    let mut keys: std::collections::HashSet<String> = toml_map.keys().cloned().collect();
    keys.extend(dotenv_map.keys().cloned());

    for key in keys {
        if std::env::var(&key).is_ok() {
            continue; // existing env wins
        }
        let value = dotenv_map.get(&key).or_else(|| toml_map.get(&key)).cloned();
        if let Some(v) = value {
            std::env::set_var(&key, v);
        }
    }

    Ok(())
}

/// Convenience entry point: merges file-based sources into the environment for
/// `app_name`, then resolves the typed [`Settings`] from the result.
pub fn load(app_name: &str, override_dir: Option<&Path>) -> Result<Settings, LoadError> {
    load_and_apply(app_name, override_dir)?;
    Settings::from_env()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn restore_var(key: &str, prev: Option<String>) {
        match prev {
            Some(v) => env::set_var(key, v),
            None => env::remove_var(key),
        }
    }

    #[test]
    fn existing_env_wins() {
        env::set_var("CONFIG_TEST_EXISTING", "from_env");
        let _ = load_and_apply("burnish", None);
        assert_eq!(env::var("CONFIG_TEST_EXISTING").as_deref(), Ok("from_env"));
        env::remove_var("CONFIG_TEST_EXISTING");
    }

    #[test]
    fn load_and_apply_no_config_ok() {
        let r = load_and_apply("config-crate-nonexistent-app-xyz", None::<&std::path::Path>);
        assert!(r.is_ok());
    }

    #[test]
    fn dotenv_overrides_toml() {
        let xdg_dir = tempfile::tempdir().unwrap();
        let app_dir = xdg_dir.path().join("burnish");
        std::fs::create_dir_all(&app_dir).unwrap();
        std::fs::write(
            app_dir.join("config.toml"),
            "[env]\nCONFIG_TEST_PRIORITY = \"from_toml\"\n",
        )
        .unwrap();

        let dotenv_dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dotenv_dir.path().join(".env"),
            "CONFIG_TEST_PRIORITY=from_dotenv\n",
        )
        .unwrap();

        let prev_xdg = env::var("XDG_CONFIG_HOME").ok();
        env::set_var("XDG_CONFIG_HOME", xdg_dir.path());
        env::remove_var("CONFIG_TEST_PRIORITY");

        let _ = load_and_apply("burnish", Some(dotenv_dir.path()));
        let val = env::var("CONFIG_TEST_PRIORITY").unwrap();
        env::remove_var("CONFIG_TEST_PRIORITY");
        restore_var("XDG_CONFIG_HOME", prev_xdg);

        assert_eq!(val, "from_dotenv");
    }

    #[test]
    fn toml_applied_when_no_dotenv() {
        let xdg_dir = tempfile::tempdir().unwrap();
        let app_dir = xdg_dir.path().join("burnish");
        std::fs::create_dir_all(&app_dir).unwrap();
        std::fs::write(
            app_dir.join("config.toml"),
            "[env]\nCONFIG_TEST_TOML_ONLY = \"from_toml\"\n",
        )
        .unwrap();

        let empty_dir = tempfile::tempdir().unwrap();

        let prev_xdg = env::var("XDG_CONFIG_HOME").ok();
        env::set_var("XDG_CONFIG_HOME", xdg_dir.path());
        env::remove_var("CONFIG_TEST_TOML_ONLY");

        let _ = load_and_apply("burnish", Some(empty_dir.path()));
        let val = env::var("CONFIG_TEST_TOML_ONLY").unwrap();
        env::remove_var("CONFIG_TEST_TOML_ONLY");
        restore_var("XDG_CONFIG_HOME", prev_xdg);

        assert_eq!(val, "from_toml");
    }

    #[test]
    fn settings_defaults() {
        let s = Settings::default();
        assert_eq!(s.model, "openai-gpt-4.1");
        assert_eq!(s.api_base, None);
        assert_eq!(s.max_iterations, 3);
        assert_eq!(s.approval_threshold, 7);
        assert_eq!(s.stage_timeout_secs, 60);
    }

    #[test]
    fn settings_from_env_reads_set_keys() {
        env::set_var("BURNISH_MAX_ITERATIONS", "5");
        env::set_var("BURNISH_APPROVAL_THRESHOLD", "9");
        let s = Settings::from_env().unwrap();
        env::remove_var("BURNISH_MAX_ITERATIONS");
        env::remove_var("BURNISH_APPROVAL_THRESHOLD");

        assert_eq!(s.max_iterations, 5);
        assert_eq!(s.approval_threshold, 9);
        // Unset keys fall back to defaults.
        assert_eq!(s.stage_timeout_secs, 60);
    }

    #[test]
    fn settings_from_env_rejects_garbage() {
        env::set_var("BURNISH_STAGE_TIMEOUT_SECS", "soon");
        let result = Settings::from_env();
        env::remove_var("BURNISH_STAGE_TIMEOUT_SECS");

        assert!(matches!(
            result,
            Err(LoadError::InvalidValue {
                key: ENV_STAGE_TIMEOUT_SECS,
                ..
            })
        ));
    }
}
