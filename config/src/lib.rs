//! Load configuration from a user-level `config.toml` and a project `.env`, then
//! apply both to the process environment with priority: **existing env > .env > config.toml**.
//!
//! The analysis engine reads everything (LLM credentials, debate bounds, per-agent
//! MCP toggles) from environment variables, so this crate is the single bootstrap
//! step the CLI runs before building `Settings`.

mod dotenv;
mod user_toml;

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("read user config: {0}")]
    UserRead(std::io::Error),
    #[error("parse user config toml: {0}")]
    UserParse(#[from] toml::de::Error),
    #[error("read .env: {0}")]
    DotenvRead(std::io::Error),
}

/// Loads the `[env]` table from `~/.config/<app_name>/config.toml` and the project
/// `.env`, then sets environment variables only for keys that are **not** already
/// set, so the existing process environment always wins.
///
/// Precedence for a key missing from the process environment:
/// 1. Value from the project `.env` (current directory, or `override_dir` if given)
/// 2. Value from the user `config.toml` `[env]` table
///
/// * `app_name`: used for the user config path `~/.config/<app_name>/config.toml`.
/// * `override_dir`: if `Some`, look for `.env` there instead of the current directory.
pub fn load_and_apply(app_name: &str, override_dir: Option<&Path>) -> Result<(), LoadError> {
    let user_map = user_toml::load_env_map(app_name)?;
    let dotenv_map = dotenv::load_env_map(override_dir).map_err(LoadError::DotenvRead)?;

    let mut keys: std::collections::HashSet<String> = user_map.keys().cloned().collect();
    keys.extend(dotenv_map.keys().cloned());

    for key in keys {
        if std::env::var(&key).is_ok() {
            continue; // existing env wins
        }
        if let Some(v) = dotenv_map.get(&key).or_else(|| user_map.get(&key)) {
            std::env::set_var(&key, v);
        }
    }

    Ok(())
}

/// Serializes tests that mutate process-wide environment variables.
#[cfg(test)]
pub(crate) static ENV_TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
