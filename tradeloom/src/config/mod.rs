//! Typed configuration: LLM settings, workflow bounds, per-agent MCP
//! permissions (all from environment variables) and the MCP server table
//! (from a JSON config file).
//!
//! Environment is expected to be bootstrapped beforehand (the CLI runs the
//! `config` crate's `load_and_apply` so `.env` and the user config file land
//! in the process env). `Settings::from_env` is then a pure read.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::workflow::AGENT_NAMES;

/// Default per-call timeout for MCP tools (seconds).
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 600;

/// Configuration error: fatal at startup, before any session log exists.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(&'static str),
    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("read MCP config {path}: {source}")]
    McpRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse MCP config {path}: {source}")]
    McpParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// LLM connection settings, loaded from `LLM_*` environment variables.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Workflow bounds, shape and logging flags.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub max_debate_rounds: u32,
    pub max_risk_debate_rounds: u32,
    /// Schedule the extended analysts (company overview, shareholder,
    /// product) between fundamentals and the debate. `EXTENDED_ANALYSTS` env.
    pub extended_analysts: bool,
    pub debug_mode: bool,
    pub verbose_logging: bool,
}

/// Per-agent MCP permission table: agent name → enabled.
///
/// Sourced from `<AGENT_NAME_UPPERCASED>_MCP_ENABLED` variables, default
/// false. Permissions are agent-level, not tool-level: an enabled agent sees
/// the whole catalog. Immutable for the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentPermissions {
    permissions: BTreeMap<String, bool>,
}

impl AgentPermissions {
    /// Loads the permission table from the environment for every cataloged agent.
    pub fn from_env() -> Self {
        let mut permissions = BTreeMap::new();
        for agent in AGENT_NAMES {
            let var = format!("{}_MCP_ENABLED", agent.to_uppercase());
            let enabled = std::env::var(&var)
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false);
            permissions.insert((*agent).to_string(), enabled);
        }
        Self { permissions }
    }

    /// Builds a table where the listed agents are enabled and all others are not.
    pub fn enable_only<I, S>(agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut permissions: BTreeMap<String, bool> = AGENT_NAMES
            .iter()
            .map(|a| ((*a).to_string(), false))
            .collect();
        for agent in agents {
            permissions.insert(agent.into(), true);
        }
        Self { permissions }
    }

    /// True when the agent may use MCP tools. Unknown agents default to false.
    pub fn is_enabled(&self, agent_name: &str) -> bool {
        self.permissions.get(agent_name).copied().unwrap_or(false)
    }

    /// Agents with MCP enabled, sorted by name.
    pub fn enabled_agents(&self) -> Vec<String> {
        self.permissions
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// The full table, for diagnostics.
    pub fn as_map(&self) -> &BTreeMap<String, bool> {
        &self.permissions
    }
}

/// Everything the orchestrator needs to run, short of the MCP server table.
#[derive(Debug, Clone)]
pub struct Settings {
    pub llm: LlmSettings,
    pub workflow: WorkflowSettings,
    pub permissions: AgentPermissions,
    /// Directory for session logs (`<dump_dir>/session_<id>.json`).
    pub dump_dir: PathBuf,
}

fn env_or<'a>(key: &'static str, default: &'a str) -> std::borrow::Cow<'a, str> {
    match std::env::var(key) {
        Ok(v) => std::borrow::Cow::Owned(v),
        Err(_) => std::borrow::Cow::Borrowed(default),
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { key, value: v }),
        Err(_) => Ok(default),
    }
}

fn bool_env(key: &'static str) -> bool {
    std::env::var(key)
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(false)
}

impl Settings {
    /// Reads settings from the environment. `LLM_API_KEY` is required;
    /// everything else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key =
            std::env::var("LLM_API_KEY").map_err(|_| ConfigError::MissingEnv("LLM_API_KEY"))?;

        Ok(Self {
            llm: LlmSettings {
                api_key,
                base_url: env_or("LLM_BASE_URL", "https://api.openai.com/v1").into_owned(),
                model: env_or("LLM_MODEL", "gpt-4").into_owned(),
                temperature: parse_env("LLM_TEMPERATURE", 0.1)?,
                max_tokens: parse_env("LLM_MAX_TOKENS", 4000)?,
            },
            workflow: WorkflowSettings {
                max_debate_rounds: parse_env("MAX_DEBATE_ROUNDS", 3)?,
                max_risk_debate_rounds: parse_env("MAX_RISK_DEBATE_ROUNDS", 2)?,
                extended_analysts: bool_env("EXTENDED_ANALYSTS"),
                debug_mode: bool_env("DEBUG_MODE"),
                verbose_logging: bool_env("VERBOSE_LOGGING"),
            },
            permissions: AgentPermissions::from_env(),
            dump_dir: PathBuf::from(env_or("DUMP_DIR", "dump").into_owned()),
        })
    }
}

/// MCP transport kind for one configured server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpTransport {
    Sse,
    Stdio,
    Http,
}

/// One MCP server entry from the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Endpoint URL for http/sse, or the command line for stdio.
    pub url: String,
    pub transport: McpTransport,
    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_TOOL_TIMEOUT_SECS
}

impl McpServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// The MCP config file: `{"servers": {<name>: {...}}}`.
///
/// Server iteration order is the map's sorted key order so discovery and the
/// catalog are deterministic across runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default)]
    pub servers: BTreeMap<String, McpServerConfig>,
}

impl McpConfig {
    /// Loads the config file. A missing file yields the empty config (the
    /// run proceeds in no-tool mode); a malformed file is a fatal error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "MCP config not found, running without tools");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::McpRead {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        serde_json::from_str(&content).map_err(|e| ConfigError::McpParse {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
