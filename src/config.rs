use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "signal.toml";

/// Environment variable naming the config file. The sandbox wrapper sets it
/// so the runner sees the same config without extra arguments.
pub const CONFIG_ENV: &str = "SIGNAL_CONFIG";

/// Instructions handed to the agent alongside the user's prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are Signal, a system monitoring agent that uses Datadog observability data.
Your job is to analyze logs and metrics to report on system health.

Unless specified otherwise, report on changes since the last report. If there is no last report, report on the last 24 hours.

You have a working directory where you can read files to maintain context
and read previous reports under reports/.

Break reports into 2 sections:
1. Summary - short paragraph for Slack
2. Details - longer analysis for thread

Reply with the finished report as your final message.
";

/// Errors raised while loading configuration or credentials.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingCredential(&'static str),
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Top-level configuration loaded from signal.toml.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SignalConfig {
    pub agent: AgentConfig,
    pub datadog: DatadogConfig,
    pub reports: ReportsConfig,
    pub sandbox: SandboxConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub command: String,
    pub args: Vec<String>,
    pub system_prompt: String,
    pub allowed_tools: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatadogConfig {
    pub mcp_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    pub data_dir: PathBuf,
    pub extension: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub command: String,
    /// Arguments placed before `--settings`, e.g. when `command` is `npx`.
    pub args: Vec<String>,
    pub settings: PathBuf,
    pub runner: Option<PathBuf>,
    pub allowed_domains: Vec<String>,
}

impl SignalConfig {
    /// Load config from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// API keys read from the environment at startup.
#[derive(Clone)]
pub struct Credentials {
    pub anthropic_api_key: String,
    pub dd_api_key: String,
    pub dd_application_key: String,
}

// Keys never reach logs through Debug.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").finish_non_exhaustive()
    }
}

impl Credentials {
    pub const ANTHROPIC_API_KEY: &'static str = "ANTHROPIC_API_KEY";
    pub const DD_API_KEY: &'static str = "DD_API_KEY";
    pub const DD_APPLICATION_KEY: &'static str = "DD_APPLICATION_KEY";

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build credentials from an arbitrary variable lookup. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingCredential(name))
        };
        Ok(Self {
            anthropic_api_key: get(Self::ANTHROPIC_API_KEY)?,
            dd_api_key: get(Self::DD_API_KEY)?,
            dd_application_key: get(Self::DD_APPLICATION_KEY)?,
        })
    }
}

// --- Default implementations ---

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            args: [
                "-p",
                "{prompt}",
                "--verbose",
                "--output-format",
                "stream-json",
                "--system-prompt",
                "{system_prompt}",
                "--mcp-config",
                "{mcp_config}",
                "--allowedTools",
                "{allowed_tools}",
                "--permission-mode",
                "acceptEdits",
                "--settings",
                "{settings}",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            allowed_tools: ["Read", "Write", "Glob", "Bash", "mcp__datadog__*"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for DatadogConfig {
    fn default() -> Self {
        Self {
            mcp_url: "https://mcp.datadoghq.com/api/unstable/mcp-server/mcp".to_string(),
        }
    }
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            extension: "md".to_string(),
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            command: "srt".to_string(),
            args: Vec::new(),
            settings: PathBuf::from(".srt-settings.json"),
            runner: None,
            allowed_domains: vec![
                "api.anthropic.com".to_string(),
                "mcp.datadoghq.com".to_string(),
            ],
        }
    }
}
