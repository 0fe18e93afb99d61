/// Assembly of everything the agent needs for one report: prompt, fixed
/// instructions, tool allowlist, MCP servers and permission settings.
use crate::config::{Credentials, SignalConfig};
use serde_json::{json, Value};
use std::path::PathBuf;

/// Name the Datadog MCP server is registered under; tool names are
/// `mcp__<server>__<tool>`.
pub const DATADOG_SERVER: &str = "datadog";

#[derive(Clone)]
pub struct AgentRequest {
    pub prompt: String,
    pub system_prompt: String,
    pub allowed_tools: Vec<String>,
    /// Contents of the `--mcp-config` file. Holds API keys.
    pub mcp_config: Value,
    /// Contents of `--settings`.
    pub settings: Value,
    /// Directory the agent runs in.
    pub working_dir: PathBuf,
    /// Set as `ANTHROPIC_API_KEY` in the agent's environment.
    pub api_key: String,
}

// Keys live in `mcp_config` and `api_key`; neither is printed.
impl std::fmt::Debug for AgentRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRequest")
            .field("prompt", &self.prompt)
            .field("allowed_tools", &self.allowed_tools)
            .field("working_dir", &self.working_dir)
            .finish_non_exhaustive()
    }
}

impl AgentRequest {
    pub fn build(
        prompt: &str,
        config: &SignalConfig,
        credentials: &Credentials,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            prompt: prompt.to_string(),
            system_prompt: config.agent.system_prompt.clone(),
            allowed_tools: config.agent.allowed_tools.clone(),
            mcp_config: mcp_config(&config.datadog.mcp_url, credentials),
            settings: agent_settings(),
            working_dir: working_dir.into(),
            api_key: credentials.anthropic_api_key.clone(),
        }
    }
}

fn mcp_config(url: &str, credentials: &Credentials) -> Value {
    json!({
        "mcpServers": {
            DATADOG_SERVER: {
                "type": "http",
                "url": url,
                "headers": {
                    "DD-API-KEY": credentials.dd_api_key,
                    "DD-APPLICATION-KEY": credentials.dd_application_key,
                }
            }
        }
    })
}

/// Writes are denied everywhere except `./reports/` under the working directory.
/// `//` prefixes are absolute, `./` relative to the agent's cwd.
fn agent_settings() -> Value {
    json!({
        "permissions": {
            "deny": ["Write(//*)", "Edit(//*)", "Write(~/*)", "Edit(~/*)"],
            "allow": ["Write(./reports/*)", "Edit(./reports/*)"]
        },
        "sandbox": {
            "enabled": true,
            "autoAllowBashIfSandboxed": true,
            "network": {
                "allowLocalBinding": false
            }
        }
    })
}
