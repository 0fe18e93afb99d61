/// Single agent invocation: spawn the agent subprocess, stream its
/// `stream-json` output into a transcript, and report the outcome.
use crate::config::{AgentConfig, Credentials};
use crate::ratelimit::detect_rate_limit_in_text;
use crate::request::AgentRequest;
use crate::stream::Transcript;
use std::io::Write;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

/// Stderr kept for error messages is cut to this many trailing bytes.
const STDERR_TAIL_BYTES: usize = 2000;

/// Result of a completed, successful agent session.
#[derive(Debug)]
pub struct AgentOutput {
    /// The report text.
    pub text: String,
    pub transcript: Transcript,
    /// Wall-clock duration of the session.
    pub duration: Duration,
}

/// Errors that can occur while invoking the agent.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("failed to write MCP config: {source}")]
    McpConfig { source: std::io::Error },
    #[error("failed to spawn agent `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("I/O error during agent session: {source}")]
    Io { source: std::io::Error },
    #[error("agent exited with {}: {stderr}", exit_label(.code))]
    Exited { code: Option<i32>, stderr: String },
    #[error("agent reported failure ({subtype}): {message}")]
    Failed { subtype: String, message: String },
    #[error("agent was rate limited: {detail}")]
    RateLimited { detail: String },
    #[error("agent output ended without a result")]
    NoResult,
    #[error("agent returned an empty report")]
    EmptyReport,
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "no status (killed by signal)".to_string(),
    }
}

/// Expand `{name}` placeholders in a single pass. Unknown names and
/// unmatched braces are kept literally, and substituted text is never
/// rescanned, so a prompt containing `{settings}` stays intact.
fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| (*v, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Build the command arguments, replacing placeholders with request values.
fn build_args(
    agent_config: &AgentConfig,
    request: &AgentRequest,
    mcp_config_path: &str,
) -> Vec<String> {
    let allowed_tools = request.allowed_tools.join(",");
    let settings = request.settings.to_string();
    let vars = [
        ("prompt", request.prompt.as_str()),
        ("system_prompt", request.system_prompt.as_str()),
        ("mcp_config", mcp_config_path),
        ("allowed_tools", allowed_tools.as_str()),
        ("settings", settings.as_str()),
    ];
    agent_config
        .args
        .iter()
        .map(|arg| substitute(arg, &vars))
        .collect()
}

/// The command line the agent would be started with, for `--dry-run`.
pub fn describe_command(agent_config: &AgentConfig, request: &AgentRequest) -> Vec<String> {
    let mut cmd = vec![agent_config.command.clone()];
    cmd.extend(build_args(agent_config, request, "<mcp-config-file>"));
    cmd
}

/// Write the MCP config to a private temp file so API keys stay out of argv.
fn write_mcp_config(request: &AgentRequest) -> std::io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("signal-mcp-")
        .suffix(".json")
        .tempfile()?;
    serde_json::to_writer(&mut file, &request.mcp_config)?;
    file.flush()?;
    Ok(file)
}

fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

/// Spawn the agent, stream its output, and wait for it to exit.
///
/// Assistant text is echoed to stdout as it arrives. The session succeeds
/// only if the process exits 0, the stream carries a non-error `result`
/// event, and the collected text is non-empty.
pub async fn run_agent(
    agent_config: &AgentConfig,
    request: &AgentRequest,
) -> Result<AgentOutput, AgentError> {
    let mcp_file = write_mcp_config(request).map_err(|e| AgentError::McpConfig { source: e })?;
    let mcp_path = mcp_file.path().display().to_string();
    let args = build_args(agent_config, request, &mcp_path);

    tracing::info!(
        command = %agent_config.command,
        cwd = %request.working_dir.display(),
        tools = ?request.allowed_tools,
        "spawning agent session"
    );

    let start = Instant::now();

    let mut child = Command::new(&agent_config.command)
        .args(&args)
        .current_dir(&request.working_dir)
        .env(Credentials::ANTHROPIC_API_KEY, &request.api_key)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| AgentError::Spawn {
            command: agent_config.command.clone(),
            source: e,
        })?;

    let pid = child.id().unwrap_or(0);
    tracing::info!(pid, "agent subprocess started");

    let stdout = child.stdout.take().ok_or_else(|| AgentError::Io {
        source: std::io::Error::other("agent stdout not captured"),
    })?;
    let mut stderr = child.stderr.take().ok_or_else(|| AgentError::Io {
        source: std::io::Error::other("agent stderr not captured"),
    })?;

    let read_stdout = async {
        let mut transcript = Transcript::new();
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            for text in transcript.ingest_line(&line, Instant::now()) {
                println!("{text}");
            }
        }
        Ok::<_, std::io::Error>(transcript)
    };
    let read_stderr = async {
        let mut buf = Vec::new();
        stderr.read_to_end(&mut buf).await?;
        Ok::<_, std::io::Error>(String::from_utf8_lossy(&buf).into_owned())
    };

    let (transcript, stderr_text) = tokio::join!(read_stdout, read_stderr);
    let transcript = transcript.map_err(|e| AgentError::Io { source: e })?;
    let stderr_text = stderr_text.map_err(|e| AgentError::Io { source: e })?;

    let status = child
        .wait()
        .await
        .map_err(|e| AgentError::Io { source: e })?;
    // Keys are no longer needed once the agent has exited.
    drop(mcp_file);

    let duration = start.elapsed();
    let exit_code = status.code();
    tracing::info!(
        exit_code = ?exit_code,
        tool_calls = transcript.tool_calls().len(),
        duration_secs = duration.as_secs(),
        "agent session completed"
    );

    check_outcome(exit_code, &stderr_text, &transcript)?;

    let text = transcript.text();
    if text.trim().is_empty() {
        return Err(AgentError::EmptyReport);
    }
    Ok(AgentOutput {
        text,
        transcript,
        duration,
    })
}

/// Classify a finished session. Rate limits take precedence so the user
/// sees why the run stopped.
fn check_outcome(
    exit_code: Option<i32>,
    stderr: &str,
    transcript: &Transcript,
) -> Result<(), AgentError> {
    let result = transcript.result();
    let failed = exit_code != Some(0) || result.map_or(true, |r| r.is_error);
    if !failed {
        return Ok(());
    }

    let result_text = result.and_then(|r| r.result.as_deref()).unwrap_or_default();
    let detail = if stderr.trim().is_empty() {
        result_text.trim()
    } else {
        tail(stderr.trim(), STDERR_TAIL_BYTES)
    };
    if detect_rate_limit_in_text(stderr) || detect_rate_limit_in_text(result_text) {
        return Err(AgentError::RateLimited {
            detail: detail.to_string(),
        });
    }

    if exit_code != Some(0) {
        return Err(AgentError::Exited {
            code: exit_code,
            stderr: detail.to_string(),
        });
    }
    match result {
        Some(r) => Err(AgentError::Failed {
            subtype: r.subtype.clone(),
            message: result_text.to_string(),
        }),
        None => Err(AgentError::NoResult),
    }
}
