/// Re-executing the runner under the `srt` sandbox runtime.
///
/// The settings record is written once and then left to the user; the
/// sandbox runtime is the only thing that reads it.
use crate::config::{SignalConfig, CONFIG_ENV};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tokio::process::Command;

/// Name of the runner binary looked up next to the wrapper.
pub const RUNNER_BIN: &str = "signal-agent";

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("sandbox runtime `{command}` is not installed or not on PATH")]
    RuntimeMissing { command: String },
    #[error("failed to start sandbox runtime `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("failed waiting for sandboxed runner: {source}")]
    Wait { source: std::io::Error },
    #[error("failed to write sandbox settings {}: {source}", path.display())]
    Settings {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot locate runner binary: {source}")]
    Runner { source: std::io::Error },
}

/// Static settings record consumed by `srt --settings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxPolicy {
    pub network: NetworkPolicy,
    pub filesystem: FilesystemPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPolicy {
    pub allowed_domains: Vec<String>,
    pub denied_domains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesystemPolicy {
    pub deny_read: Vec<String>,
    pub allow_write: Vec<String>,
    pub deny_write: Vec<String>,
}

impl SandboxPolicy {
    /// The reports directory is the only writable path.
    pub fn for_reports(config: &SignalConfig) -> Self {
        let reports = config.reports.data_dir.join("reports");
        let mut reports = reports.to_string_lossy().into_owned();
        if config.reports.data_dir.is_relative() {
            reports = format!("./{reports}");
        }
        Self {
            network: NetworkPolicy {
                allowed_domains: config.sandbox.allowed_domains.clone(),
                denied_domains: Vec::new(),
            },
            filesystem: FilesystemPolicy {
                deny_read: vec!["~/.ssh".to_string(), "~/.aws".to_string()],
                allow_write: vec![reports],
                deny_write: vec![".env".to_string()],
            },
        }
    }
}

/// Write `policy` to `path` unless a settings file already exists.
/// Returns Ok(true) if the file was written.
pub fn ensure_settings(path: &Path, policy: &SandboxPolicy) -> Result<bool, SandboxError> {
    if path.exists() {
        return Ok(false);
    }
    let settings_err = |e: std::io::Error| SandboxError::Settings {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(settings_err)?;
    }
    let json = serde_json::to_string_pretty(policy).map_err(|e| settings_err(e.into()))?;
    std::fs::write(path, json + "\n").map_err(settings_err)?;
    tracing::info!(path = %path.display(), "wrote default sandbox settings");
    Ok(true)
}

/// The configured runner, or `signal-agent` next to the current executable.
pub fn resolve_runner(config: &SignalConfig) -> Result<PathBuf, SandboxError> {
    if let Some(runner) = &config.sandbox.runner {
        return Ok(runner.clone());
    }
    let exe = std::env::current_exe().map_err(|e| SandboxError::Runner { source: e })?;
    let dir = exe.parent().ok_or_else(|| SandboxError::Runner {
        source: std::io::Error::other("executable has no parent directory"),
    })?;
    Ok(dir.join(format!("{RUNNER_BIN}{}", std::env::consts::EXE_SUFFIX)))
}

/// `[<srt>, <args>.., --settings, <settings>, <runner>, <prompt>]`. The
/// prompt is the runner's only argument.
pub fn build_command(
    config: &SignalConfig,
    settings: &Path,
    runner: &Path,
    prompt: &str,
) -> Vec<OsString> {
    let mut argv = vec![OsString::from(&config.sandbox.command)];
    argv.extend(config.sandbox.args.iter().map(OsString::from));
    argv.extend([
        OsString::from("--settings"),
        settings.as_os_str().to_owned(),
        runner.as_os_str().to_owned(),
        OsString::from(prompt),
    ]);
    argv
}

/// Exit code of a finished child; death by signal maps to `128 + signo`.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return 128 + sig;
        }
    }
    1
}

/// Spawn the runner under the sandbox runtime with the inherited environment
/// and stdio, wait, and return its exit code. `config_path` reaches the
/// runner through `SIGNAL_CONFIG` so both sides read the same file.
pub async fn run_sandboxed(argv: &[OsString], config_path: &Path) -> Result<i32, SandboxError> {
    let Some((program, args)) = argv.split_first() else {
        return Err(SandboxError::RuntimeMissing {
            command: String::new(),
        });
    };
    let command = program.to_string_lossy().into_owned();
    tracing::info!(
        command = %command,
        args = ?args,
        config = %config_path.display(),
        "starting sandboxed runner"
    );

    let mut child = Command::new(program)
        .args(args)
        .env(CONFIG_ENV, config_path)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SandboxError::RuntimeMissing {
                    command: command.clone(),
                }
            } else {
                SandboxError::Spawn {
                    command: command.clone(),
                    source: e,
                }
            }
        })?;

    let status = child
        .wait()
        .await
        .map_err(|e| SandboxError::Wait { source: e })?;
    let code = exit_code(status);
    tracing::info!(exit_code = code, "sandboxed runner exited");
    Ok(code)
}
