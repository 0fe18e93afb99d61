//! Integration tests for the signal-agent and run-signal binaries.
//!
//! The agent and the sandbox runtime are replaced by `sh` scripts configured
//! through signal.toml, so no network access or credentials are needed.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Replies with its prompt (`$0`) as the whole report.
const AGENT_ECHO: &str =
    r#"printf '{"type":"result","subtype":"success","is_error":false,"result":"%s"}\n' "$0""#;

/// Prompts that look like flags but must reach the agent unchanged.
const HYPHEN_PROMPTS: [&str; 3] = [
    "-1h: errors only",
    "--verbose summary please",
    "- bullet list of errors",
];

const AGENT_OK: &str = r#"
printf '%s\n' '{"type":"system","subtype":"init","mcp_servers":[{"name":"datadog","status":"connected"}]}'
printf '%s\n' '{"type":"assistant","message":{"content":[{"type":"tool_use","id":"toolu_1","name":"mcp__datadog__search_logs","input":{"query":"status:error"}}]}}'
printf '%s\n' '{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"toolu_1","content":"0 results"}]}}'
printf '%s\n' '{"type":"assistant","message":{"content":[{"type":"text","text":"All systems nominal."}]}}'
printf '%s\n' '{"type":"result","subtype":"success","is_error":false,"result":"All systems nominal.","num_turns":2}'
"#;

/// A working directory with a signal.toml whose agent is `sh -c <script>`.
struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new(agent_script: &str) -> Self {
        Self::with_sandbox(agent_script, "")
    }

    /// `sandbox_toml` is appended under the `[sandbox]` table.
    fn with_sandbox(agent_script: &str, sandbox_toml: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = format!(
            "[agent]\ncommand = \"sh\"\nargs = [\"-c\", '''{agent_script}''', \"{{prompt}}\"]\n\n[sandbox]\n{sandbox_toml}\n"
        );
        std::fs::write(dir.path().join("signal.toml"), config).unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn reports(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.path().join("data/reports")) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn command(&self, bin: &str) -> Command {
        let mut cmd = Command::new(bin);
        cmd.current_dir(self.path())
            .env_remove("RUST_LOG")
            .env_remove("SIGNAL_CONFIG")
            .env("ANTHROPIC_API_KEY", "sk-ant-test")
            .env("DD_API_KEY", "dd-api-test")
            .env("DD_APPLICATION_KEY", "dd-app-test");
        cmd
    }

    fn runner(&self) -> Command {
        self.command(env!("CARGO_BIN_EXE_signal-agent"))
    }

    fn wrapper(&self) -> Command {
        self.command(env!("CARGO_BIN_EXE_run-signal"))
    }
}

fn run(mut cmd: Command) -> Output {
    cmd.output().expect("failed to execute binary")
}

#[test]
fn test_runner_help() {
    let ws = Workspace::new("exit 0");
    let mut cmd = ws.runner();
    cmd.arg("--help");
    let output = run(cmd);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("signal-agent"));
    assert!(stdout.contains("--dry-run"));
}

#[test]
fn test_report_written_verbatim() {
    let ws = Workspace::new(AGENT_OK);
    let mut cmd = ws.runner();
    cmd.arg("Report on the last hour");
    let output = run(cmd);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let reports = ws.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(
        std::fs::read_to_string(&reports[0]).unwrap(),
        "All systems nominal."
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("All systems nominal."));
    assert!(stdout.contains("Report saved to"));
}

#[test]
fn test_prompt_reaches_agent() {
    let ws = Workspace::new(AGENT_ECHO);
    let mut cmd = ws.runner();
    cmd.arg("Report on the last hour");
    assert!(run(cmd).status.success());

    let reports = ws.reports();
    assert_eq!(
        std::fs::read_to_string(&reports[0]).unwrap(),
        "Report on the last hour"
    );
}

#[test]
fn test_prompt_starting_with_hyphen_reaches_agent() {
    for prompt in HYPHEN_PROMPTS {
        let ws = Workspace::new(AGENT_ECHO);
        let mut cmd = ws.runner();
        cmd.arg(prompt);
        let output = run(cmd);
        assert!(
            output.status.success(),
            "prompt {prompt:?}, stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        assert_eq!(std::fs::read_to_string(&ws.reports()[0]).unwrap(), prompt);
    }
}

#[test]
fn test_runner_reads_config_from_env() {
    let ws = Workspace::new(AGENT_OK);
    std::fs::rename(ws.path().join("signal.toml"), ws.path().join("custom.toml")).unwrap();

    let mut cmd = ws.runner();
    cmd.env("SIGNAL_CONFIG", "custom.toml");
    let output = run(cmd);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(ws.reports().len(), 1);
}

#[test]
fn test_default_prompt() {
    let ws = Workspace::new(AGENT_ECHO);
    assert!(run(ws.runner()).status.success());
    assert_eq!(
        std::fs::read_to_string(&ws.reports()[0]).unwrap(),
        "Report on the last 24 hours."
    );
}

#[test]
fn test_missing_dd_api_key_fails_before_agent() {
    let ws = Workspace::new(&format!("touch agent-was-called\n{AGENT_OK}"));
    let mut cmd = ws.runner();
    cmd.env_remove("DD_API_KEY").arg("Report on the last hour");
    let output = run(cmd);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("DD_API_KEY"));
    assert!(ws.reports().is_empty());
    assert!(!ws.path().join("data/agent-was-called").exists());
    assert!(!ws.path().join("data").exists());
}

#[test]
fn test_agent_failure_writes_no_report() {
    let ws = Workspace::new("echo 'Invalid API key' >&2; exit 1");
    let mut cmd = ws.runner();
    cmd.arg("Report on the last hour");
    let output = run(cmd);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid API key"));
    assert!(ws.reports().is_empty());
}

#[test]
fn test_malformed_config_fails() {
    let ws = Workspace::new(AGENT_OK);
    std::fs::write(ws.path().join("signal.toml"), "[agent\n").unwrap();
    let output = run(ws.runner());
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("signal.toml"));
    assert!(ws.reports().is_empty());
}

#[test]
fn test_dry_run_prints_command_without_running() {
    let ws = Workspace::new("touch agent-was-called");
    let mut cmd = ws.runner();
    cmd.args(["--dry-run", "Report on the last hour"]);
    let output = run(cmd);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Agent command:"));
    assert!(stdout.contains("Report on the last hour"));
    assert!(!stdout.contains("dd-api-test"));
    assert!(!ws.path().join("data/agent-was-called").exists());
}

#[test]
fn test_data_dir_override() {
    let ws = Workspace::new(AGENT_OK);
    let mut cmd = ws.runner();
    cmd.args(["--data-dir", "elsewhere", "p"]);
    assert!(run(cmd).status.success());
    assert!(ws.reports().is_empty());
    assert_eq!(
        std::fs::read_dir(ws.path().join("elsewhere/reports"))
            .unwrap()
            .count(),
        1
    );
}

#[test]
fn test_wrapper_passes_prompt_as_sole_runner_argument() {
    // Fake sandbox runtime: record argv, exit 3.
    let ws = Workspace::with_sandbox(
        AGENT_OK,
        "command = \"sh\"\nargs = [\"fake-srt.sh\"]\n",
    );
    std::fs::write(
        ws.path().join("fake-srt.sh"),
        "for a in \"$@\"; do printf '%s\\n' \"$a\"; done > srt-args.txt\nexit 3\n",
    )
    .unwrap();

    let mut cmd = ws.wrapper();
    cmd.arg("Report on the last hour");
    let output = run(cmd);
    assert_eq!(output.status.code(), Some(3));

    let recorded = std::fs::read_to_string(ws.path().join("srt-args.txt")).unwrap();
    let args: Vec<&str> = recorded.lines().collect();
    assert_eq!(args.len(), 4);
    assert_eq!(args[0], "--settings");
    assert_eq!(args[1], ".srt-settings.json");
    assert_eq!(
        Path::new(args[2]).canonicalize().unwrap(),
        Path::new(env!("CARGO_BIN_EXE_signal-agent"))
            .canonicalize()
            .unwrap()
    );
    assert_eq!(args[3], "Report on the last hour");
}

#[test]
fn test_wrapper_writes_default_settings() {
    let ws = Workspace::with_sandbox(AGENT_OK, "command = \"sh\"\nargs = [\"-c\", \"exit 0\"]\n");
    let output = run(ws.wrapper());
    assert!(output.status.success());

    let settings: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(ws.path().join(".srt-settings.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(
        settings["filesystem"]["allowWrite"],
        serde_json::json!(["./data/reports"])
    );
}

#[test]
fn test_wrapper_keeps_existing_settings() {
    let ws = Workspace::with_sandbox(AGENT_OK, "command = \"sh\"\nargs = [\"-c\", \"exit 0\"]\n");
    std::fs::write(ws.path().join(".srt-settings.json"), "{}").unwrap();
    assert!(run(ws.wrapper()).status.success());
    assert_eq!(
        std::fs::read_to_string(ws.path().join(".srt-settings.json")).unwrap(),
        "{}"
    );
}

#[test]
fn test_wrapper_runs_runner_end_to_end() {
    // Fake sandbox runtime: drop `--settings <file>` and exec the runner.
    let ws = Workspace::with_sandbox(
        AGENT_OK,
        "command = \"sh\"\nargs = [\"fake-srt.sh\"]\n",
    );
    std::fs::write(ws.path().join("fake-srt.sh"), "shift 2\nexec \"$@\"\n").unwrap();

    let mut cmd = ws.wrapper();
    cmd.arg("Report on the last hour");
    let output = run(cmd);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let reports = ws.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(
        std::fs::read_to_string(&reports[0]).unwrap(),
        "All systems nominal."
    );
}

#[test]
fn test_wrapper_propagates_runner_failure() {
    let ws = Workspace::with_sandbox(
        AGENT_OK,
        "command = \"sh\"\nargs = [\"fake-srt.sh\"]\n",
    );
    std::fs::write(ws.path().join("fake-srt.sh"), "shift 2\nexec \"$@\"\n").unwrap();

    let mut cmd = ws.wrapper();
    cmd.env_remove("DD_API_KEY");
    let output = run(cmd);
    assert_eq!(output.status.code(), Some(1));
    assert!(ws.reports().is_empty());
}

#[test]
fn test_wrapper_missing_sandbox_runtime() {
    let ws = Workspace::with_sandbox(AGENT_OK, "command = \"nonexistent-srt-xyz\"\n");
    let output = run(ws.wrapper());
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("nonexistent-srt-xyz"));
    assert!(stderr.contains("not installed"));
}

#[test]
fn test_wrapper_forwards_prompt_starting_with_hyphen() {
    for prompt in HYPHEN_PROMPTS {
        let ws = Workspace::with_sandbox(
            AGENT_ECHO,
            "command = \"sh\"\nargs = [\"fake-srt.sh\"]\n",
        );
        std::fs::write(ws.path().join("fake-srt.sh"), "shift 2\nexec \"$@\"\n").unwrap();

        let mut cmd = ws.wrapper();
        cmd.arg(prompt);
        let output = run(cmd);
        assert!(
            output.status.success(),
            "prompt {prompt:?}, stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        assert_eq!(std::fs::read_to_string(&ws.reports()[0]).unwrap(), prompt);
    }
}

#[test]
fn test_wrapper_passes_custom_config_to_runner() {
    let ws = Workspace::with_sandbox(
        AGENT_OK,
        "command = \"sh\"\nargs = [\"fake-srt.sh\"]\n",
    );
    std::fs::write(ws.path().join("fake-srt.sh"), "shift 2\nexec \"$@\"\n").unwrap();
    // Only custom.toml exists; the runner falls back to `claude` without it.
    let config = std::fs::read_to_string(ws.path().join("signal.toml")).unwrap();
    std::fs::write(
        ws.path().join("custom.toml"),
        format!("{config}\n[reports]\ndata_dir = \"custom-data\"\n"),
    )
    .unwrap();
    std::fs::remove_file(ws.path().join("signal.toml")).unwrap();

    let mut cmd = ws.wrapper();
    cmd.args(["-c", "custom.toml", "Report on the last hour"]);
    let output = run(cmd);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    assert!(ws.reports().is_empty());
    let custom: Vec<_> = std::fs::read_dir(ws.path().join("custom-data/reports"))
        .unwrap()
        .collect();
    assert_eq!(custom.len(), 1);

    let settings: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(ws.path().join(".srt-settings.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(
        settings["filesystem"]["allowWrite"],
        serde_json::json!(["./custom-data/reports"])
    );
}
