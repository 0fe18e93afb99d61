/// One report run: prompt in, report file out.
use crate::agent::{run_agent, AgentError, AgentOutput};
use crate::config::{ConfigError, Credentials, SignalConfig};
use crate::data_dir::DataDir;
use crate::report::{write_report, Report, ReportError};
use crate::request::AgentRequest;
use std::path::PathBuf;
use tracing::Instrument;

/// Prompt used when none is given on the command line.
pub const DEFAULT_PROMPT: &str = "Report on the last 24 hours.";

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("failed to create data directory {}: {source}", path.display())]
    DataDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Run the agent for `prompt` and persist its report.
///
/// The report file is written only after the agent has finished
/// successfully; any failure leaves the reports directory untouched.
pub async fn run(
    prompt: &str,
    config: &SignalConfig,
    credentials: &Credentials,
) -> Result<PathBuf, RunError> {
    let data_dir = DataDir::new(&config.reports.data_dir);
    if data_dir.init().map_err(|e| RunError::DataDir {
        path: data_dir.root().to_path_buf(),
        source: e,
    })? {
        tracing::info!(path = %data_dir.root().display(), "created data directory");
    }

    let request = AgentRequest::build(prompt, config, credentials, data_dir.root());

    let session = tracing::info_span!("signal-session");
    let output = async {
        let agent_span = tracing::info_span!("signal-agent", prompt = %prompt);
        let output = run_agent(&config.agent, &request)
            .instrument(agent_span.clone())
            .await?;
        agent_span.in_scope(|| record_tool_calls(&output));
        Ok::<_, RunError>(output)
    }
    .instrument(session)
    .await?;

    let report = Report::new(output.text);
    let path = write_report(&data_dir, &report, &config.reports.extension)?;
    Ok(path)
}

/// Emit one event per tool call with its timing, after the session so
/// the events are not interleaved with the agent's streamed text.
fn record_tool_calls(output: &AgentOutput) {
    for call in output.transcript.tool_calls() {
        tracing::info!(
            tool = %call.name,
            duration_ms = call.duration().map(|d| d.as_millis() as u64),
            is_error = call.is_error,
            "tool call"
        );
        tracing::debug!(
            tool = %call.name,
            input = %call.input,
            output = ?call.output,
            "tool call detail"
        );
    }
    if let Some(result) = output.transcript.result() {
        tracing::info!(
            turns = result.num_turns,
            cost_usd = result.total_cost_usd,
            duration_secs = output.duration.as_secs(),
            "agent finished"
        );
    }
}
