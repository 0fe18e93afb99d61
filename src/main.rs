use clap::Parser;
use signal::agent::describe_command;
use signal::config::{Credentials, SignalConfig, CONFIG_ENV, DEFAULT_CONFIG_FILE};
use signal::request::AgentRequest;
use signal::runner::{self, RunError, DEFAULT_PROMPT};
use std::path::PathBuf;
use std::process::ExitCode;

/// Ask an AI agent to analyze Datadog logs and metrics and write a system
/// health report to data/reports/.
#[derive(Parser, Debug)]
#[command(name = "signal-agent", version, about)]
pub struct Cli {
    /// What to report on
    #[arg(value_name = "PROMPT", default_value = DEFAULT_PROMPT, allow_hyphen_values = true)]
    prompt: String,

    /// Config file path
    #[arg(short, long, env = CONFIG_ENV, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Data directory (overrides config)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Check credentials and config, print the agent command, don't run
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (tool call inputs and outputs)
    #[arg(short, long)]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    // Variables already in the environment win over .env.
    let dotenv = dotenvy::dotenv();

    signal::logging::init(cli.verbose, cli.quiet);
    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded .env");
    }
    tracing::debug!(?cli, "parsed CLI arguments");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "run failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), RunError> {
    let mut config = SignalConfig::load(&cli.config)?;
    if let Some(dir) = cli.data_dir {
        config.reports.data_dir = dir;
    }
    // Before anything touches the network.
    let credentials = Credentials::from_env()?;

    if cli.dry_run {
        let request = AgentRequest::build(
            &cli.prompt,
            &config,
            &credentials,
            &config.reports.data_dir,
        );
        println!("Config file: {}", cli.config.display());
        println!("Data directory: {}", config.reports.data_dir.display());
        println!("Agent command:");
        for arg in describe_command(&config.agent, &request) {
            println!("  {arg}");
        }
        return Ok(());
    }

    let path = runner::run(&cli.prompt, &config, &credentials).await?;
    println!("Report saved to {}", path.display());
    Ok(())
}
