use clap::Parser;
use signal::config::{SignalConfig, DEFAULT_CONFIG_FILE};
use signal::runner::DEFAULT_PROMPT;
use signal::sandbox::{self, SandboxPolicy};
use std::path::PathBuf;
use std::process::ExitCode;

/// Run signal-agent inside the srt sandbox, with writes limited to the
/// reports directory.
#[derive(Parser, Debug)]
#[command(name = "run-signal", version, about)]
struct Cli {
    /// What to report on, passed unchanged to signal-agent
    #[arg(value_name = "PROMPT", default_value = DEFAULT_PROMPT, allow_hyphen_values = true)]
    prompt: String,

    /// Config file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Extra logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    // Load .env before sandboxing restricts file access; the child inherits it.
    let _ = dotenvy::dotenv();
    signal::logging::init(cli.verbose, !cli.verbose);

    match run(&cli).await {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<i32, Box<dyn std::error::Error>> {
    let config = SignalConfig::load(&cli.config)?;

    let settings = &config.sandbox.settings;
    sandbox::ensure_settings(settings, &SandboxPolicy::for_reports(&config))?;

    let runner = sandbox::resolve_runner(&config)?;
    let argv = sandbox::build_command(&config, settings, &runner, &cli.prompt);
    Ok(sandbox::run_sandboxed(&argv, &cli.config).await?)
}
