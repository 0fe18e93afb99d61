use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset. Scoped to this crate's targets
/// (`signal::*` and the `signal_agent` binary) so dependency noise stays out.
pub fn default_directive(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "signal=debug"
    } else if quiet {
        "signal=warn"
    } else {
        "signal=info"
    }
}

/// Install the fmt subscriber on stderr; stdout carries the agent's text.
pub fn init(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();
}
