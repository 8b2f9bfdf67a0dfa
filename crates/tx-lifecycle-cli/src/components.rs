use eyre::eyre;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::FmtSubscriber;

/// The name of the environment variable through which one can override
/// the default tracing filter.
const TXCTL_LOG_VAR: &str = "RUST_LOG";

/// The crates targeted by the default log level.
const TARGET_CRATES: [&str; 2] = ["cosmos_tx_lifecycle", "txctl"];

/// Install the global subscriber: pretty output on stderr, or JSON on stdout
/// without colors when `json` is set.
pub fn init_tracing(json: bool) -> eyre::Result<()> {
    let filter = build_tracing_filter()?;

    let builder = FmtSubscriber::builder()
        .with_target(false)
        .with_env_filter(filter)
        .with_thread_ids(true);

    let initialized = if json {
        builder
            .with_writer(std::io::stdout)
            .with_ansi(false)
            .json()
            .finish()
            .try_init()
    } else {
        builder
            .with_writer(std::io::stderr)
            .with_ansi(enable_ansi())
            .finish()
            .try_init()
    };

    initialized.map_err(|e| eyre!("failed to install tracing subscriber: {e}"))
}

/// Check if both stdout and stderr are proper terminals, so that colored
/// output is only enabled when nothing is redirected.
fn enable_ansi() -> bool {
    use std::io::IsTerminal;
    std::io::stdout().is_terminal() && std::io::stderr().is_terminal()
}

fn default_directive() -> String {
    TARGET_CRATES
        .iter()
        .map(|c| format!("{c}=info"))
        .collect::<Vec<_>>()
        .join(",")
}

fn build_tracing_filter() -> eyre::Result<EnvFilter> {
    let directive = std::env::var(TXCTL_LOG_VAR).unwrap_or_else(|_| default_directive());

    EnvFilter::try_new(&directive)
        .map_err(|e| eyre!("invalid log filtering directive {directive:?}: {e}"))
}
