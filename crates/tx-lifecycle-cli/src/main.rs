//! `txctl`: submit Cosmos SDK transactions and follow them until they are
//! finalized by the indexer.

#![forbid(unsafe_code)]

mod commands;
mod components;
mod output;

use std::path::PathBuf;

use clap::Parser;
use eyre::eyre;

use crate::commands::TxCtlCmd;
use crate::output::Output;

#[derive(Debug, Parser)]
#[clap(name = "txctl", version, about = "Submit and track Cosmos SDK transactions")]
struct Cli {
    #[clap(
        long = "config",
        short = 'c',
        value_name = "CONFIG",
        default_value = "txctl.toml",
        global = true,
        help = "Path to the configuration file"
    )]
    config: PathBuf,

    #[clap(
        long = "json",
        global = true,
        help = "Emit logs and results as JSON"
    )]
    json: bool,

    #[clap(subcommand)]
    command: TxCtlCmd,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    components::init_tracing(cli.json)?;

    let config = cosmos_tx_lifecycle::config::load(&cli.config).map_err(|e| {
        eyre!(
            "failed to load configuration from {}: {}",
            cli.config.display(),
            e
        )
    })?;

    cli.command.run(&config, &Output::new(cli.json)).await
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::Cli;
    use crate::commands::TxCtlCmd;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "txctl",
            "send",
            "--key-file",
            "key.hex",
            "--to",
            "cosmos1recipient",
            "--amount",
            "10",
            "--sign-mode",
            "amino",
            "--json",
        ])
        .unwrap();

        assert!(cli.json);
        assert_eq!(cli.config.to_str(), Some("txctl.toml"));
        assert!(matches!(cli.command, TxCtlCmd::Send(_)));
    }
}
