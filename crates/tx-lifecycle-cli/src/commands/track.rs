use core::str::FromStr;
use std::sync::Arc;

use clap::Parser;
use cosmos_tx_lifecycle::config::Config;
use eyre::eyre;
use tendermint::Hash as TxHash;

use crate::commands::{build_controller, conclude, flush_journal, follow, WatchOnly};
use crate::output::Output;

#[derive(Debug, Parser)]
pub struct TrackCmd {
    #[clap(
        value_name = "HASH",
        help = "Hex hash of the transaction to follow"
    )]
    hash: String,

    #[clap(
        long = "signer",
        value_name = "ADDRESS",
        default_value = "",
        help = "Address of the signer, recorded in the journal"
    )]
    signer: String,
}

impl TrackCmd {
    pub async fn run(&self, config: &Config, output: &Output) -> eyre::Result<()> {
        let hash = TxHash::from_str(&self.hash.to_uppercase())
            .map_err(|e| eyre!("invalid transaction hash {}: {e}", self.hash))?;

        let controller = build_controller(config, Arc::new(WatchOnly))?;

        let handle = controller.track(&self.signer, hash);

        let lifecycle = follow(&handle, output).await;
        flush_journal(&controller).await;

        conclude(&handle, &lifecycle, output)
    }
}
