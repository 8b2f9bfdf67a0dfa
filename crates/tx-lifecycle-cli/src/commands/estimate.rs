use std::path::PathBuf;

use clap::Parser;
use cosmos_tx_lifecycle::chain::cosmos::types::tx::UnsignedTx;
use cosmos_tx_lifecycle::config::Config;
use eyre::eyre;

use crate::commands::send::bank_send;
use crate::commands::{build_controller, load_signer, SignModeArg};
use crate::output::Output;

#[derive(Debug, Parser)]
pub struct EstimateCmd {
    #[clap(
        long = "key-file",
        required = true,
        value_name = "KEY_FILE",
        help_heading = "REQUIRED",
        help = "File holding the hex-encoded secp256k1 secret key of the sender"
    )]
    key_file: PathBuf,

    #[clap(
        long = "to",
        required = true,
        value_name = "ADDRESS",
        help_heading = "REQUIRED",
        help = "Bech32 address of the recipient"
    )]
    to: String,

    #[clap(
        long = "amount",
        required = true,
        value_name = "AMOUNT",
        help_heading = "REQUIRED",
        help = "Amount to send, in base units"
    )]
    amount: u64,

    #[clap(
        long = "denom",
        value_name = "DENOM",
        help = "Denomination to send, defaults to the gas price denomination"
    )]
    denom: Option<String>,

    #[clap(
        long = "memo",
        value_name = "MEMO",
        default_value = "",
        help = "Transaction memo"
    )]
    memo: String,
}

impl EstimateCmd {
    pub async fn run(&self, config: &Config, output: &Output) -> eyre::Result<()> {
        let signer = load_signer(config, &self.key_file, SignModeArg::Direct)?;
        let from = signer.address().to_string();

        let controller = build_controller(config, signer)?;

        let denom = self
            .denom
            .as_deref()
            .unwrap_or(&config.chain.gas_price.denom);

        let tx = UnsignedTx::new(
            vec![bank_send(&from, &self.to, self.amount, denom)],
            self.memo.as_str(),
        );

        let fee = controller
            .estimate_fee(&from, &tx)
            .await
            .map_err(|e| eyre!("estimation failed: {e}"))?;

        output.fee(&fee);

        Ok(())
    }
}
