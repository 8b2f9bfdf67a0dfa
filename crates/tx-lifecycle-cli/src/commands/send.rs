use std::path::PathBuf;

use clap::Parser;
use cosmos_tx_lifecycle::chain::cosmos::amino::MSG_SEND_TYPE_URL;
use cosmos_tx_lifecycle::config::Config;
use eyre::eyre;
use ibc_proto::cosmos::bank::v1beta1::MsgSend;
use ibc_proto::cosmos::base::v1beta1::Coin;
use ibc_proto::google::protobuf::Any;
use prost::Message;

use crate::commands::{build_controller, conclude, flush_journal, follow, load_signer, SignModeArg};
use crate::output::Output;

#[derive(Debug, Parser)]
pub struct SendCmd {
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
        help = "Transaction memo, defaults to the configured memo"
    )]
    memo: String,

    #[clap(
        long = "sign-mode",
        value_enum,
        default_value = "direct",
        help = "Sign mode used by the key"
    )]
    sign_mode: SignModeArg,
}

impl SendCmd {
    pub async fn run(&self, config: &Config, output: &Output) -> eyre::Result<()> {
        let signer = load_signer(config, &self.key_file, self.sign_mode)?;
        let from = signer.address().to_string();

        let controller = build_controller(config, signer)?;

        let denom = self
            .denom
            .clone()
            .unwrap_or_else(|| config.chain.gas_price.denom.clone());

        let msg = bank_send(&from, &self.to, self.amount, &denom);

        let handle = controller.submit(&from, vec![msg], &self.memo, vec![]).await;

        if let Some(fee) = handle.fee() {
            output.fee(&fee);
        }

        if handle.state().is_terminal() {
            return conclude(&handle, &handle.lifecycle(), output);
        }

        let hash = match handle.sign_and_broadcast().await {
            Ok(hash) => hash,
            Err(_) if handle.state().is_terminal() => {
                return conclude(&handle, &handle.lifecycle(), output);
            }
            Err(e) => return Err(eyre!("{e}")),
        };

        output.broadcast(&hash);

        let lifecycle = follow(&handle, output).await;
        flush_journal(&controller).await;

        conclude(&handle, &lifecycle, output)
    }
}

pub fn bank_send(from: &str, to: &str, amount: u64, denom: &str) -> Any {
    let msg = MsgSend {
        from_address: from.to_string(),
        to_address: to.to_string(),
        amount: vec![Coin {
            denom: denom.to_string(),
            amount: amount.to_string(),
        }],
    };

    Any {
        type_url: MSG_SEND_TYPE_URL.to_string(),
        value: msg.encode_to_vec(),
    }
}
