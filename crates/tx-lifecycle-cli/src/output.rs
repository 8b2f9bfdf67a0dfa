use cosmos_tx_lifecycle::chain::cosmos::gas::PrettyFee;
use cosmos_tx_lifecycle::lifecycle::{Lifecycle, TxHandle};
use cosmos_tx_lifecycle::TxLifecycleState;
use ibc_proto::cosmos::tx::v1beta1::Fee;
use serde_json::json;
use tendermint::Hash as TxHash;

/// Prints command results on stdout, as text or as one JSON object per line.
#[derive(Copy, Clone, Debug)]
pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn fee(&self, fee: &Fee) {
        if self.json {
            let amount: Vec<_> = fee
                .amount
                .iter()
                .map(|c| json!({ "denom": c.denom, "amount": c.amount }))
                .collect();

            println!(
                "{}",
                json!({ "fee": { "amount": amount, "gas_limit": fee.gas_limit } })
            );
        } else {
            println!("fee: {}", PrettyFee(fee));
        }
    }

    pub fn broadcast(&self, hash: &TxHash) {
        if self.json {
            println!("{}", json!({ "tx_hash": hash.to_string() }));
        } else {
            println!("broadcast: {hash}");
        }
    }

    pub fn state(&self, handle: &TxHandle, state: TxLifecycleState) {
        let hash = handle.tx_hash().map(|h| h.to_string());

        if self.json {
            println!("{}", json!({ "tx_hash": hash, "state": state }));
        } else {
            println!("{}: {}", hash.as_deref().unwrap_or("<unsigned>"), state);
        }
    }

    pub fn outcome(&self, handle: &TxHandle, lifecycle: &Lifecycle) {
        let hash = handle.tx_hash().map(|h| h.to_string());

        if self.json {
            let error = lifecycle.error.as_ref().map(|e| {
                json!({ "kind": e.kind, "message": e.message })
            });

            println!(
                "{}",
                json!({ "tx_hash": hash, "state": lifecycle.state, "error": error })
            );
        } else if let Some(error) = &lifecycle.error {
            println!("{}: {}", hash.as_deref().unwrap_or("<unsigned>"), error);
        }
    }

    pub fn message(&self, message: &str) {
        if self.json {
            println!("{}", json!({ "message": message }));
        } else {
            println!("{message}");
        }
    }
}
