use ibc_proto::cosmos::tx::signing::v1beta1::SignMode;
use ibc_proto::cosmos::tx::v1beta1::{Fee, TxRaw};
use tracing::{debug, error, span, Instrument, Level};

use crate::chain::cosmos::encode::{
    auth_info_and_bytes, encode_key_bytes, encode_signer_info, encode_tx_raw, tx_body_and_bytes,
};
use crate::chain::cosmos::gas::{calculate_fee, PrettyFee};
use crate::chain::cosmos::simulate::GasSimulator;
use crate::chain::cosmos::types::account::AccountSequence;
use crate::chain::cosmos::types::tx::UnsignedTx;
use crate::config::LifecycleConfig;
use crate::error::Error;

/// Encodes the transaction submitted for simulation.
///
/// It carries the signer's public key and sequence so that the ante handler
/// charges signature verification gas, but no fee and a single empty
/// signature, which simulation does not check.
pub fn encode_simulation_tx(
    public_key: &[u8],
    sequence: AccountSequence,
    tx: &UnsignedTx,
) -> Result<Vec<u8>, Error> {
    let key_bytes = encode_key_bytes(public_key)?;

    let signer_info = encode_signer_info(SignMode::Unspecified, sequence, key_bytes);

    let (_, body_bytes) = tx_body_and_bytes(tx)?;

    let (_, auth_info_bytes) = auth_info_and_bytes(signer_info, Fee::default())?;

    encode_tx_raw(TxRaw {
        body_bytes,
        auth_info_bytes,
        signatures: vec![Vec::new()],
    })
}

/// Simulate `tx_bytes` and return the gas used.
///
/// There is no fallback gas amount: a failed simulation is an error.
pub async fn estimate_gas(simulator: &dyn GasSimulator, tx_bytes: Vec<u8>) -> Result<u64, Error> {
    let simulated = simulator
        .simulate(tx_bytes)
        .instrument(span!(Level::DEBUG, "estimate_gas"))
        .await;

    match simulated {
        Ok(gas_used) => {
            debug!("tx simulation successful, gas amount used: {}", gas_used);

            Ok(gas_used)
        }

        Err(e) => {
            error!(
                "failed to simulate tx. propagating error to caller: {}",
                e.detail()
            );

            Err(e)
        }
    }
}

/// Converts simulated gas into a fee according to the configured multipliers
/// and gas price, enforcing the optional gas ceiling.
pub fn gas_amount_to_fee(
    config: &LifecycleConfig,
    chain_id: &str,
    gas_used: u64,
) -> Result<Fee, Error> {
    let fee = calculate_fee(
        gas_used,
        config.gas_multiplier.to_f64(),
        &config.gas_price,
        config.fee_multiplier.to_f64(),
    )?;

    if let Some(max_gas) = config.max_gas {
        if fee.gas_limit > max_gas {
            debug!(
                id = %chain_id, estimated = ?fee.gas_limit, max = ?max_gas,
                "estimated gas is higher than max gas"
            );

            return Err(Error::gas_estimate_exceeded(
                chain_id.to_string(),
                fee.gas_limit,
                max_gas,
            ));
        }
    }

    debug!(
        id = %chain_id,
        "using {} gas, fee {}",
        gas_used,
        PrettyFee(&fee)
    );

    Ok(fee)
}

#[cfg(test)]
mod tests {
    use super::*;

    use ibc_proto::cosmos::tx::v1beta1::mode_info::Sum;
    use ibc_proto::google::protobuf::Any;
    use test_log::test;

    use crate::chain::cosmos::encode::decode_tx;
    use crate::config::GasPrice;
    use crate::error::ErrorDetail;

    #[test]
    fn simulation_tx_has_unspecified_mode_and_empty_fee() {
        let tx = UnsignedTx::new(
            vec![Any {
                type_url: "/cosmos.bank.v1beta1.MsgSend".to_string(),
                value: vec![],
            }],
            "memo",
        );

        let bytes = encode_simulation_tx(&[2; 33], AccountSequence::new(4), &tx).unwrap();
        let decoded = decode_tx(&bytes).unwrap();

        let signer_info = &decoded.auth_info.signer_infos[0];
        assert_eq!(signer_info.sequence, 4);
        assert!(signer_info.public_key.is_some());

        let mode = signer_info.mode_info.as_ref().and_then(|m| m.sum.as_ref());
        assert!(matches!(mode, Some(Sum::Single(s)) if s.mode == SignMode::Unspecified as i32));

        assert_eq!(decoded.fee(), Some(&Fee::default()));
        assert_eq!(decoded.signatures, vec![Vec::<u8>::new()]);
        assert_eq!(decoded.body.memo, "memo");
    }

    #[test]
    fn gas_above_max_is_rejected() {
        let mut config = LifecycleConfig::new(GasPrice::new(0.005, "uatom".to_string()));
        config.max_gas = Some(100_000);

        let err = gas_amount_to_fee(&config, "cosmoshub-4", 100_000).unwrap_err();
        assert!(matches!(err.detail(), ErrorDetail::GasEstimateExceeded(_)));

        config.max_gas = Some(140_000);
        let fee = gas_amount_to_fee(&config, "cosmoshub-4", 100_000).unwrap();
        assert_eq!(fee.gas_limit, 140_000);
    }
}
