use tendermint::Hash as TxHash;
use tendermint_rpc::endpoint::tx::Response as TxResponse;
use tendermint_rpc::{Client, HttpClient, Order, Url};

use crate::chain::client::TxResult;
use crate::chain::cosmos::query::tx_hash_query;
use crate::error::Error;

/// Search for the transaction with the given hash.
///
/// `tx_search` is used rather than `tx` because the latter reports a
/// transaction that is not yet committed as an error.
pub async fn query_tx_response(
    rpc_client: &HttpClient,
    rpc_address: &Url,
    tx_hash: &TxHash,
) -> Result<Option<TxResponse>, Error> {
    let response = rpc_client
        .tx_search(
            tx_hash_query(tx_hash),
            false,
            1,
            1, // get only the first Tx matching the query
            Order::Ascending,
        )
        .await
        .map_err(|e| Error::rpc(rpc_address.clone(), e))?;

    Ok(response.txs.into_iter().next())
}

pub fn tx_result_from_response(response: TxResponse) -> TxResult {
    let result = response.tx_result;

    TxResult {
        hash: response.hash,
        height: response.height.value(),
        code: result.code.value(),
        codespace: result.codespace,
        log: result.log,
        gas_wanted: result.gas_wanted,
        gas_used: result.gas_used,
    }
}
