use tendermint::Hash as TxHash;
use tendermint_rpc::query::Query;

pub mod account;
pub mod tx;

pub fn tx_hash_query(tx_hash: &TxHash) -> Query {
    Query::eq("tx.hash", tx_hash.to_string())
}
