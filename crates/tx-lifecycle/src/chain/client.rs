use async_trait::async_trait;
use tendermint::Hash as TxHash;

use crate::chain::cosmos::types::account::Account;
use crate::error::Error;

/// Outcome of `broadcast_tx_sync`: the transaction passed or failed `CheckTx`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BroadcastResponse {
    pub hash: TxHash,
    pub code: u32,
    pub codespace: String,
    pub log: String,
}

impl BroadcastResponse {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// Execution result of a transaction included in a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxResult {
    pub hash: TxHash,
    pub height: u64,
    pub code: u32,
    pub codespace: String,
    pub log: String,
    pub gas_wanted: i64,
    pub gas_used: i64,
}

impl TxResult {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// The operations the lifecycle needs from a chain node.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn query_account(&self, address: &str) -> Result<Account, Error>;

    /// Submit the transaction and return once it has passed `CheckTx`,
    /// without waiting for block inclusion.
    async fn broadcast_tx_sync(&self, tx_bytes: Vec<u8>) -> Result<BroadcastResponse, Error>;

    /// `None` while the transaction is not yet part of a block.
    async fn query_tx(&self, hash: &TxHash) -> Result<Option<TxResult>, Error>;
}
