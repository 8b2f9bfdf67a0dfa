use ibc_proto::cosmos::tx::v1beta1::{AuthInfo, TxBody, TxRaw};
use ibc_proto::google::protobuf::Any;

use crate::chain::cosmos::types::account::{AccountNumber, AccountSequence};

/// Account data and chain identity that a signature commits to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignerData {
    pub account_number: AccountNumber,
    pub sequence: AccountSequence,
    pub chain_id: String,
}

/// The parts of a transaction that do not depend on the signer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnsignedTx {
    pub messages: Vec<Any>,
    pub memo: String,
    pub timeout_height: u64,
    pub extension_options: Vec<Any>,
}

impl UnsignedTx {
    pub fn new(messages: Vec<Any>, memo: impl Into<String>) -> Self {
        Self {
            messages,
            memo: memo.into(),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SignedTx {
    pub body: TxBody,
    pub body_bytes: Vec<u8>,
    pub auth_info: AuthInfo,
    pub auth_info_bytes: Vec<u8>,
    pub signatures: Vec<Vec<u8>>,
}

impl SignedTx {
    pub fn to_tx_raw(&self) -> TxRaw {
        TxRaw {
            body_bytes: self.body_bytes.clone(),
            auth_info_bytes: self.auth_info_bytes.clone(),
            signatures: self.signatures.clone(),
        }
    }
}
