use bech32::{ToBase32, Variant};
use ibc_proto::cosmos::tx::signing::v1beta1::SignMode;
use ibc_proto::cosmos::tx::v1beta1::mode_info::{Single, Sum};
use ibc_proto::cosmos::tx::v1beta1::{
    AuthInfo, Fee, ModeInfo, SignDoc, SignerInfo, TxBody, TxRaw,
};
use ibc_proto::google::protobuf::Any;
use prost::Message;
use sha2::{Digest, Sha256};
use tendermint::Hash as TxHash;

use crate::chain::cosmos::types::account::{AccountNumber, AccountSequence};
use crate::chain::cosmos::types::tx::UnsignedTx;
use crate::error::Error;

pub const SECP256K1_PUBKEY_TYPE_URL: &str = "/cosmos.crypto.secp256k1.PubKey";

/// A transaction decoded from its `TxRaw` wire form.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedTx {
    pub body: TxBody,
    pub auth_info: AuthInfo,
    pub signatures: Vec<Vec<u8>>,
}

impl DecodedTx {
    pub fn fee(&self) -> Option<&Fee> {
        self.auth_info.fee.as_ref()
    }

    pub fn sequence(&self) -> Option<AccountSequence> {
        self.auth_info
            .signer_infos
            .first()
            .map(|info| AccountSequence::new(info.sequence))
    }
}

/// Wraps a compressed secp256k1 public key into the protobuf
/// `cosmos.crypto.secp256k1.PubKey` payload.
pub fn encode_key_bytes(public_key: &[u8]) -> Result<Vec<u8>, Error> {
    let mut pk_buf = Vec::new();

    prost::Message::encode(&public_key.to_vec(), &mut pk_buf)
        .map_err(|e| Error::protobuf_encode("PublicKey".into(), e))?;

    Ok(pk_buf)
}

pub fn encode_signer_info(
    sign_mode: SignMode,
    sequence: AccountSequence,
    key_bytes: Vec<u8>,
) -> SignerInfo {
    let pk_any = Any {
        type_url: SECP256K1_PUBKEY_TYPE_URL.to_string(),
        value: key_bytes,
    };

    let single = Single {
        mode: sign_mode as i32,
    };
    let sum_single = Some(Sum::Single(single));
    let mode = Some(ModeInfo { sum: sum_single });

    SignerInfo {
        public_key: Some(pk_any),
        mode_info: mode,
        sequence: sequence.to_u64(),
    }
}

pub fn tx_body_and_bytes(tx: &UnsignedTx) -> Result<(TxBody, Vec<u8>), Error> {
    let body = TxBody {
        messages: tx.messages.clone(),
        memo: tx.memo.clone(),
        timeout_height: tx.timeout_height,
        extension_options: Vec::new(),
        non_critical_extension_options: tx.extension_options.clone(),
    };

    // A protobuf serialization of a TxBody
    let mut body_buf = Vec::new();

    prost::Message::encode(&body, &mut body_buf)
        .map_err(|e| Error::protobuf_encode(String::from("TxBody"), e))?;

    Ok((body, body_buf))
}

pub fn auth_info_and_bytes(signer_info: SignerInfo, fee: Fee) -> Result<(AuthInfo, Vec<u8>), Error> {
    let auth_info = AuthInfo {
        signer_infos: vec![signer_info],
        fee: Some(fee),

        // Since Cosmos SDK v0.46.0
        tip: None,
    };

    // A protobuf serialization of a AuthInfo
    let mut auth_buf = Vec::new();

    prost::Message::encode(&auth_info, &mut auth_buf)
        .map_err(|e| Error::protobuf_encode(String::from("AuthInfo"), e))?;

    Ok((auth_info, auth_buf))
}

pub fn encode_sign_doc(
    chain_id: &str,
    account_number: AccountNumber,
    body_bytes: Vec<u8>,
    auth_info_bytes: Vec<u8>,
) -> SignDoc {
    SignDoc {
        body_bytes,
        auth_info_bytes,
        chain_id: chain_id.to_string(),
        account_number: account_number.to_u64(),
    }
}

/// The bytes a `SIGN_MODE_DIRECT` signature commits to.
pub fn sign_doc_bytes(sign_doc: &SignDoc) -> Result<Vec<u8>, Error> {
    let mut signdoc_buf = Vec::new();

    prost::Message::encode(sign_doc, &mut signdoc_buf)
        .map_err(|e| Error::protobuf_encode(String::from("SignDoc"), e))?;

    Ok(signdoc_buf)
}

pub fn encode_tx_raw(tx_raw: TxRaw) -> Result<Vec<u8>, Error> {
    let mut tx_bytes = Vec::new();
    prost::Message::encode(&tx_raw, &mut tx_bytes)
        .map_err(|e| Error::protobuf_encode("Transaction".to_string(), e))?;

    Ok(tx_bytes)
}

pub fn decode_tx(tx_bytes: &[u8]) -> Result<DecodedTx, Error> {
    let tx_raw = TxRaw::decode(tx_bytes)
        .map_err(|e| Error::protobuf_decode("TxRaw".to_string(), e))?;

    let body = TxBody::decode(tx_raw.body_bytes.as_slice())
        .map_err(|e| Error::protobuf_decode("TxBody".to_string(), e))?;

    let auth_info = AuthInfo::decode(tx_raw.auth_info_bytes.as_slice())
        .map_err(|e| Error::protobuf_decode("AuthInfo".to_string(), e))?;

    Ok(DecodedTx {
        body,
        auth_info,
        signatures: tx_raw.signatures,
    })
}

/// The hash under which CometBFT indexes the given transaction bytes.
pub fn tx_hash(tx_bytes: &[u8]) -> TxHash {
    let digest = Sha256::digest(tx_bytes);

    let mut hash = [0u8; 32];
    hash.copy_from_slice(&digest);

    TxHash::Sha256(hash)
}

pub fn encode_to_bech32(account_id: &[u8], account_prefix: &str) -> Result<String, Error> {
    let encoded = bech32::encode(account_prefix, account_id.to_base32(), Variant::Bech32)
        .map_err(Error::bech32_encoding)?;

    Ok(encoded)
}
