//! Legacy amino JSON sign documents and the message converters they need.
//!
//! Amino signing does not commit to protobuf bytes. Instead, each message is
//! rendered as `{"type": <amino name>, "value": <JSON>}` and the whole
//! [`StdSignDoc`] is serialized to canonical JSON: object keys sorted, no
//! insignificant whitespace, and `&`, `<`, `>` escaped as `\u0026`,
//! `\u003c`, `\u003e`. Hardware wallets and the SDK ante handler rebuild
//! the exact same bytes, so any deviation invalidates the signature.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use ibc_proto::cosmos::bank::v1beta1::MsgSend;
use ibc_proto::cosmos::base::v1beta1::Coin;
use ibc_proto::cosmos::staking::v1beta1::MsgDelegate;
use ibc_proto::cosmos::tx::v1beta1::Fee;
use ibc_proto::google::protobuf::Any;
use prost::Message;
use serde_derive::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::chain::cosmos::types::tx::SignerData;
use crate::error::Error;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AminoCoin {
    pub denom: String,
    pub amount: String,
}

impl From<&Coin> for AminoCoin {
    fn from(coin: &Coin) -> Self {
        Self {
            denom: coin.denom.clone(),
            amount: coin.amount.clone(),
        }
    }
}

impl From<AminoCoin> for Coin {
    fn from(coin: AminoCoin) -> Self {
        Self {
            denom: coin.denom,
            amount: coin.amount,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdFee {
    pub amount: Vec<AminoCoin>,
    pub gas: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granter: Option<String>,
}

impl From<&Fee> for StdFee {
    fn from(fee: &Fee) -> Self {
        Self {
            amount: fee.amount.iter().map(AminoCoin::from).collect(),
            gas: fee.gas_limit.to_string(),
            payer: non_empty(&fee.payer),
            granter: non_empty(&fee.granter),
        }
    }
}

impl StdFee {
    pub fn to_fee(&self) -> Result<Fee, Error> {
        Ok(Fee {
            amount: self.amount.iter().cloned().map(Coin::from).collect(),
            gas_limit: parse_u64("fee.gas", &self.gas)?,
            payer: self.payer.clone().unwrap_or_default(),
            granter: self.granter.clone().unwrap_or_default(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AminoMsg {
    #[serde(rename = "type")]
    pub amino_type: String,
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdSignDoc {
    pub account_number: String,
    pub chain_id: String,
    pub fee: StdFee,
    pub memo: String,
    pub msgs: Vec<AminoMsg>,
    pub sequence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_height: Option<String>,
}

impl StdSignDoc {
    pub fn new(
        signer_data: &SignerData,
        fee: &Fee,
        msgs: Vec<AminoMsg>,
        memo: &str,
        timeout_height: u64,
    ) -> Self {
        Self {
            account_number: signer_data.account_number.to_string(),
            chain_id: signer_data.chain_id.clone(),
            fee: StdFee::from(fee),
            memo: memo.to_string(),
            msgs,
            sequence: signer_data.sequence.to_string(),
            timeout_height: (timeout_height > 0).then(|| timeout_height.to_string()),
        }
    }

    pub fn sequence(&self) -> Result<u64, Error> {
        parse_u64("sequence", &self.sequence)
    }

    pub fn timeout_height(&self) -> Result<u64, Error> {
        match &self.timeout_height {
            Some(height) => parse_u64("timeout_height", height),
            None => Ok(0),
        }
    }

    /// Canonical JSON serialization of this document.
    pub fn to_canonical_json(&self) -> Result<String, Error> {
        let value =
            serde_json::to_value(self).map_err(|e| Error::json("StdSignDoc".to_string(), e))?;

        let json = serde_json::to_string(&sort_keys(value))
            .map_err(|e| Error::json("StdSignDoc".to_string(), e))?;

        Ok(escape_html_characters(&json))
    }

    /// The bytes a `SIGN_MODE_LEGACY_AMINO_JSON` signature commits to.
    pub fn sign_bytes(&self) -> Result<Vec<u8>, Error> {
        self.to_canonical_json().map(String::into_bytes)
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_u64(field: &str, value: &str) -> Result<u64, Error> {
    value
        .parse()
        .map_err(|_| Error::invalid_signed_doc(format!("`{field}` is not an integer: {value}")))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();

            Value::Object(sorted.into_iter().collect::<Map<_, _>>())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

// These characters never occur in JSON syntax outside of string literals.
fn escape_html_characters(json: &str) -> String {
    json.replace('&', "\\u0026")
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
}

/// Converts one protobuf message type to and from its amino JSON form.
pub trait AminoConverter: Send + Sync {
    /// Protobuf type URL, e.g. `/cosmos.bank.v1beta1.MsgSend`.
    fn type_url(&self) -> &str;

    /// Amino type name, e.g. `cosmos-sdk/MsgSend`.
    fn amino_type(&self) -> &str;

    fn to_amino(&self, value: &[u8]) -> Result<Value, Error>;

    fn from_amino(&self, value: &Value) -> Result<Vec<u8>, Error>;
}

/// Registry of [`AminoConverter`]s, keyed both by type URL and amino name.
#[derive(Clone)]
pub struct AminoTypes {
    by_type_url: HashMap<String, Arc<dyn AminoConverter>>,
    by_amino_type: HashMap<String, Arc<dyn AminoConverter>>,
}

impl AminoTypes {
    /// A registry with no converters.
    pub fn empty() -> Self {
        Self {
            by_type_url: HashMap::new(),
            by_amino_type: HashMap::new(),
        }
    }

    pub fn register(&mut self, converter: impl AminoConverter + 'static) {
        let converter: Arc<dyn AminoConverter> = Arc::new(converter);

        self.by_type_url
            .insert(converter.type_url().to_string(), converter.clone());
        self.by_amino_type
            .insert(converter.amino_type().to_string(), converter);
    }

    pub fn to_amino(&self, msg: &Any) -> Result<AminoMsg, Error> {
        let converter = self
            .by_type_url
            .get(&msg.type_url)
            .ok_or_else(|| Error::unknown_amino_type(msg.type_url.clone()))?;

        Ok(AminoMsg {
            amino_type: converter.amino_type().to_string(),
            value: converter.to_amino(&msg.value)?,
        })
    }

    pub fn from_amino(&self, msg: &AminoMsg) -> Result<Any, Error> {
        let converter = self
            .by_amino_type
            .get(&msg.amino_type)
            .ok_or_else(|| Error::unknown_amino_msg(msg.amino_type.clone()))?;

        Ok(Any {
            type_url: converter.type_url().to_string(),
            value: converter.from_amino(&msg.value)?,
        })
    }
}

impl Default for AminoTypes {
    fn default() -> Self {
        let mut types = Self::empty();
        types.register(MsgSendConverter);
        types.register(MsgDelegateConverter);
        types
    }
}

impl core::fmt::Debug for AminoTypes {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut type_urls: Vec<_> = self.by_type_url.keys().collect();
        type_urls.sort();

        f.debug_struct("AminoTypes")
            .field("type_urls", &type_urls)
            .finish()
    }
}

fn decode_proto<M: Message + Default>(type_url: &str, value: &[u8]) -> Result<M, Error> {
    M::decode(value).map_err(|e| Error::protobuf_decode(type_url.to_string(), e))
}

fn encode_proto<M: Message>(type_url: &str, msg: &M) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    Message::encode(msg, &mut buf).map_err(|e| Error::protobuf_encode(type_url.to_string(), e))?;
    Ok(buf)
}

fn to_json<T: serde::Serialize>(type_url: &str, value: &T) -> Result<Value, Error> {
    serde_json::to_value(value)
        .map_err(|e| Error::amino_conversion(type_url.to_string(), e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(type_url: &str, value: &Value) -> Result<T, Error> {
    serde_json::from_value(value.clone())
        .map_err(|e| Error::amino_conversion(type_url.to_string(), e.to_string()))
}

pub const MSG_SEND_TYPE_URL: &str = "/cosmos.bank.v1beta1.MsgSend";
pub const MSG_DELEGATE_TYPE_URL: &str = "/cosmos.staking.v1beta1.MsgDelegate";

#[derive(Serialize, Deserialize)]
struct AminoMsgSend {
    from_address: String,
    to_address: String,
    amount: Vec<AminoCoin>,
}

/// `cosmos.bank.v1beta1.MsgSend` as `cosmos-sdk/MsgSend`.
pub struct MsgSendConverter;

impl AminoConverter for MsgSendConverter {
    fn type_url(&self) -> &str {
        MSG_SEND_TYPE_URL
    }

    fn amino_type(&self) -> &str {
        "cosmos-sdk/MsgSend"
    }

    fn to_amino(&self, value: &[u8]) -> Result<Value, Error> {
        let msg: MsgSend = decode_proto(MSG_SEND_TYPE_URL, value)?;

        to_json(
            MSG_SEND_TYPE_URL,
            &AminoMsgSend {
                from_address: msg.from_address,
                to_address: msg.to_address,
                amount: msg.amount.iter().map(AminoCoin::from).collect(),
            },
        )
    }

    fn from_amino(&self, value: &Value) -> Result<Vec<u8>, Error> {
        let msg: AminoMsgSend = from_json(MSG_SEND_TYPE_URL, value)?;

        encode_proto(
            MSG_SEND_TYPE_URL,
            &MsgSend {
                from_address: msg.from_address,
                to_address: msg.to_address,
                amount: msg.amount.into_iter().map(Coin::from).collect(),
            },
        )
    }
}

#[derive(Serialize, Deserialize)]
struct AminoMsgDelegate {
    delegator_address: String,
    validator_address: String,
    amount: AminoCoin,
}

/// `cosmos.staking.v1beta1.MsgDelegate` as `cosmos-sdk/MsgDelegate`.
pub struct MsgDelegateConverter;

impl AminoConverter for MsgDelegateConverter {
    fn type_url(&self) -> &str {
        MSG_DELEGATE_TYPE_URL
    }

    fn amino_type(&self) -> &str {
        "cosmos-sdk/MsgDelegate"
    }

    fn to_amino(&self, value: &[u8]) -> Result<Value, Error> {
        let msg: MsgDelegate = decode_proto(MSG_DELEGATE_TYPE_URL, value)?;

        let amount = msg.amount.as_ref().ok_or_else(|| {
            Error::amino_conversion(
                MSG_DELEGATE_TYPE_URL.to_string(),
                "missing delegation amount".to_string(),
            )
        })?;

        to_json(
            MSG_DELEGATE_TYPE_URL,
            &AminoMsgDelegate {
                delegator_address: msg.delegator_address,
                validator_address: msg.validator_address,
                amount: AminoCoin::from(amount),
            },
        )
    }

    fn from_amino(&self, value: &Value) -> Result<Vec<u8>, Error> {
        let msg: AminoMsgDelegate = from_json(MSG_DELEGATE_TYPE_URL, value)?;

        encode_proto(
            MSG_DELEGATE_TYPE_URL,
            &MsgDelegate {
                delegator_address: msg.delegator_address,
                validator_address: msg.validator_address,
                amount: Some(msg.amount.into()),
            },
        )
    }
}
