//! Abstraction over the external component holding the signing keys.
//!
//! Keys never enter the lifecycle controller: it hands a sign document to an
//! [`OfflineSigner`] and assembles the transaction from what comes back.

pub mod local;

use core::fmt::{Display, Error as FmtError, Formatter};

use async_trait::async_trait;
use ibc_proto::cosmos::tx::v1beta1::SignDoc;

use crate::chain::cosmos::amino::StdSignDoc;
use crate::error::Error;

pub use local::Secp256k1Signer;

/// The sign document flavor a signer produces signatures for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SigningScheme {
    /// Signatures over the protobuf `SignDoc` (`SIGN_MODE_DIRECT`).
    Direct,
    /// Signatures over canonical amino JSON (`SIGN_MODE_LEGACY_AMINO_JSON`).
    Amino,
}

impl Display for SigningScheme {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Amino => write!(f, "amino"),
        }
    }
}

/// An account the signer can produce signatures for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountData {
    pub address: String,
    pub algo: String,
    /// Compressed secp256k1 public key.
    pub public_key: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DirectSignResponse {
    /// The document that was actually signed. Signers may alter it, e.g. to
    /// adjust the fee, so callers must build the transaction from it.
    pub signed: SignDoc,
    pub signature: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AminoSignResponse {
    /// The document that was actually signed.
    pub signed: StdSignDoc,
    pub signature: Vec<u8>,
}

#[async_trait]
pub trait OfflineSigner: Send + Sync {
    fn signing_scheme(&self) -> SigningScheme;

    async fn accounts(&self) -> Result<Vec<AccountData>, Error>;

    async fn sign_direct(
        &self,
        _signer_address: &str,
        _sign_doc: SignDoc,
    ) -> Result<DirectSignResponse, Error> {
        Err(Error::unsupported_sign_mode(SigningScheme::Direct))
    }

    async fn sign_amino(
        &self,
        _signer_address: &str,
        _sign_doc: StdSignDoc,
    ) -> Result<AminoSignResponse, Error> {
        Err(Error::unsupported_sign_mode(SigningScheme::Amino))
    }
}

/// Look up the account of `signer_address` among the signer's accounts.
pub async fn find_account(
    signer: &dyn OfflineSigner,
    signer_address: &str,
) -> Result<AccountData, Error> {
    signer
        .accounts()
        .await?
        .into_iter()
        .find(|account| account.address == signer_address)
        .ok_or_else(|| Error::signer_account_not_found(signer_address.to_string()))
}
