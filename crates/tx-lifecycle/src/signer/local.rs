use async_trait::async_trait;
use ibc_proto::cosmos::tx::v1beta1::SignDoc;
use ripemd::Ripemd160;
use secp256k1::ecdsa::Signature;
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

use crate::chain::cosmos::amino::StdSignDoc;
use crate::chain::cosmos::encode::{encode_to_bech32, sign_doc_bytes};
use crate::error::Error;
use crate::signer::{
    AccountData, AminoSignResponse, DirectSignResponse, OfflineSigner, SigningScheme,
};

pub const SECP256K1_ALGO: &str = "secp256k1";

/// An in-process signer holding a single secp256k1 key.
///
/// Signatures are deterministic (RFC 6979) over `sha256(sign_bytes)`, in the
/// 64-byte compact `r || s` form the SDK expects.
pub struct Secp256k1Signer {
    secp: Secp256k1<All>,
    secret_key: SecretKey,
    public_key: PublicKey,
    address: String,
    scheme: SigningScheme,
}

impl Secp256k1Signer {
    pub fn new(
        secret_key: SecretKey,
        account_prefix: &str,
        scheme: SigningScheme,
    ) -> Result<Self, Error> {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        let address = address_from_public_key(&public_key.serialize(), account_prefix)?;

        Ok(Self {
            secp,
            secret_key,
            public_key,
            address,
            scheme,
        })
    }

    pub fn from_hex(
        secret_hex: &str,
        account_prefix: &str,
        scheme: SigningScheme,
    ) -> Result<Self, Error> {
        let secret_hex = secret_hex.trim();
        let bytes = hex::decode(secret_hex)
            .map_err(|e| Error::invalid_hex(secret_hex.to_string(), e))?;

        let secret_key = SecretKey::from_slice(&bytes).map_err(Error::invalid_key)?;

        Self::new(secret_key, account_prefix, scheme)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key(&self) -> Vec<u8> {
        self.public_key.serialize().to_vec()
    }

    pub fn sign(&self, sign_bytes: &[u8]) -> Result<Vec<u8>, Error> {
        let message = digest_message(sign_bytes)?;
        let signature = self.secp.sign_ecdsa(&message, &self.secret_key);

        Ok(signature.serialize_compact().to_vec())
    }

    fn check_address(&self, signer_address: &str) -> Result<(), Error> {
        if signer_address == self.address {
            Ok(())
        } else {
            Err(Error::signer_account_not_found(signer_address.to_string()))
        }
    }
}

#[async_trait]
impl OfflineSigner for Secp256k1Signer {
    fn signing_scheme(&self) -> SigningScheme {
        self.scheme
    }

    async fn accounts(&self) -> Result<Vec<AccountData>, Error> {
        Ok(vec![AccountData {
            address: self.address.clone(),
            algo: SECP256K1_ALGO.to_string(),
            public_key: self.public_key(),
        }])
    }

    async fn sign_direct(
        &self,
        signer_address: &str,
        sign_doc: SignDoc,
    ) -> Result<DirectSignResponse, Error> {
        self.check_address(signer_address)?;

        let signature = self.sign(&sign_doc_bytes(&sign_doc)?)?;

        Ok(DirectSignResponse {
            signed: sign_doc,
            signature,
        })
    }

    async fn sign_amino(
        &self,
        signer_address: &str,
        sign_doc: StdSignDoc,
    ) -> Result<AminoSignResponse, Error> {
        self.check_address(signer_address)?;

        let signature = self.sign(&sign_doc.sign_bytes()?)?;

        Ok(AminoSignResponse {
            signed: sign_doc,
            signature,
        })
    }
}

/// Check a compact secp256k1 signature over `sha256(sign_bytes)`.
pub fn verify_signature(
    public_key: &[u8],
    sign_bytes: &[u8],
    signature: &[u8],
) -> Result<bool, Error> {
    let secp = Secp256k1::verification_only();
    let public_key = PublicKey::from_slice(public_key).map_err(Error::invalid_key)?;
    let signature = Signature::from_compact(signature).map_err(Error::invalid_key)?;
    let message = digest_message(sign_bytes)?;

    Ok(secp.verify_ecdsa(&message, &signature, &public_key).is_ok())
}

fn digest_message(sign_bytes: &[u8]) -> Result<Message, Error> {
    let digest = Sha256::digest(sign_bytes);
    Message::from_digest_slice(&digest).map_err(Error::invalid_key)
}

/// Bech32 address of a compressed secp256k1 public key:
/// `ripemd160(sha256(public_key))` under `account_prefix`.
pub fn address_from_public_key(public_key: &[u8], account_prefix: &str) -> Result<String, Error> {
    let sha = Sha256::digest(public_key);
    let account_id = Ripemd160::digest(sha);

    encode_to_bech32(&account_id, account_prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::testing::TEST_SECRET_KEY;

    #[test]
    fn derives_bech32_address() {
        let signer =
            Secp256k1Signer::from_hex(TEST_SECRET_KEY, "cosmos", SigningScheme::Direct).unwrap();

        assert!(signer.address().starts_with("cosmos1"));
        assert_eq!(signer.address().len(), 45);
        assert_eq!(signer.public_key().len(), 33);
    }

    #[test]
    fn signatures_are_deterministic_and_verify() {
        let signer =
            Secp256k1Signer::from_hex(TEST_SECRET_KEY, "cosmos", SigningScheme::Direct).unwrap();

        let first = signer.sign(b"sign me").unwrap();
        let second = signer.sign(b"sign me").unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(verify_signature(&signer.public_key(), b"sign me", &first).unwrap());
        assert!(!verify_signature(&signer.public_key(), b"sign you", &first).unwrap());
    }

    #[test]
    fn rejects_malformed_secret() {
        assert!(Secp256k1Signer::from_hex("zz", "cosmos", SigningScheme::Direct).is_err());
        assert!(Secp256k1Signer::from_hex(&"00".repeat(32), "cosmos", SigningScheme::Direct).is_err());
    }

    #[tokio::test]
    async fn refuses_foreign_address() {
        let signer =
            Secp256k1Signer::from_hex(TEST_SECRET_KEY, "cosmos", SigningScheme::Direct).unwrap();

        let result = signer
            .sign_direct("cosmos1someoneelse", SignDoc::default())
            .await;

        assert!(result.is_err());
    }
}
