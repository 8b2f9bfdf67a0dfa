use ibc_proto::cosmos::tx::signing::v1beta1::SignMode;
use ibc_proto::cosmos::tx::v1beta1::{AuthInfo, Fee, TxBody};
use prost::Message;
use tracing::debug;

use crate::chain::cosmos::amino::{AminoTypes, StdSignDoc};
use crate::chain::cosmos::encode::{
    auth_info_and_bytes, encode_key_bytes, encode_sign_doc, encode_signer_info, tx_body_and_bytes,
};
use crate::chain::cosmos::types::account::AccountSequence;
use crate::chain::cosmos::types::tx::{SignedTx, SignerData, UnsignedTx};
use crate::error::Error;
use crate::signer::{AccountData, OfflineSigner, SigningScheme};

/// Build the sign document for `tx` in the signer's scheme, have it signed,
/// and assemble the transaction from the document the signer returned.
pub async fn sign_tx(
    signer: &dyn OfflineSigner,
    scheme: SigningScheme,
    amino_types: &AminoTypes,
    account: &AccountData,
    tx: &UnsignedTx,
    fee: &Fee,
    signer_data: &SignerData,
) -> Result<SignedTx, Error> {
    debug!(
        signer = %account.address,
        %scheme,
        sequence = %signer_data.sequence,
        account_number = %signer_data.account_number,
        "signing transaction"
    );

    match scheme {
        SigningScheme::Direct => sign_direct(signer, account, tx, fee, signer_data).await,
        SigningScheme::Amino => {
            sign_amino(signer, amino_types, account, tx, fee, signer_data).await
        }
    }
}

async fn sign_direct(
    signer: &dyn OfflineSigner,
    account: &AccountData,
    tx: &UnsignedTx,
    fee: &Fee,
    signer_data: &SignerData,
) -> Result<SignedTx, Error> {
    let key_bytes = encode_key_bytes(&account.public_key)?;

    let signer_info = encode_signer_info(SignMode::Direct, signer_data.sequence, key_bytes);

    let (_, body_bytes) = tx_body_and_bytes(tx)?;

    let (_, auth_info_bytes) = auth_info_and_bytes(signer_info, fee.clone())?;

    let sign_doc = encode_sign_doc(
        &signer_data.chain_id,
        signer_data.account_number,
        body_bytes,
        auth_info_bytes,
    );

    let response = signer.sign_direct(&account.address, sign_doc).await?;
    let signed = response.signed;

    // The signer may have modified the document, so the envelope is rebuilt
    // from the bytes it actually signed.
    let body = TxBody::decode(signed.body_bytes.as_slice())
        .map_err(|e| Error::protobuf_decode("TxBody".to_string(), e))?;

    let auth_info = AuthInfo::decode(signed.auth_info_bytes.as_slice())
        .map_err(|e| Error::protobuf_decode("AuthInfo".to_string(), e))?;

    Ok(SignedTx {
        body,
        body_bytes: signed.body_bytes,
        auth_info,
        auth_info_bytes: signed.auth_info_bytes,
        signatures: vec![response.signature],
    })
}

async fn sign_amino(
    signer: &dyn OfflineSigner,
    amino_types: &AminoTypes,
    account: &AccountData,
    tx: &UnsignedTx,
    fee: &Fee,
    signer_data: &SignerData,
) -> Result<SignedTx, Error> {
    if !tx.extension_options.is_empty() {
        return Err(Error::amino_extension_options());
    }

    let msgs = tx
        .messages
        .iter()
        .map(|msg| amino_types.to_amino(msg))
        .collect::<Result<Vec<_>, _>>()?;

    let sign_doc = StdSignDoc::new(signer_data, fee, msgs, &tx.memo, tx.timeout_height);

    let response = signer.sign_amino(&account.address, sign_doc).await?;
    let signed = response.signed;

    // Everything the signature commits to comes from the signed document.
    let messages = signed
        .msgs
        .iter()
        .map(|msg| amino_types.from_amino(msg))
        .collect::<Result<Vec<_>, _>>()?;

    let signed_tx = UnsignedTx {
        messages,
        memo: signed.memo.clone(),
        timeout_height: signed.timeout_height()?,
        extension_options: Vec::new(),
    };

    let signed_fee = signed.fee.to_fee()?;
    let signed_sequence = AccountSequence::new(signed.sequence()?);

    let key_bytes = encode_key_bytes(&account.public_key)?;

    let signer_info = encode_signer_info(SignMode::LegacyAminoJson, signed_sequence, key_bytes);

    let (body, body_bytes) = tx_body_and_bytes(&signed_tx)?;

    let (auth_info, auth_info_bytes) = auth_info_and_bytes(signer_info, signed_fee)?;

    Ok(SignedTx {
        body,
        body_bytes,
        auth_info,
        auth_info_bytes,
        signatures: vec![response.signature],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use ibc_proto::cosmos::base::v1beta1::Coin;
    use ibc_proto::cosmos::tx::v1beta1::mode_info::Sum;
    use ibc_proto::cosmos::tx::v1beta1::SignDoc;
    use ibc_proto::google::protobuf::Any;

    use crate::chain::cosmos::amino::AminoTypes;
    use crate::chain::cosmos::encode::{decode_tx, encode_tx_raw, sign_doc_bytes};
    use crate::chain::cosmos::types::account::AccountNumber;
    use crate::error::ErrorDetail;
    use crate::signer::local::verify_signature;
    use crate::signer::{find_account, AminoSignResponse, DirectSignResponse, Secp256k1Signer};
    use crate::testing::{msg_send, TEST_SECRET_KEY};

    fn local_signer(scheme: SigningScheme) -> Secp256k1Signer {
        Secp256k1Signer::from_hex(TEST_SECRET_KEY, "cosmos", scheme).unwrap()
    }

    fn fee() -> Fee {
        Fee {
            amount: vec![Coin {
                denom: "uatom".to_string(),
                amount: "700".to_string(),
            }],
            gas_limit: 140_000,
            payer: String::new(),
            granter: String::new(),
        }
    }

    fn signer_data() -> SignerData {
        SignerData {
            account_number: AccountNumber::new(42),
            sequence: AccountSequence::new(9),
            chain_id: "cosmoshub-4".to_string(),
        }
    }

    fn sign_mode(auth_info: &AuthInfo) -> i32 {
        match auth_info.signer_infos[0]
            .mode_info
            .as_ref()
            .and_then(|m| m.sum.as_ref())
        {
            Some(Sum::Single(single)) => single.mode,
            _ => panic!("expected a single signer mode"),
        }
    }

    async fn sign_with(signer: &dyn OfflineSigner, tx: &UnsignedTx) -> Result<SignedTx, Error> {
        let address = signer.accounts().await?[0].address.clone();
        let account = find_account(signer, &address).await?;

        sign_tx(
            signer,
            signer.signing_scheme(),
            &AminoTypes::default(),
            &account,
            tx,
            &fee(),
            &signer_data(),
        )
        .await
    }

    #[tokio::test]
    async fn direct_sign_then_decode() {
        let signer = local_signer(SigningScheme::Direct);
        let tx = UnsignedTx::new(vec![msg_send(signer.address(), "cosmos1dest", 5)], "memo");

        let signed = sign_with(&signer, &tx).await.unwrap();
        let decoded = decode_tx(&encode_tx_raw(signed.to_tx_raw()).unwrap()).unwrap();

        assert_eq!(decoded.body.messages, tx.messages);
        assert_eq!(decoded.body.memo, "memo");
        assert_eq!(decoded.fee(), Some(&fee()));
        assert_eq!(decoded.sequence(), Some(AccountSequence::new(9)));
        assert_eq!(sign_mode(&decoded.auth_info), SignMode::Direct as i32);

        let sign_doc = SignDoc {
            body_bytes: signed.body_bytes.clone(),
            auth_info_bytes: signed.auth_info_bytes.clone(),
            chain_id: "cosmoshub-4".to_string(),
            account_number: 42,
        };

        let sign_bytes = sign_doc_bytes(&sign_doc).unwrap();
        assert!(verify_signature(&signer.public_key(), &sign_bytes, &decoded.signatures[0]).unwrap());
    }

    #[tokio::test]
    async fn direct_signing_is_deterministic() {
        let signer = local_signer(SigningScheme::Direct);
        let tx = UnsignedTx::new(vec![msg_send(signer.address(), "cosmos1dest", 5)], "");

        let first = sign_with(&signer, &tx).await.unwrap();
        let second = sign_with(&signer, &tx).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn amino_sign_then_decode() {
        let signer = local_signer(SigningScheme::Amino);
        let tx = UnsignedTx {
            timeout_height: 1000,
            ..UnsignedTx::new(vec![msg_send(signer.address(), "cosmos1dest", 5)], "a<b")
        };

        let signed = sign_with(&signer, &tx).await.unwrap();
        let decoded = decode_tx(&encode_tx_raw(signed.to_tx_raw()).unwrap()).unwrap();

        assert_eq!(decoded.body.messages, tx.messages);
        assert_eq!(decoded.body.memo, "a<b");
        assert_eq!(decoded.body.timeout_height, 1000);
        assert_eq!(decoded.fee(), Some(&fee()));
        assert_eq!(sign_mode(&decoded.auth_info), SignMode::LegacyAminoJson as i32);

        let types = AminoTypes::default();
        let msgs = tx
            .messages
            .iter()
            .map(|m| types.to_amino(m).unwrap())
            .collect();
        let doc = StdSignDoc::new(&signer_data(), &fee(), msgs, "a<b", 1000);

        assert!(verify_signature(
            &signer.public_key(),
            &doc.sign_bytes().unwrap(),
            &decoded.signatures[0]
        )
        .unwrap());
    }

    #[tokio::test]
    async fn amino_rejects_extension_options() {
        let signer = local_signer(SigningScheme::Amino);
        let tx = UnsignedTx {
            extension_options: vec![Any {
                type_url: "/ethermint.types.v1.ExtensionOptionDynamicFeeTx".to_string(),
                value: vec![],
            }],
            ..UnsignedTx::new(vec![msg_send(signer.address(), "cosmos1dest", 5)], "")
        };

        let err = sign_with(&signer, &tx).await.unwrap_err();
        assert!(matches!(err.detail(), ErrorDetail::AminoExtensionOptions(_)));
    }

    /// Raises the fee and memo before signing, as some wallets do.
    struct RewritingSigner(Secp256k1Signer);

    #[async_trait]
    impl OfflineSigner for RewritingSigner {
        fn signing_scheme(&self) -> SigningScheme {
            self.0.signing_scheme()
        }

        async fn accounts(&self) -> Result<Vec<AccountData>, Error> {
            self.0.accounts().await
        }

        async fn sign_direct(
            &self,
            signer_address: &str,
            mut sign_doc: SignDoc,
        ) -> Result<DirectSignResponse, Error> {
            let mut body = TxBody::decode(sign_doc.body_bytes.as_slice()).unwrap();
            body.memo = "rewritten".to_string();
            sign_doc.body_bytes = body.encode_to_vec();

            self.0.sign_direct(signer_address, sign_doc).await
        }

        async fn sign_amino(
            &self,
            signer_address: &str,
            mut sign_doc: StdSignDoc,
        ) -> Result<AminoSignResponse, Error> {
            sign_doc.fee.amount[0].amount = "900".to_string();
            sign_doc.memo = "rewritten".to_string();

            self.0.sign_amino(signer_address, sign_doc).await
        }
    }

    #[tokio::test]
    async fn envelope_uses_signed_direct_document() {
        let signer = RewritingSigner(local_signer(SigningScheme::Direct));
        let tx = UnsignedTx::new(vec![msg_send(signer.0.address(), "cosmos1dest", 5)], "memo");

        let signed = sign_with(&signer, &tx).await.unwrap();

        assert_eq!(signed.body.memo, "rewritten");
    }

    #[tokio::test]
    async fn envelope_uses_signed_amino_document() {
        let signer = RewritingSigner(local_signer(SigningScheme::Amino));
        let tx = UnsignedTx::new(vec![msg_send(signer.0.address(), "cosmos1dest", 5)], "memo");

        let signed = sign_with(&signer, &tx).await.unwrap();

        assert_eq!(signed.body.memo, "rewritten");
        assert_eq!(
            signed.auth_info.fee.as_ref().map(|f| f.amount[0].amount.as_str()),
            Some("900")
        );
    }

    /// Only supports direct signing, through the default trait methods.
    struct DirectOnly(Secp256k1Signer);

    #[async_trait]
    impl OfflineSigner for DirectOnly {
        fn signing_scheme(&self) -> SigningScheme {
            SigningScheme::Amino
        }

        async fn accounts(&self) -> Result<Vec<AccountData>, Error> {
            self.0.accounts().await
        }
    }

    #[tokio::test]
    async fn unsupported_sign_mode() {
        let signer = DirectOnly(local_signer(SigningScheme::Direct));
        let tx = UnsignedTx::new(vec![msg_send(signer.0.address(), "cosmos1dest", 5)], "");

        let err = sign_with(&signer, &tx).await.unwrap_err();
        assert!(matches!(err.detail(), ErrorDetail::UnsupportedSignMode(_)));
    }
}
