use ibc_proto::cosmos::auth::v1beta1::query_client::QueryClient;
use ibc_proto::cosmos::auth::v1beta1::{BaseAccount, QueryAccountRequest};
use prost::Message;
use tonic::codegen::http::Uri;
use tracing::info;

use crate::chain::client::ChainClient;
use crate::chain::cosmos::types::account::Account;
use crate::error::Error;

const BASE_ACCOUNT_TYPE_URL: &str = "/cosmos.auth.v1beta1.BaseAccount";

/// Get a `&mut Account` from an `&mut Option<Account>` if it is `Some(Account)`.
/// Otherwise query for the account information, update the `Option` to `Some`,
/// and return the underlying `&mut` reference.
pub async fn get_or_fetch_account<'a>(
    chain: &dyn ChainClient,
    account_address: &str,
    m_account: &'a mut Option<Account>,
) -> Result<&'a mut Account, Error> {
    match m_account {
        Some(account) => Ok(account),
        None => {
            let account = chain.query_account(account_address).await?;

            info!(
                signer = %account_address,
                sequence = %account.sequence,
                number = %account.number,
                "retrieved account",
            );

            Ok(m_account.insert(account))
        }
    }
}

/// Refresh the account sequence behind the `&mut Account` by refetching the
/// account and updating the `&mut` reference.
pub async fn refresh_account(
    chain: &dyn ChainClient,
    account_address: &str,
    m_account: &mut Account,
) -> Result<(), Error> {
    let account = chain.query_account(account_address).await?;

    info!(
        signer = %account_address,
        sequence = %account.sequence,
        number = %account.number,
        "refresh: retrieved account",
    );

    *m_account = account;

    Ok(())
}

/// Uses the GRPC client to retrieve the account sequence
pub async fn query_account(
    grpc_address: &Uri,
    account_address: &str,
) -> Result<BaseAccount, Error> {
    let mut client = QueryClient::connect(grpc_address.clone())
        .await
        .map_err(Error::grpc_transport)?;

    let request = tonic::Request::new(QueryAccountRequest {
        address: account_address.to_string(),
    });

    let response = client.account(request).await.map_err(|status| {
        Error::grpc_status(status, "cosmos.auth.v1beta1.Query/Account".to_string())
    })?;

    // Querying for an account might fail, i.e. if the account doesn't actually exist
    let resp_account = match response.into_inner().account {
        Some(account) => account,
        None => return Err(Error::empty_query_account(account_address.to_string())),
    };

    if resp_account.type_url == BASE_ACCOUNT_TYPE_URL {
        Ok(BaseAccount::decode(resp_account.value.as_slice())
            .map_err(|e| Error::protobuf_decode("BaseAccount".to_string(), e))?)
    } else {
        Err(Error::unknown_account_type(resp_account.type_url))
    }
}
