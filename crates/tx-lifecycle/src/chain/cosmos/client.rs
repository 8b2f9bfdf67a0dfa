use core::future::Future;
use core::time::Duration;

use async_trait::async_trait;
use tendermint::Hash as TxHash;
use tendermint_rpc::{Client, HttpClient, Url};
use tonic::codegen::http::Uri;
use tracing::debug;

use crate::chain::client::{BroadcastResponse, ChainClient, TxResult};
use crate::chain::cosmos::query::account::query_account;
use crate::chain::cosmos::query::tx::{query_tx_response, tx_result_from_response};
use crate::chain::cosmos::types::account::Account;
use crate::config::ChainConfig;
use crate::error::Error;

/// [`ChainClient`] backed by a CometBFT RPC endpoint and the SDK gRPC server.
#[derive(Clone, Debug)]
pub struct CosmosClient {
    rpc_client: HttpClient,
    rpc_address: Url,
    grpc_address: Uri,
    rpc_timeout: Duration,
}

impl CosmosClient {
    pub fn new(config: &ChainConfig) -> Result<Self, Error> {
        let rpc_client = HttpClient::new(config.rpc_addr.clone())
            .map_err(|e| Error::rpc(config.rpc_addr.clone(), e))?;

        let grpc_address = config
            .grpc_addr
            .to_string()
            .parse::<Uri>()
            .map_err(|e| Error::invalid_uri(config.grpc_addr.to_string(), e))?;

        Ok(Self {
            rpc_client,
            rpc_address: config.rpc_addr.clone(),
            grpc_address,
            rpc_timeout: config.rpc_timeout,
        })
    }

    async fn with_timeout<T>(
        &self,
        task: impl Future<Output = Result<T, Error>>,
    ) -> Result<T, Error> {
        tokio::time::timeout(self.rpc_timeout, task)
            .await
            .map_err(|_| Error::rpc_timeout(self.rpc_address.clone(), self.rpc_timeout))?
    }
}

#[async_trait]
impl ChainClient for CosmosClient {
    async fn query_account(&self, address: &str) -> Result<Account, Error> {
        let account = self
            .with_timeout(query_account(&self.grpc_address, address))
            .await?;

        Ok(account.into())
    }

    async fn broadcast_tx_sync(&self, tx_bytes: Vec<u8>) -> Result<BroadcastResponse, Error> {
        let response = self
            .with_timeout(async {
                self.rpc_client
                    .broadcast_tx_sync(tx_bytes)
                    .await
                    .map_err(|e| Error::rpc(self.rpc_address.clone(), e))
            })
            .await?;

        debug!(
            tx_hash = %response.hash,
            code = response.code.value(),
            "broadcast_tx_sync returned"
        );

        Ok(BroadcastResponse {
            hash: response.hash,
            code: response.code.value(),
            codespace: response.codespace,
            log: response.log,
        })
    }

    async fn query_tx(&self, hash: &TxHash) -> Result<Option<TxResult>, Error> {
        let response = self
            .with_timeout(query_tx_response(&self.rpc_client, &self.rpc_address, hash))
            .await?;

        Ok(response.map(tx_result_from_response))
    }
}
