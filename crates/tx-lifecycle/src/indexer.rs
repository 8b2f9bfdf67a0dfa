//! Downstream indexer queried once a transaction is committed on chain.

use async_trait::async_trait;
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;
use tendermint::Hash as TxHash;
use tendermint_rpc::Url;
use tracing::trace;

use crate::config::IndexerConfig;
use crate::error::Error;

#[async_trait]
pub trait IndexerClient: Send + Sync {
    /// The processing status the indexer reports for the transaction, or
    /// `None` if it has not seen it yet.
    async fn transaction_status(&self, hash: &TxHash) -> Result<Option<String>, Error>;
}

/// How the lifecycle interprets a status string reported by the indexer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexerStatus {
    /// The indexer processed the transaction successfully.
    Success,
    /// The status mentions an error.
    Failed(String),
    /// Any other status, e.g. `pending`.
    Processing(String),
}

impl IndexerStatus {
    pub fn classify(status: &str) -> Self {
        if status == "success" {
            Self::Success
        } else if status.contains("error") {
            Self::Failed(status.to_string())
        } else {
            Self::Processing(status.to_string())
        }
    }
}

/// [`IndexerClient`] for indexers exposing a GraphQL endpoint.
#[derive(Clone, Debug)]
pub struct GraphQlIndexer {
    client: reqwest::Client,
    url: Url,
    query: String,
    status_path: Vec<String>,
}

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: GraphQlVariables,
}

#[derive(Serialize)]
struct GraphQlVariables {
    hash: String,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

impl GraphQlIndexer {
    pub fn new(config: &IndexerConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: &IndexerConfig) -> Self {
        Self {
            client,
            url: config.url.clone(),
            query: config.query.clone(),
            status_path: config
                .status_path
                .split('.')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    fn extract_status(&self, response: &Value) -> Result<Option<String>, Error> {
        if let Some(errors) = response.get("errors").and_then(Value::as_array) {
            if let Some(first) = errors.first() {
                let message = serde_json::from_value::<GraphQlError>(first.clone())
                    .map(|e| e.message)
                    .unwrap_or_else(|_| first.to_string());

                return Err(Error::indexer_query(message));
            }
        }

        Ok(lookup_path(response, &self.status_path).and_then(|status| match status {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }))
    }
}

#[async_trait]
impl IndexerClient for GraphQlIndexer {
    async fn transaction_status(&self, hash: &TxHash) -> Result<Option<String>, Error> {
        let request = GraphQlRequest {
            query: &self.query,
            variables: GraphQlVariables {
                hash: hash.to_string(),
            },
        };

        let response = self
            .client
            .post(self.url.to_string())
            .json(&request)
            .send()
            .await
            .map_err(Error::http_request)?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.map_err(Error::http_response_body)?;
            return Err(Error::http_response(status, body));
        }

        let body: Value = response.json().await.map_err(Error::http_response_body)?;

        let tx_status = self.extract_status(&body)?;

        trace!(tx_hash = %hash, status = ?tx_status, "queried indexer");

        Ok(tx_status)
    }
}

// Follows `path` through objects by key and through arrays by index.
fn lookup_path<'a>(value: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
