use core::future::Future;
use core::time::Duration;

use async_trait::async_trait;
use ibc_proto::cosmos::tx::v1beta1::service_client::ServiceClient;
use ibc_proto::cosmos::tx::v1beta1::SimulateRequest;
use serde_derive::{Deserialize, Serialize};
use subtle_encoding::base64;
use tendermint_rpc::Url;
use tonic::codegen::http::Uri;
use tracing::debug;

use crate::error::Error;

/// Runs a transaction against the chain's current state without committing
/// it, reporting the gas it consumed.
#[async_trait]
pub trait GasSimulator: Send + Sync {
    async fn simulate(&self, tx_bytes: Vec<u8>) -> Result<u64, Error>;
}

/// Bound a simulation request by `timeout`.
async fn with_timeout<T>(
    endpoint: &str,
    timeout: Duration,
    task: impl Future<Output = Result<T, Error>>,
) -> Result<T, Error> {
    tokio::time::timeout(timeout, task)
        .await
        .map_err(|_| Error::simulation_timeout(endpoint.to_string(), timeout))?
}

/// Simulates through `cosmos.tx.v1beta1.Service/Simulate`.
#[derive(Clone, Debug)]
pub struct GrpcSimulator {
    grpc_address: Uri,
    timeout: Duration,
}

impl GrpcSimulator {
    pub fn new(grpc_address: Uri, timeout: Duration) -> Self {
        Self {
            grpc_address,
            timeout,
        }
    }

    pub fn from_url(grpc_address: &Url, timeout: Duration) -> Result<Self, Error> {
        let uri = grpc_address
            .to_string()
            .parse::<Uri>()
            .map_err(|e| Error::invalid_uri(grpc_address.to_string(), e))?;

        Ok(Self::new(uri, timeout))
    }

    async fn do_simulate(&self, tx_bytes: Vec<u8>) -> Result<u64, Error> {
        let req = SimulateRequest {
            tx_bytes,
            ..Default::default()
        };

        let mut client = ServiceClient::connect(self.grpc_address.clone())
            .await
            .map_err(Error::grpc_transport)?;

        let request = tonic::Request::new(req);
        let response = client
            .simulate(request)
            .await
            .map_err(|status| Error::simulation_failed(status.message().to_string()))?
            .into_inner();

        let gas_info = response.gas_info.ok_or_else(Error::empty_simulation_gas_info)?;

        debug!(gas_used = gas_info.gas_used, "grpc simulation succeeded");

        Ok(gas_info.gas_used)
    }
}

#[async_trait]
impl GasSimulator for GrpcSimulator {
    async fn simulate(&self, tx_bytes: Vec<u8>) -> Result<u64, Error> {
        let endpoint = self.grpc_address.to_string();

        with_timeout(&endpoint, self.timeout, self.do_simulate(tx_bytes)).await
    }
}

/// Simulates through the REST gateway at `POST /cosmos/tx/v1beta1/simulate`.
#[derive(Clone, Debug)]
pub struct RestSimulator {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct RestSimulateRequest {
    tx_bytes: String,
}

#[derive(Deserialize)]
struct RestSimulateResponse {
    gas_info: Option<RestGasInfo>,
}

// The gateway renders 64-bit integers as JSON strings.
#[derive(Deserialize)]
struct RestGasInfo {
    gas_used: String,
}

#[derive(Deserialize)]
struct RestErrorResponse {
    message: String,
}

impl RestSimulator {
    pub fn new(rest_address: &Url, timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), rest_address, timeout)
    }

    pub fn with_client(client: reqwest::Client, rest_address: &Url, timeout: Duration) -> Self {
        let endpoint = format!(
            "{}/cosmos/tx/v1beta1/simulate",
            rest_address.to_string().trim_end_matches('/')
        );

        Self {
            client,
            endpoint,
            timeout,
        }
    }

    async fn do_simulate(&self, tx_bytes: Vec<u8>) -> Result<u64, Error> {
        let encoded = String::from_utf8(base64::encode(tx_bytes))
            .map_err(|e| Error::simulation_failed(e.to_string()))?;

        let response = self
            .client
            .post(&self.endpoint)
            .json(&RestSimulateRequest { tx_bytes: encoded })
            .send()
            .await
            .map_err(Error::http_request)?;

        let status = response.status();
        let body = response.text().await.map_err(Error::http_response_body)?;

        if !status.is_success() {
            // The gateway reports failed simulations as a gRPC status in JSON
            return match serde_json::from_str::<RestErrorResponse>(&body) {
                Ok(err) => Err(Error::simulation_failed(err.message)),
                Err(_) => Err(Error::http_response(status, body)),
            };
        }

        let result: RestSimulateResponse = serde_json::from_str(&body)
            .map_err(|e| Error::json("SimulateResponse".to_string(), e))?;

        let gas_info = result.gas_info.ok_or_else(Error::empty_simulation_gas_info)?;

        let gas_used = gas_info
            .gas_used
            .parse::<u64>()
            .map_err(|_| Error::simulation_failed(format!("invalid gas_used: {}", gas_info.gas_used)))?;

        debug!(gas_used, "rest simulation succeeded");

        Ok(gas_used)
    }
}

#[async_trait]
impl GasSimulator for RestSimulator {
    async fn simulate(&self, tx_bytes: Vec<u8>) -> Result<u64, Error> {
        with_timeout(&self.endpoint, self.timeout, self.do_simulate(tx_bytes)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use crate::lifecycle::SubmissionErrorKind;

    #[tokio::test]
    async fn unresponsive_rest_gateway_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        // Read requests but never answer them.
        tokio::spawn(async move {
            let mut connections = Vec::new();

            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                connections.push(socket);
            }
        });

        let url: Url = format!("http://{address}").parse().unwrap();
        let simulator = RestSimulator::new(&url, Duration::from_millis(200));

        let err = simulator.simulate(vec![1, 2, 3]).await.unwrap_err();

        assert!(err.to_string().contains("timed out"), "unexpected error: {err}");
        assert_eq!(err.submission_kind(), Some(SubmissionErrorKind::Estimation));
    }
}
