//! This module defines the various errors that can be raised while building,
//! signing, submitting and tracking a transaction.

use core::time::Duration;

use flex_error::{define_error, DisplayOnly, TraceError};
use tendermint::Hash as TxHash;
use tendermint_rpc::Error as TendermintRpcError;
use tendermint_rpc::Url;
use tonic::codegen::http::uri::InvalidUri;
use tonic::transport::Error as TransportError;
use tonic::Status as GrpcStatus;

use crate::config::Error as ConfigError;
use crate::lifecycle::{SubmissionErrorKind, TxLifecycleState};
use crate::signer::SigningScheme;

define_error! {
    Error {
        Io
            [ TraceError<std::io::Error> ]
            |_| { "I/O error" },

        Config
            [ ConfigError ]
            |_| { "invalid configuration" },

        Rpc
            { url: Url }
            [ TendermintRpcError ]
            |e| { format!("RPC error to endpoint {}", e.url) },

        RpcTimeout
            { url: Url, timeout: Duration }
            |e| { format!("RPC request to endpoint {} timed out after {:?}", e.url, e.timeout) },

        GrpcStatus
            { status: GrpcStatus, query: String }
            |e| { format!("gRPC call `{}` failed with status: {}", e.query, e.status) },

        GrpcTransport
            [ TraceError<TransportError> ]
            |_| { "error in underlying transport when making gRPC call" },

        InvalidUri
            { uri: String }
            [ TraceError<InvalidUri> ]
            |e| { format!("error parsing URI {}", e.uri) },

        ProtobufEncode
            { payload_type: String }
            [ TraceError<prost::EncodeError> ]
            |e| { format!("error encoding protocol buffer for {}", e.payload_type) },

        ProtobufDecode
            { payload_type: String }
            [ TraceError<prost::DecodeError> ]
            |e| { format!("error decoding protocol buffer for {}", e.payload_type) },

        HttpRequest
            [ TraceError<reqwest::Error> ]
            |_| { "HTTP request error" },

        HttpResponse
            { status: reqwest::StatusCode, body: String }
            |e| { format!("HTTP response error with status code {}: {}", e.status, e.body) },

        HttpResponseBody
            [ TraceError<reqwest::Error> ]
            |_| { "HTTP response body error" },

        Json
            { payload_type: String }
            [ TraceError<serde_json::Error> ]
            |e| { format!("error handling JSON for {}", e.payload_type) },

        EmptyQueryAccount
            { address: String }
            |e| { format!("query/account returned no account for address {}", e.address) },

        UnknownAccountType
            { type_url: String }
            |e| { format!("failed to deserialize account of an unknown protobuf type: {}", e.type_url) },

        SimulationFailed
            { reason: String }
            |e| { format!("transaction simulation failed: {}", e.reason) },

        JournalTask
            [ TraceError<tokio::task::JoinError> ]
            |_| { "transaction journal write task failed" },

        SimulationTimeout
            { endpoint: String, timeout: Duration }
            |e| { format!("simulation request to {} timed out after {:?}", e.endpoint, e.timeout) },

        EmptySimulationGasInfo
            |_| { "transaction simulation succeeded but returned no gas info" },

        GasEstimateExceeded
            { chain_id: String, estimated_gas: u64, max_gas: u64 }
            |e| {
                format!("{} gas estimate {} from simulated tx exceeds the maximum configured {}",
                    e.chain_id, e.estimated_gas, e.max_gas)
            },

        InvalidDecimal
            { value: String }
            |e| { format!("invalid decimal value: {}", e.value) },

        SignerAccountNotFound
            { address: String }
            |e| { format!("signer holds no account for address {}", e.address) },

        UnsupportedSignMode
            { scheme: SigningScheme }
            |e| { format!("signer does not support {} signing", e.scheme) },

        Signer
            { reason: String }
            |e| { format!("external signer failed: {}", e.reason) },

        InvalidKey
            [ TraceError<secp256k1::Error> ]
            |_| { "invalid secp256k1 key material" },

        InvalidHex
            { value: String }
            [ DisplayOnly<hex::FromHexError> ]
            |e| { format!("invalid hex string: {}", e.value) },

        Bech32Encoding
            [ TraceError<bech32::Error> ]
            |_| { "bech32 encoding failed" },

        UnknownAminoType
            { type_url: String }
            |e| { format!("no amino converter registered for message type {}", e.type_url) },

        UnknownAminoMsg
            { amino_type: String }
            |e| { format!("no amino converter registered for amino type {}", e.amino_type) },

        AminoConversion
            { type_url: String, reason: String }
            |e| { format!("failed to convert {} to or from amino JSON: {}", e.type_url, e.reason) },

        AminoExtensionOptions
            |_| { "legacy amino JSON signing does not support protobuf extension options" },

        InvalidSignedDoc
            { reason: String }
            |e| { format!("signer returned an invalid sign document: {}", e.reason) },

        MemoTooLong
            { length: usize, max: usize }
            |e| { format!("memo is {} characters long, the maximum is {}", e.length, e.max) },

        FeeNotComputed
            |_| { "fee has not been computed yet, estimate the transaction before signing" },

        InvalidTransition
            { from: TxLifecycleState, to: TxLifecycleState }
            |e| { format!("invalid lifecycle transition from {} to {}", e.from, e.to) },

        InvalidState
            { state: TxLifecycleState, action: String }
            |e| { format!("cannot {} while the submission is {}", e.action, e.state) },

        Cancelled
            |_| { "submission was cancelled" },

        MissingTxData
            |_| { "no prepared transaction data is available for this submission" },

        BroadcastRejected
            { hash: TxHash, code: u32, log: String }
            |e| { format!("broadcast of tx {} rejected with code {}: {}", e.hash, e.code, e.log) },

        TxFailed
            { hash: TxHash, code: u32, log: String }
            |e| { format!("tx {} failed on chain with code {}: {}", e.hash, e.code, e.log) },

        IndexerFailure
            { hash: TxHash, status: String }
            |e| { format!("indexer reported an error for tx {}: {}", e.hash, e.status) },

        IndexerQuery
            { reason: String }
            |e| { format!("indexer query failed: {}", e.reason) },

        PollFailures
            { hash: TxHash, attempts: usize, last_error: String }
            |e| {
                format!("giving up on tx {} after {} consecutive failed polls, last error: {}",
                    e.hash, e.attempts, e.last_error)
            },

        PollTimeout
            { hash: TxHash, elapsed: Duration }
            |e| { format!("tx {} was not confirmed after {:?}", e.hash, e.elapsed) },
    }
}

impl Error {
    /// The submission error kind intrinsic to this error, if any.
    ///
    /// Transport-level failures carry no intrinsic kind: they are classified by
    /// the lifecycle stage at which they surface.
    pub fn submission_kind(&self) -> Option<SubmissionErrorKind> {
        use ErrorDetail::*;

        match self.detail() {
            SignerAccountNotFound(_) | MissingTxData(_) | Cancelled(_) => {
                Some(SubmissionErrorKind::Generic)
            }

            SimulationFailed(_)
            | SimulationTimeout(_)
            | EmptySimulationGasInfo(_)
            | GasEstimateExceeded(_) => {
                Some(SubmissionErrorKind::Estimation)
            }

            FeeNotComputed(_)
            | InvalidTransition(_)
            | InvalidState(_)
            | UnknownAminoType(_)
            | UnknownAminoMsg(_)
            | AminoConversion(_)
            | AminoExtensionOptions(_)
            | MemoTooLong(_)
            | InvalidDecimal(_) => Some(SubmissionErrorKind::Validation),

            BroadcastRejected(_)
            | TxFailed(_)
            | IndexerFailure(_)
            | PollFailures(_)
            | PollTimeout(_) => Some(SubmissionErrorKind::Transaction),

            _ => None,
        }
    }

    /// Whether this error indicates that the sequence number used for the
    /// transaction is behind the one the chain expects.
    pub fn is_account_sequence_mismatch(&self) -> bool {
        match self.detail() {
            ErrorDetail::GrpcStatus(detail) => detail.is_account_sequence_mismatch(),
            ErrorDetail::SimulationFailed(detail) => {
                detail.reason.contains("account sequence mismatch")
            }
            ErrorDetail::BroadcastRejected(detail) => {
                detail.code == crate::sdk_error::INCORRECT_ACCOUNT_SEQUENCE_ERR
            }
            _ => false,
        }
    }
}

impl GrpcStatusSubdetail {
    /// Check whether this gRPC error matches
    /// - status: InvalidArgument
    /// - message: account sequence mismatch ...
    pub fn is_account_sequence_mismatch(&self) -> bool {
        if self.status.code() != tonic::Code::InvalidArgument
            && self.status.code() != tonic::Code::Unknown
        {
            return false;
        }

        self.status
            .message()
            .trim_start()
            .starts_with("account sequence mismatch")
    }
}
