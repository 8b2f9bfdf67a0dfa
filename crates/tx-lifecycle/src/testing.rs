//! In-memory chain, simulator and indexer for exercising the lifecycle
//! without a network.

use core::time::Duration;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use ibc_proto::cosmos::bank::v1beta1::MsgSend;
use ibc_proto::cosmos::base::v1beta1::Coin;
use ibc_proto::google::protobuf::Any;
use prost::Message;
use tendermint::Hash as TxHash;

use crate::chain::client::{BroadcastResponse, ChainClient, TxResult};
use crate::chain::cosmos::amino::MSG_SEND_TYPE_URL;
use crate::chain::cosmos::encode::{decode_tx, tx_hash, DecodedTx};
use crate::chain::cosmos::simulate::GasSimulator;
use crate::chain::cosmos::types::account::Account;
use crate::config::{GasPrice, LifecycleConfig};
use crate::error::Error;
use crate::indexer::IndexerClient;
use crate::lifecycle::TxController;
use crate::sdk_error::{INCORRECT_ACCOUNT_SEQUENCE_ERR, SDK_CODESPACE};
use crate::signer::local::address_from_public_key;
use crate::signer::{Secp256k1Signer, SigningScheme};

pub const TEST_SECRET_KEY: &str =
    "1e99423a4ed27608a15a2616a2b0e9e52ced330ac530edcc32c8ffc6a526aedd";

pub const TEST_ACCOUNT_PREFIX: &str = "cosmos";

pub const TEST_CHAIN_ID: &str = "cosmoshub-4";

pub fn msg_send(from: &str, to: &str, amount: u64) -> Any {
    let msg = MsgSend {
        from_address: from.to_string(),
        to_address: to.to_string(),
        amount: vec![Coin {
            denom: "uatom".to_string(),
            amount: amount.to_string(),
        }],
    };

    Any {
        type_url: MSG_SEND_TYPE_URL.to_string(),
        value: msg.encode_to_vec(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unavailable(what: &str) -> Error {
    Error::http_response(
        reqwest::StatusCode::SERVICE_UNAVAILABLE,
        format!("{what} unavailable"),
    )
}

/// A transaction accepted by [`MockChain::broadcast_tx_sync`].
#[derive(Clone, Debug)]
pub struct Broadcast {
    pub hash: TxHash,
    pub signer: String,
    pub sequence: u64,
    pub tx: DecodedTx,
}

/// Chain node holding accounts in memory.
///
/// Broadcasts are checked against the signer's account sequence the way the
/// SDK ante handler does, and rejected with code 32 on a mismatch.
pub struct MockChain {
    state: Mutex<ChainState>,
}

#[derive(Default)]
struct ChainState {
    accounts: HashMap<String, Account>,
    account_queries: usize,
    broadcast_calls: usize,
    broadcasts: Vec<Broadcast>,
    check_tx_codes: VecDeque<u32>,
    broadcast_errors: usize,
    committed: HashSet<TxHash>,
    pending_polls: usize,
    tx_code: u32,
    tx_log: String,
    query_errors: usize,
    tx_queries: usize,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChainState::default()),
        }
    }

    pub fn set_account(&self, address: &str, number: u64, sequence: u64) {
        lock(&self.state)
            .accounts
            .insert(address.to_string(), Account::new(number, sequence));
    }

    pub fn account(&self, address: &str) -> Option<Account> {
        lock(&self.state).accounts.get(address).cloned()
    }

    pub fn account_queries(&self) -> usize {
        lock(&self.state).account_queries
    }

    /// Number of `broadcast_tx_sync` calls, accepted or not.
    pub fn broadcast_calls(&self) -> usize {
        lock(&self.state).broadcast_calls
    }

    /// Accepted transactions, in broadcast order.
    pub fn broadcasts(&self) -> Vec<Broadcast> {
        lock(&self.state).broadcasts.clone()
    }

    pub fn tx_queries(&self) -> usize {
        lock(&self.state).tx_queries
    }

    /// Answer the next broadcasts with these `CheckTx` codes instead of
    /// running the sequence check.
    pub fn script_check_tx(&self, codes: impl IntoIterator<Item = u32>) {
        lock(&self.state).check_tx_codes.extend(codes);
    }

    /// Fail the next `count` broadcasts at the transport level.
    pub fn fail_broadcasts(&self, count: usize) {
        lock(&self.state).broadcast_errors = count;
    }

    /// Report committed transactions as not yet included for `count` polls.
    pub fn set_pending_polls(&self, count: usize) {
        lock(&self.state).pending_polls = count;
    }

    /// Result code and log of committed transactions.
    pub fn set_tx_result(&self, code: u32, log: &str) {
        let mut state = lock(&self.state);
        state.tx_code = code;
        state.tx_log = log.to_string();
    }

    /// Fail the next `count` transaction queries.
    pub fn fail_tx_queries(&self, count: usize) {
        lock(&self.state).query_errors = count;
    }
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

fn signer_address(tx: &DecodedTx) -> Result<String, Error> {
    let public_key = tx
        .auth_info
        .signer_infos
        .first()
        .and_then(|info| info.public_key.as_ref())
        .ok_or_else(|| Error::signer("transaction carries no signer public key".to_string()))?;

    let key = Vec::<u8>::decode(public_key.value.as_slice())
        .map_err(|e| Error::protobuf_decode("PubKey".to_string(), e))?;

    address_from_public_key(&key, TEST_ACCOUNT_PREFIX)
}

#[async_trait]
impl ChainClient for MockChain {
    async fn query_account(&self, address: &str) -> Result<Account, Error> {
        let mut state = lock(&self.state);
        state.account_queries += 1;

        state
            .accounts
            .get(address)
            .cloned()
            .ok_or_else(|| Error::empty_query_account(address.to_string()))
    }

    async fn broadcast_tx_sync(&self, tx_bytes: Vec<u8>) -> Result<BroadcastResponse, Error> {
        let hash = tx_hash(&tx_bytes);
        let tx = decode_tx(&tx_bytes)?;
        let signer = signer_address(&tx)?;
        let sequence = tx.sequence().map(|s| s.to_u64()).unwrap_or_default();

        let mut state = lock(&self.state);
        state.broadcast_calls += 1;

        if state.broadcast_errors > 0 {
            state.broadcast_errors -= 1;
            return Err(unavailable("node"));
        }

        let rejected = |code: u32, log: String| BroadcastResponse {
            hash,
            code,
            codespace: SDK_CODESPACE.to_string(),
            log,
        };

        if let Some(code) = state.check_tx_codes.pop_front() {
            if code != 0 {
                return Ok(rejected(code, format!("scripted CheckTx failure {code}")));
            }
        }

        let account = state
            .accounts
            .get_mut(&signer)
            .ok_or_else(|| Error::empty_query_account(signer.clone()))?;

        if account.sequence.to_u64() != sequence {
            let log = format!(
                "account sequence mismatch, expected {}, got {}: incorrect account sequence",
                account.sequence, sequence
            );

            return Ok(rejected(INCORRECT_ACCOUNT_SEQUENCE_ERR, log));
        }

        account.record_accepted();

        state.committed.insert(hash);
        state.broadcasts.push(Broadcast {
            hash,
            signer,
            sequence,
            tx,
        });

        Ok(BroadcastResponse {
            hash,
            code: 0,
            codespace: String::new(),
            log: String::new(),
        })
    }

    async fn query_tx(&self, hash: &TxHash) -> Result<Option<TxResult>, Error> {
        let mut state = lock(&self.state);
        state.tx_queries += 1;

        if state.query_errors > 0 {
            state.query_errors -= 1;
            return Err(unavailable("node"));
        }

        if !state.committed.contains(hash) {
            return Ok(None);
        }

        if state.pending_polls > 0 {
            state.pending_polls -= 1;
            return Ok(None);
        }

        Ok(Some(TxResult {
            hash: *hash,
            height: 42,
            code: state.tx_code,
            codespace: if state.tx_code == 0 {
                String::new()
            } else {
                SDK_CODESPACE.to_string()
            },
            log: state.tx_log.clone(),
            gas_wanted: 140_000,
            gas_used: 98_000,
        }))
    }
}

/// Simulator charging a fixed amount of gas per message.
pub struct MockSimulator {
    state: Mutex<SimulatorState>,
}

struct SimulatorState {
    gas_per_message: u64,
    failure: Option<String>,
    delays: VecDeque<Duration>,
    calls: usize,
}

impl MockSimulator {
    pub fn new(gas_per_message: u64) -> Self {
        Self {
            state: Mutex::new(SimulatorState {
                gas_per_message,
                failure: None,
                delays: VecDeque::new(),
                calls: 0,
            }),
        }
    }

    /// Fail every simulation with `reason` until [`Self::recover`] is called.
    pub fn fail_with(&self, reason: &str) {
        lock(&self.state).failure = Some(reason.to_string());
    }

    pub fn recover(&self) {
        lock(&self.state).failure = None;
    }

    /// Delay the next simulations, one entry per call.
    pub fn delay_next(&self, delays: impl IntoIterator<Item = Duration>) {
        lock(&self.state).delays.extend(delays);
    }

    pub fn calls(&self) -> usize {
        lock(&self.state).calls
    }
}

#[async_trait]
impl GasSimulator for MockSimulator {
    async fn simulate(&self, tx_bytes: Vec<u8>) -> Result<u64, Error> {
        let messages = decode_tx(&tx_bytes)?.body.messages.len() as u64;

        let (delay, result) = {
            let mut state = lock(&self.state);
            state.calls += 1;

            let result = match &state.failure {
                Some(reason) => Err(Error::simulation_failed(reason.clone())),
                None => Ok(state.gas_per_message * messages),
            };

            (state.delays.pop_front(), result)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        result
    }
}

/// Indexer answering with scripted statuses, then `None`.
#[derive(Default)]
pub struct MockIndexer {
    state: Mutex<IndexerState>,
}

#[derive(Default)]
struct IndexerState {
    statuses: VecDeque<Option<String>>,
    calls: usize,
}

impl MockIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script<S: Into<String>>(&self, statuses: impl IntoIterator<Item = Option<S>>) {
        lock(&self.state)
            .statuses
            .extend(statuses.into_iter().map(|s| s.map(Into::into)));
    }

    pub fn calls(&self) -> usize {
        lock(&self.state).calls
    }
}

#[async_trait]
impl IndexerClient for MockIndexer {
    async fn transaction_status(&self, _hash: &TxHash) -> Result<Option<String>, Error> {
        let mut state = lock(&self.state);
        state.calls += 1;

        Ok(state.statuses.pop_front().flatten())
    }
}

/// A controller wired to in-memory components, with the test key's account
/// registered on the chain.
pub struct TestSetup {
    pub chain: Arc<MockChain>,
    pub simulator: Arc<MockSimulator>,
    pub indexer: Arc<MockIndexer>,
    pub signer: Arc<Secp256k1Signer>,
    pub controller: TxController,
}

impl TestSetup {
    pub const ACCOUNT_NUMBER: u64 = 7;

    pub fn new(scheme: SigningScheme) -> Result<Self, Error> {
        Self::with_config(scheme, Self::config())
    }

    /// 0.005uatom gas price, default multipliers.
    pub fn config() -> LifecycleConfig {
        LifecycleConfig::new(GasPrice::new(0.005, "uatom".to_string()))
    }

    pub fn with_config(scheme: SigningScheme, config: LifecycleConfig) -> Result<Self, Error> {
        let chain = Arc::new(MockChain::new());
        let simulator = Arc::new(MockSimulator::new(100_000));
        let indexer = Arc::new(MockIndexer::new());
        let signer = Arc::new(Secp256k1Signer::from_hex(
            TEST_SECRET_KEY,
            TEST_ACCOUNT_PREFIX,
            scheme,
        )?);

        chain.set_account(signer.address(), Self::ACCOUNT_NUMBER, 0);

        let controller = TxController::new(
            TEST_CHAIN_ID,
            chain.clone(),
            simulator.clone(),
            indexer.clone(),
            signer.clone(),
            config,
        );

        Ok(Self {
            chain,
            simulator,
            indexer,
            signer,
            controller,
        })
    }

    pub fn address(&self) -> &str {
        self.signer.address()
    }

    /// A bank send of `amount` from the test account.
    pub fn send(&self, amount: u64) -> Any {
        msg_send(self.address(), "cosmos1recipient", amount)
    }
}
