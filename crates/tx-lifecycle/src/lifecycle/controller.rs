use std::sync::Arc;

use ibc_proto::cosmos::tx::v1beta1::Fee;
use ibc_proto::google::protobuf::Any;
use tendermint::Hash as TxHash;
use tracing::{debug, error, info, warn};

use crate::chain::client::{BroadcastResponse, ChainClient};
use crate::chain::cosmos::amino::AminoTypes;
use crate::chain::cosmos::encode::encode_tx_raw;
use crate::chain::cosmos::estimate::{encode_simulation_tx, estimate_gas, gas_amount_to_fee};
use crate::chain::cosmos::query::account::{get_or_fetch_account, refresh_account};
use crate::chain::cosmos::sign::sign_tx;
use crate::chain::cosmos::simulate::{GasSimulator, GrpcSimulator, RestSimulator};
use crate::chain::cosmos::types::account::{Account, AccountSequence};
use crate::chain::cosmos::types::tx::{SignerData, UnsignedTx};
use crate::chain::cosmos::CosmosClient;
use crate::config::types::Memo;
use crate::config::{Config, Error as ConfigError, LifecycleConfig, SimulationBackend};
use crate::error::Error;
use crate::indexer::{GraphQlIndexer, IndexerClient};
use crate::journal::TxJournal;
use crate::lifecycle::accounts::AccountSlots;
use crate::lifecycle::error::{Stage, SubmissionError};
use crate::lifecycle::handle::{precondition, TxHandle};
use crate::lifecycle::poll::spawn_confirmation;
use crate::lifecycle::state::TxLifecycleState;
use crate::sdk_error::{sdk_error_from_tx_code, INCORRECT_ACCOUNT_SEQUENCE_ERR};
use crate::signer::{find_account, OfflineSigner, SigningScheme};

/// Drives submissions for one chain and one external signer.
///
/// Cheap to clone; clones share the per-signer account cache.
#[derive(Clone)]
pub struct TxController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    chain_id: String,
    chain: Arc<dyn ChainClient>,
    simulator: Arc<dyn GasSimulator>,
    indexer: Arc<dyn IndexerClient>,
    signer: Arc<dyn OfflineSigner>,
    scheme: SigningScheme,
    amino_types: AminoTypes,
    config: LifecycleConfig,
    accounts: AccountSlots,
    journal: Option<TxJournal>,
}

pub struct TxControllerBuilder {
    chain_id: String,
    chain: Arc<dyn ChainClient>,
    simulator: Arc<dyn GasSimulator>,
    indexer: Arc<dyn IndexerClient>,
    signer: Arc<dyn OfflineSigner>,
    config: LifecycleConfig,
    amino_types: AminoTypes,
    journal: Option<TxJournal>,
}

impl TxControllerBuilder {
    /// Replace the default amino converters (bank send, staking delegate).
    pub fn amino_types(mut self, amino_types: AminoTypes) -> Self {
        self.amino_types = amino_types;
        self
    }

    pub fn journal(mut self, journal: TxJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn build(self) -> TxController {
        let scheme = self.signer.signing_scheme();

        debug!(chain = %self.chain_id, %scheme, "building transaction controller");

        TxController {
            inner: Arc::new(ControllerInner {
                chain_id: self.chain_id,
                chain: self.chain,
                simulator: self.simulator,
                indexer: self.indexer,
                signer: self.signer,
                scheme,
                amino_types: self.amino_types,
                config: self.config,
                accounts: AccountSlots::default(),
                journal: self.journal,
            }),
        }
    }
}

impl TxController {
    pub fn new(
        chain_id: impl Into<String>,
        chain: Arc<dyn ChainClient>,
        simulator: Arc<dyn GasSimulator>,
        indexer: Arc<dyn IndexerClient>,
        signer: Arc<dyn OfflineSigner>,
        config: LifecycleConfig,
    ) -> Self {
        Self::builder(chain_id, chain, simulator, indexer, signer, config).build()
    }

    pub fn builder(
        chain_id: impl Into<String>,
        chain: Arc<dyn ChainClient>,
        simulator: Arc<dyn GasSimulator>,
        indexer: Arc<dyn IndexerClient>,
        signer: Arc<dyn OfflineSigner>,
        config: LifecycleConfig,
    ) -> TxControllerBuilder {
        TxControllerBuilder {
            chain_id: chain_id.into(),
            chain,
            simulator,
            indexer,
            signer,
            config,
            amino_types: AminoTypes::default(),
            journal: None,
        }
    }

    /// Build a controller talking to the endpoints of `config`.
    pub fn from_config(config: &Config, signer: Arc<dyn OfflineSigner>) -> Result<Self, Error> {
        let chain = CosmosClient::new(&config.chain)?;

        let simulator: Arc<dyn GasSimulator> = match config.chain.simulation {
            SimulationBackend::Grpc => Arc::new(GrpcSimulator::from_url(
                &config.chain.grpc_addr,
                config.chain.rpc_timeout,
            )?),
            SimulationBackend::Rest => {
                let rest_addr = config
                    .chain
                    .rest_addr
                    .as_ref()
                    .ok_or_else(|| Error::config(ConfigError::missing_rest_addr()))?;

                Arc::new(RestSimulator::new(rest_addr, config.chain.rpc_timeout))
            }
        };

        let indexer = GraphQlIndexer::new(&config.indexer);

        let mut builder = Self::builder(
            config.chain.id.to_string(),
            Arc::new(chain),
            simulator,
            Arc::new(indexer),
            signer,
            config.lifecycle_config(),
        );

        if let Some(journal) = &config.journal {
            builder = builder.journal(TxJournal::open(&journal.path)?);
        }

        Ok(builder.build())
    }

    pub fn chain_id(&self) -> &str {
        &self.inner.chain_id
    }

    pub fn signing_scheme(&self) -> SigningScheme {
        self.inner.scheme
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.inner.config
    }

    pub fn journal(&self) -> Option<&TxJournal> {
        self.inner.journal.as_ref()
    }

    /// The account currently cached for `signer_address`, if any.
    pub async fn cached_account(&self, signer_address: &str) -> Option<Account> {
        self.inner.accounts.cached(signer_address).await
    }

    /// Start a submission and estimate its fee.
    ///
    /// An empty `memo` falls back to the configured default memo. Estimation
    /// failures are recorded on the returned handle.
    pub async fn submit(
        &self,
        signer_address: &str,
        messages: Vec<Any>,
        memo: &str,
        extension_options: Vec<Any>,
    ) -> TxHandle {
        let memo = if memo.is_empty() {
            self.inner.config.default_memo.as_str()
        } else {
            memo
        };

        let request = UnsignedTx {
            messages,
            memo: memo.to_string(),
            timeout_height: 0,
            extension_options,
        };

        let handle = TxHandle::new(
            self.clone(),
            signer_address.to_string(),
            Some(request),
            TxLifecycleState::Initial,
            None,
        );

        // The outcome is recorded on the handle.
        let _ = self.estimate(&handle).await;

        handle
    }

    /// Resume confirmation tracking of a transaction that was already
    /// broadcast, possibly by another process.
    pub fn track(&self, signer_address: &str, hash: TxHash) -> TxHandle {
        let handle = TxHandle::new(
            self.clone(),
            signer_address.to_string(),
            None,
            TxLifecycleState::Submitted,
            Some(hash),
        );

        info!(signer = %signer_address, tx_hash = %hash, "tracking transaction");

        self.journal_transition(&handle, TxLifecycleState::Submitted);

        spawn_confirmation(self.clone(), handle.detached(), hash);

        handle
    }

    /// Track again every journaled transaction that did not reach a terminal
    /// state. Returns no handles when the controller has no journal.
    pub fn resume_pending(&self) -> Vec<TxHandle> {
        let Some(journal) = &self.inner.journal else {
            return Vec::new();
        };

        journal
            .pending()
            .into_iter()
            .map(|(hash, entry)| self.track(&entry.signer, hash))
            .collect()
    }

    /// Simulate `tx` for `signer_address` and compute its fee, without
    /// creating a submission.
    pub async fn estimate_fee(&self, signer_address: &str, tx: &UnsignedTx) -> Result<Fee, Error> {
        Memo::new(tx.memo.as_str())?;

        let account = find_account(self.inner.signer.as_ref(), signer_address).await?;

        let sequence = self.current_sequence(signer_address).await?;

        let tx_bytes = encode_simulation_tx(&account.public_key, sequence, tx)?;

        match estimate_gas(self.inner.simulator.as_ref(), tx_bytes).await {
            Ok(gas_used) => gas_amount_to_fee(&self.inner.config, &self.inner.chain_id, gas_used),
            Err(e) => {
                if e.is_account_sequence_mismatch() {
                    self.refresh_sequence(signer_address).await;
                }

                Err(e)
            }
        }
    }

    /// Estimate the fee of the handle's current message set and store it on
    /// the handle, unless a newer estimate was started in the meantime.
    pub(crate) async fn estimate(&self, handle: &TxHandle) -> Result<(), SubmissionError> {
        let generation = handle.next_estimate_generation();

        if handle.state() == TxLifecycleState::Initial {
            handle
                .transition(TxLifecycleState::Estimating)
                .map_err(precondition)?;
        }

        let request = handle
            .request()
            .ok_or_else(|| precondition(Error::missing_tx_data()))?;

        let estimated = tokio::select! {
            estimated = self.estimate_fee(handle.signer_address(), &request) => estimated,
            _ = handle.cancelled() => {
                return Err(precondition(Error::cancelled()));
            }
        };

        if !handle.is_current_estimate(generation) {
            debug!(signer = %handle.signer_address(), "discarding estimate for a replaced message set");

            return Ok(());
        }

        match estimated {
            Ok(fee) => {
                handle.set_fee(fee);
                Ok(())
            }
            Err(e) => {
                let error = SubmissionError::from_error(Stage::Estimation, &e);
                handle.fail(error.clone());
                Err(error)
            }
        }
    }

    /// Sign and broadcast for a handle in the `Signing` state, then start
    /// confirmation polling.
    pub(crate) async fn broadcast(
        &self,
        handle: &TxHandle,
        request: &UnsignedTx,
        fee: &Fee,
    ) -> Result<TxHash, SubmissionError> {
        let response = match self.sign_and_broadcast_tx(handle, request, fee).await {
            Ok(response) => response,
            Err(e) => {
                let error = SubmissionError::from_error(Stage::Signing, &e);
                handle.fail(error.clone());
                return Err(error);
            }
        };

        let hash = response.hash;

        handle.set_tx_hash(hash);
        handle
            .transition(TxLifecycleState::Submitted)
            .map_err(precondition)?;

        if handle.is_cancelled() {
            debug!(tx_hash = %hash, "cancelled after broadcast, not polling");
        } else {
            spawn_confirmation(self.clone(), handle.detached(), hash);
        }

        Ok(hash)
    }

    /// Resolve the account, sign and broadcast while holding the signer's
    /// account slot, so that no other submission observes the same sequence.
    async fn sign_and_broadcast_tx(
        &self,
        handle: &TxHandle,
        request: &UnsignedTx,
        fee: &Fee,
    ) -> Result<BroadcastResponse, Error> {
        let address = handle.signer_address();

        let account_data = find_account(self.inner.signer.as_ref(), address).await?;

        let slot = self.inner.accounts.slot(address);
        let mut cached = slot.lock().await;

        let account = get_or_fetch_account(self.inner.chain.as_ref(), address, &mut cached).await?;

        let signer_data = SignerData {
            account_number: account.number,
            sequence: account.sequence,
            chain_id: self.inner.chain_id.clone(),
        };

        let signed = sign_tx(
            self.inner.signer.as_ref(),
            self.inner.scheme,
            &self.inner.amino_types,
            &account_data,
            request,
            fee,
            &signer_data,
        )
        .await?;

        if handle.is_cancelled() {
            return Err(Error::cancelled());
        }

        let tx_bytes = encode_tx_raw(signed.to_tx_raw())?;

        let response = match self.inner.chain.broadcast_tx_sync(tx_bytes).await {
            Ok(response) => response,
            Err(e) => {
                // The node may or may not have accepted the transaction.
                *cached = None;
                return Err(e);
            }
        };

        if response.is_ok() {
            if let Some(account) = cached.as_mut() {
                account.record_accepted();
            }

            info!(
                signer = %address,
                tx_hash = %response.hash,
                sequence = %signer_data.sequence,
                "broadcast transaction"
            );

            return Ok(response);
        }

        let diagnostic = sdk_error_from_tx_code(&response.codespace, response.code);

        if response.code == INCORRECT_ACCOUNT_SEQUENCE_ERR {
            warn!(
                signer = %address,
                sequence = %signer_data.sequence,
                "broadcast rejected for an incorrect account sequence, dropping cached account"
            );

            *cached = None;
        }

        error!(
            signer = %address,
            tx_hash = %response.hash,
            code = response.code,
            "CheckTx failed: {}",
            diagnostic
        );

        Err(Error::broadcast_rejected(
            response.hash,
            response.code,
            response.log,
        ))
    }

    /// The sequence the next transaction of `signer_address` will be signed
    /// with.
    async fn current_sequence(&self, signer_address: &str) -> Result<AccountSequence, Error> {
        let slot = self.inner.accounts.slot(signer_address);
        let mut cached = slot.lock().await;

        let account =
            get_or_fetch_account(self.inner.chain.as_ref(), signer_address, &mut cached).await?;

        Ok(account.sequence)
    }

    async fn refresh_sequence(&self, signer_address: &str) {
        let slot = self.inner.accounts.slot(signer_address);
        let mut cached = slot.lock().await;

        let Some(account) = cached.as_mut() else {
            return;
        };

        warn!(signer = %signer_address, "simulation reported an account sequence mismatch, refreshing account");

        if let Err(e) = refresh_account(self.inner.chain.as_ref(), signer_address, account).await {
            warn!(signer = %signer_address, "failed to refresh account: {}", e);
            *cached = None;
        }
    }

    pub(crate) fn chain(&self) -> &dyn ChainClient {
        self.inner.chain.as_ref()
    }

    pub(crate) fn indexer(&self) -> &dyn IndexerClient {
        self.inner.indexer.as_ref()
    }

    /// Persist `state` for the handle's hash when a journal is configured.
    pub(crate) fn journal_transition(&self, handle: &TxHandle, state: TxLifecycleState) {
        let (Some(journal), Some(hash)) = (&self.inner.journal, handle.tx_hash()) else {
            return;
        };

        let written = match state {
            TxLifecycleState::Submitted => journal.record_submitted(hash, handle.signer_address()),
            state if state.is_terminal() => journal.update_state(hash, state),
            _ => return,
        };

        if let Err(e) = written {
            warn!(tx_hash = %hash, "failed to write transaction journal: {}", e);
        }
    }
}
