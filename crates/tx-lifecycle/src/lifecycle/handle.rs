use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ibc_proto::cosmos::tx::v1beta1::Fee;
use ibc_proto::google::protobuf::Any;
use tendermint::Hash as TxHash;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::chain::cosmos::types::tx::UnsignedTx;
use crate::error::Error;
use crate::lifecycle::controller::TxController;
use crate::lifecycle::error::{Stage, SubmissionError};
use crate::lifecycle::state::TxLifecycleState;

/// Observable state of a submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lifecycle {
    pub state: TxLifecycleState,
    /// Set when `state` is [`TxLifecycleState::Failed`].
    pub error: Option<SubmissionError>,
    /// Every state entered so far, including the current one.
    pub history: Vec<TxLifecycleState>,
}

impl Lifecycle {
    fn new(state: TxLifecycleState) -> Self {
        Self {
            state,
            error: None,
            history: vec![state],
        }
    }
}

/// Handle to a single submission.
///
/// Lifecycle, fee and transaction hash live in separate watch channels, so
/// confirmation polling and a concurrent re-estimation never contend.
///
/// Dropping the last clone abandons the submission: background polling stops
/// as if [`TxHandle::cancel`] had been called.
#[derive(Clone)]
pub struct TxHandle {
    inner: Arc<HandleInner>,
    /// Shared by caller-held clones only; `None` in background tasks.
    owner: Option<Arc<Owner>>,
}

/// Cancels the submission once every caller-held handle is gone.
struct Owner(Arc<HandleInner>);

impl Drop for Owner {
    fn drop(&mut self) {
        let inner = &self.0;

        if !inner.cancel.send_replace(true) && !inner.lifecycle.borrow().state.is_terminal() {
            debug!(signer = %inner.signer_address, "submission abandoned, stopping");
        }
    }
}

struct HandleInner {
    controller: TxController,
    signer_address: String,
    request: Mutex<Option<UnsignedTx>>,
    lifecycle: watch::Sender<Lifecycle>,
    fee: watch::Sender<Option<Fee>>,
    tx_hash: watch::Sender<Option<TxHash>>,
    cancel: watch::Sender<bool>,
    estimate_generation: AtomicU64,
}

impl TxHandle {
    pub(crate) fn new(
        controller: TxController,
        signer_address: String,
        request: Option<UnsignedTx>,
        state: TxLifecycleState,
        tx_hash: Option<TxHash>,
    ) -> Self {
        let (lifecycle, _) = watch::channel(Lifecycle::new(state));
        let (fee, _) = watch::channel(None);
        let (tx_hash, _) = watch::channel(tx_hash);
        let (cancel, _) = watch::channel(false);

        let inner = Arc::new(HandleInner {
            controller,
            signer_address,
            request: Mutex::new(request),
            lifecycle,
            fee,
            tx_hash,
            cancel,
            estimate_generation: AtomicU64::new(0),
        });

        Self {
            owner: Some(Arc::new(Owner(inner.clone()))),
            inner,
        }
    }

    /// A copy for background tasks, which does not keep the submission alive.
    pub(crate) fn detached(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            owner: None,
        }
    }

    pub fn signer_address(&self) -> &str {
        &self.inner.signer_address
    }

    pub fn state(&self) -> TxLifecycleState {
        self.inner.lifecycle.borrow().state
    }

    pub fn error(&self) -> Option<SubmissionError> {
        self.inner.lifecycle.borrow().error.clone()
    }

    pub fn history(&self) -> Vec<TxLifecycleState> {
        self.inner.lifecycle.borrow().history.clone()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.lifecycle.borrow().clone()
    }

    /// The fee of the latest estimate, `None` while an estimate is running.
    pub fn fee(&self) -> Option<Fee> {
        self.inner.fee.borrow().clone()
    }

    pub fn tx_hash(&self) -> Option<TxHash> {
        *self.inner.tx_hash.borrow()
    }

    /// The messages, memo and options this submission was created with.
    /// `None` for hashes tracked with [`TxController::track`].
    pub fn request(&self) -> Option<UnsignedTx> {
        self.lock_request().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Lifecycle> {
        self.inner.lifecycle.subscribe()
    }

    pub fn subscribe_fee(&self) -> watch::Receiver<Option<Fee>> {
        self.inner.fee.subscribe()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancel.borrow()
    }

    /// Replace the message set and re-estimate the fee.
    ///
    /// Only allowed before signing. The previous fee is cleared immediately,
    /// and the result of any estimate still running for the previous
    /// messages is discarded.
    pub async fn update_messages(&self, messages: Vec<Any>) -> Result<(), SubmissionError> {
        self.ensure_not_cancelled()?;

        let state = self.state();
        if !matches!(
            state,
            TxLifecycleState::Initial | TxLifecycleState::Estimating
        ) {
            return Err(precondition(Error::invalid_state(
                state,
                "update messages".to_string(),
            )));
        }

        match self.lock_request().as_mut() {
            Some(request) => request.messages = messages,
            None => return Err(precondition(Error::missing_tx_data())),
        }

        self.inner.fee.send_replace(None);

        self.inner.controller.estimate(self).await
    }

    /// Sign the transaction with the estimated fee and broadcast it.
    ///
    /// Returns once the node accepted the transaction; confirmation is then
    /// tracked in the background.
    pub async fn sign_and_broadcast(&self) -> Result<TxHash, SubmissionError> {
        self.ensure_not_cancelled()?;

        let state = self.state();
        if state != TxLifecycleState::Estimating {
            return Err(precondition(Error::invalid_state(
                state,
                "sign and broadcast".to_string(),
            )));
        }

        let fee = self
            .fee()
            .ok_or_else(|| precondition(Error::fee_not_computed()))?;

        let request = self
            .request()
            .ok_or_else(|| precondition(Error::missing_tx_data()))?;

        self.transition(TxLifecycleState::Signing)
            .map_err(precondition)?;

        self.inner
            .controller
            .broadcast(self, &request, &fee)
            .await
    }

    /// Restart a failed submission.
    ///
    /// With a computed fee the transaction is re-signed and re-broadcast with
    /// that fee. Otherwise the fee is estimated again, after which the caller
    /// signs as usual.
    pub async fn retry(&self) -> Result<(), SubmissionError> {
        self.ensure_not_cancelled()?;

        let state = self.state();
        if state != TxLifecycleState::Failed {
            return Err(precondition(Error::invalid_state(state, "retry".to_string())));
        }

        let request = self
            .request()
            .ok_or_else(|| precondition(Error::missing_tx_data()))?;

        self.restart().map_err(precondition)?;

        match self.fee() {
            Some(fee) => {
                info!(signer = %self.signer_address(), "retrying with the previously computed fee");

                self.transition(TxLifecycleState::Estimating)
                    .map_err(precondition)?;
                self.transition(TxLifecycleState::Signing)
                    .map_err(precondition)?;

                self.inner
                    .controller
                    .broadcast(self, &request, &fee)
                    .await
                    .map(|_| ())
            }
            None => {
                info!(signer = %self.signer_address(), "retrying from estimation");

                self.inner.controller.estimate(self).await
            }
        }
    }

    /// Stop confirmation polling and discard pending estimates.
    ///
    /// Idempotent. The lifecycle keeps its current state: a transaction that
    /// already left the process may still be committed.
    pub fn cancel(&self) {
        let first = !self.inner.cancel.send_replace(true);

        if first {
            debug!(signer = %self.signer_address(), state = %self.state(), "cancelling submission");
        }
    }

    /// Wait until the submission reaches a terminal state or is cancelled.
    pub async fn wait_terminal(&self) -> Lifecycle {
        let mut receiver = self.subscribe();

        loop {
            if receiver.borrow_and_update().state.is_terminal() {
                break;
            }

            tokio::select! {
                changed = receiver.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = self.cancelled() => break,
            }
        }

        self.lifecycle()
    }

    /// Resolves once the submission is cancelled or abandoned.
    pub(crate) async fn cancelled(&self) {
        let mut receiver = self.inner.cancel.subscribe();

        // The sender lives as long as `self`, so this only returns once cancelled.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }

    /// Record a transition to `to`, which must be the successor of the
    /// current state or `Failed`.
    pub(crate) fn transition(&self, to: TxLifecycleState) -> Result<(), Error> {
        self.record(to, None)
    }

    /// Move to `Failed` with `error`. Returns `false` if the submission was
    /// already terminal.
    pub(crate) fn fail(&self, error: SubmissionError) -> bool {
        error!(
            signer = %self.signer_address(),
            tx_hash = ?self.tx_hash(),
            kind = %error.kind,
            "submission failed: {}",
            error.message
        );

        self.record(TxLifecycleState::Failed, Some(error)).is_ok()
    }

    fn record(&self, to: TxLifecycleState, error: Option<SubmissionError>) -> Result<(), Error> {
        let mut from = to;
        let mut accepted = false;

        self.inner.lifecycle.send_if_modified(|lifecycle| {
            from = lifecycle.state;

            if !lifecycle.state.can_transition_to(to) {
                return false;
            }

            lifecycle.state = to;
            lifecycle.error = error;
            lifecycle.history.push(to);
            accepted = true;

            true
        });

        if !accepted {
            return Err(Error::invalid_transition(from, to));
        }

        info!(
            signer = %self.signer_address(),
            tx_hash = ?self.tx_hash(),
            "{} -> {}",
            from,
            to
        );

        self.inner.controller.journal_transition(self, to);

        Ok(())
    }

    /// Go back from `Failed` to `Initial` for a retry, keeping the fee.
    ///
    /// Fails if the submission is no longer `Failed`, so that of two
    /// concurrent retries only one proceeds.
    fn restart(&self) -> Result<(), Error> {
        let mut from = TxLifecycleState::Failed;

        let restarted = self.inner.lifecycle.send_if_modified(|lifecycle| {
            from = lifecycle.state;

            if lifecycle.state != TxLifecycleState::Failed {
                return false;
            }

            lifecycle.state = TxLifecycleState::Initial;
            lifecycle.error = None;
            lifecycle.history.push(TxLifecycleState::Initial);

            true
        });

        if !restarted {
            return Err(Error::invalid_state(from, "retry".to_string()));
        }

        self.inner.tx_hash.send_replace(None);

        info!(signer = %self.signer_address(), "{} -> {}", from, TxLifecycleState::Initial);

        Ok(())
    }

    pub(crate) fn set_fee(&self, fee: Fee) {
        self.inner.fee.send_replace(Some(fee));
    }

    pub(crate) fn set_tx_hash(&self, tx_hash: TxHash) {
        self.inner.tx_hash.send_replace(Some(tx_hash));
    }

    /// Start a new estimate, invalidating the ones still running.
    pub(crate) fn next_estimate_generation(&self) -> u64 {
        self.inner.estimate_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn is_current_estimate(&self, generation: u64) -> bool {
        self.inner.estimate_generation.load(Ordering::SeqCst) == generation
    }

    fn ensure_not_cancelled(&self) -> Result<(), SubmissionError> {
        if self.is_cancelled() {
            Err(precondition(Error::cancelled()))
        } else {
            Ok(())
        }
    }

    fn lock_request(&self) -> MutexGuard<'_, Option<UnsignedTx>> {
        self.inner
            .request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxHandle")
            .field("signer_address", &self.inner.signer_address)
            .field("lifecycle", &*self.inner.lifecycle.borrow())
            .field("tx_hash", &self.tx_hash())
            .finish()
    }
}

pub(crate) fn precondition(error: Error) -> SubmissionError {
    SubmissionError::from_error(Stage::Precondition, &error)
}
