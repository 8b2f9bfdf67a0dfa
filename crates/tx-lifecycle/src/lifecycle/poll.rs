use tendermint::Hash as TxHash;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, span, trace, warn, Instrument, Level};

use crate::error::Error;
use crate::indexer::IndexerStatus;
use crate::lifecycle::controller::TxController;
use crate::lifecycle::error::{Stage, SubmissionError};
use crate::lifecycle::handle::TxHandle;
use crate::lifecycle::state::TxLifecycleState;
use crate::sdk_error::sdk_error_from_tx_code;

/// Poll the chain and then the indexer for `hash` until the handle reaches a
/// terminal state or is cancelled.
pub(crate) fn spawn_confirmation(
    controller: TxController,
    handle: TxHandle,
    hash: TxHash,
) -> JoinHandle<()> {
    let span = span!(
        Level::INFO,
        "confirm",
        tx_hash = %hash,
        signer = %handle.signer_address()
    );

    tokio::spawn(confirm(controller, handle, hash).instrument(span))
}

async fn confirm(controller: TxController, handle: TxHandle, hash: TxHash) {
    let poll_interval = controller.config().poll_interval;
    let poll_timeout = controller.config().poll_timeout;
    let max_failures = usize::from(controller.config().max_poll_failures);

    let started = Instant::now();
    let mut failures = 0;

    debug!("starting confirmation polling every {:?}", poll_interval);

    loop {
        tokio::select! {
            _ = handle.cancelled() => {
                debug!("confirmation polling cancelled");
                return;
            }
            _ = sleep(poll_interval) => {}
        }

        if let Some(timeout) = poll_timeout {
            let elapsed = started.elapsed();

            if elapsed >= timeout {
                let e = Error::poll_timeout(hash, elapsed);
                handle.fail(SubmissionError::from_error(Stage::Confirmation, &e));
                return;
            }
        }

        let polled = tokio::select! {
            _ = handle.cancelled() => {
                debug!("confirmation polling cancelled");
                return;
            }
            polled = poll_once(&controller, &handle, &hash) => polled,
        };

        match polled {
            Ok(()) => failures = 0,
            Err(e) => {
                failures += 1;

                if failures >= max_failures {
                    let e = Error::poll_failures(hash, failures, e.to_string());
                    handle.fail(SubmissionError::from_error(Stage::Confirmation, &e));
                    return;
                }

                warn!(
                    "poll failed ({}/{} consecutive failures): {}",
                    failures, max_failures, e
                );
            }
        }

        if handle.state().is_terminal() {
            debug!(state = %handle.state(), "confirmation polling done");
            return;
        }
    }
}

/// One poll tick: the chain node while the transaction is `Submitted`, the
/// indexer once it is committed.
async fn poll_once(controller: &TxController, handle: &TxHandle, hash: &TxHash) -> Result<(), Error> {
    let state = handle.state();

    match state {
        TxLifecycleState::Submitted => {
            let Some(result) = controller.chain().query_tx(hash).await? else {
                trace!("not yet included in a block");
                return Ok(());
            };

            if result.is_ok() {
                info!(
                    height = result.height,
                    gas_used = result.gas_used,
                    "transaction committed"
                );

                handle.transition(TxLifecycleState::ConfirmedOnChain)?;
            } else {
                error!(
                    height = result.height,
                    code = result.code,
                    "transaction failed on chain: {}",
                    sdk_error_from_tx_code(&result.codespace, result.code)
                );

                let e = Error::tx_failed(*hash, result.code, result.log);
                handle.fail(SubmissionError::from_error(Stage::Confirmation, &e));
            }
        }

        TxLifecycleState::ConfirmedOnChain | TxLifecycleState::ConfirmedByIndexer => {
            let Some(status) = controller.indexer().transaction_status(hash).await? else {
                trace!("not yet seen by the indexer");
                return Ok(());
            };

            match IndexerStatus::classify(&status) {
                IndexerStatus::Success => {
                    if state == TxLifecycleState::ConfirmedOnChain {
                        handle.transition(TxLifecycleState::ConfirmedByIndexer)?;
                    }

                    handle.transition(TxLifecycleState::Finalized)?;
                }
                IndexerStatus::Failed(status) => {
                    let e = Error::indexer_failure(*hash, status);
                    handle.fail(SubmissionError::from_error(Stage::Confirmation, &e));
                }
                IndexerStatus::Processing(status) => {
                    trace!(%status, "indexer still processing");

                    if state == TxLifecycleState::ConfirmedOnChain {
                        handle.transition(TxLifecycleState::ConfirmedByIndexer)?;
                    }
                }
            }
        }

        _ => {}
    }

    Ok(())
}
