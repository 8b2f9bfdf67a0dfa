mod estimate;
mod resume;
mod send;
mod track;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Subcommand, ValueEnum};
use cosmos_tx_lifecycle::config::Config;
use cosmos_tx_lifecycle::error::Error;
use cosmos_tx_lifecycle::lifecycle::{Lifecycle, TxHandle};
use cosmos_tx_lifecycle::signer::{AccountData, OfflineSigner, Secp256k1Signer, SigningScheme};
use cosmos_tx_lifecycle::{TxController, TxLifecycleState};
use eyre::eyre;
use tracing::warn;

use crate::output::Output;

pub use estimate::EstimateCmd;
pub use resume::ResumeCmd;
pub use send::SendCmd;
pub use track::TrackCmd;

#[derive(Debug, Subcommand)]
pub enum TxCtlCmd {
    /// Send tokens with a bank `MsgSend` and follow the transaction
    Send(SendCmd),

    /// Simulate a bank `MsgSend` and print the fee it would pay
    Estimate(EstimateCmd),

    /// Follow a transaction that was already broadcast
    Track(TrackCmd),

    /// Follow every journaled transaction that is not finalized yet
    Resume(ResumeCmd),
}

impl TxCtlCmd {
    pub async fn run(&self, config: &Config, output: &Output) -> eyre::Result<()> {
        match self {
            Self::Send(cmd) => cmd.run(config, output).await,
            Self::Estimate(cmd) => cmd.run(config, output).await,
            Self::Track(cmd) => cmd.run(config, output).await,
            Self::Resume(cmd) => cmd.run(config, output).await,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum SignModeArg {
    Direct,
    Amino,
}

impl From<SignModeArg> for SigningScheme {
    fn from(mode: SignModeArg) -> Self {
        match mode {
            SignModeArg::Direct => SigningScheme::Direct,
            SignModeArg::Amino => SigningScheme::Amino,
        }
    }
}

/// Load the hex-encoded secp256k1 secret key stored in `key_file`.
pub fn load_signer(
    config: &Config,
    key_file: &Path,
    sign_mode: SignModeArg,
) -> eyre::Result<Arc<Secp256k1Signer>> {
    let secret = std::fs::read_to_string(key_file)
        .map_err(|e| eyre!("failed to read key file {}: {e}", key_file.display()))?;

    let signer =
        Secp256k1Signer::from_hex(&secret, &config.chain.account_prefix, sign_mode.into())
            .map_err(|e| eyre!("invalid key in {}: {e}", key_file.display()))?;

    Ok(Arc::new(signer))
}

/// Signer without keys, for commands that only observe transactions.
pub struct WatchOnly;

#[async_trait]
impl OfflineSigner for WatchOnly {
    fn signing_scheme(&self) -> SigningScheme {
        SigningScheme::Direct
    }

    async fn accounts(&self) -> Result<Vec<AccountData>, Error> {
        Ok(Vec::new())
    }
}

pub fn build_controller(
    config: &Config,
    signer: Arc<dyn OfflineSigner>,
) -> eyre::Result<TxController> {
    TxController::from_config(config, signer)
        .map_err(|e| eyre!("failed to set up chain {}: {e}", config.chain.id))
}

/// Print every state the handle enters until it is terminal. Ctrl-C cancels
/// the submission and stops following it.
pub async fn follow(handle: &TxHandle, output: &Output) -> Lifecycle {
    let mut receiver = handle.subscribe();
    let mut printed = 0;

    loop {
        let lifecycle = receiver.borrow_and_update().clone();

        for state in lifecycle.history.iter().skip(printed) {
            output.state(handle, *state);
        }
        printed = lifecycle.history.len();

        if lifecycle.state.is_terminal() {
            return lifecycle;
        }

        tokio::select! {
            changed = receiver.changed() => {
                if changed.is_err() {
                    return lifecycle;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                handle.cancel();
                output.message("interrupted, stopped following the transaction");
                return handle.lifecycle();
            }
        }
    }
}

/// Wait for journal writes still running in the background.
pub async fn flush_journal(controller: &TxController) {
    if let Some(journal) = controller.journal() {
        if let Err(e) = journal.flush().await {
            warn!("failed to write transaction journal {}: {e}", journal.path().display());
        }
    }
}

/// Turn a failed lifecycle into the command's error.
pub fn conclude(handle: &TxHandle, lifecycle: &Lifecycle, output: &Output) -> eyre::Result<()> {
    output.outcome(handle, lifecycle);

    match (&lifecycle.state, &lifecycle.error) {
        (TxLifecycleState::Failed, Some(error)) => Err(eyre!("{error}")),
        (TxLifecycleState::Failed, None) => Err(eyre!("transaction failed")),
        _ => Ok(()),
    }
}
