use std::sync::Arc;

use clap::Parser;
use cosmos_tx_lifecycle::config::Config;
use cosmos_tx_lifecycle::TxLifecycleState;
use eyre::eyre;
use tracing::warn;

use crate::commands::{build_controller, flush_journal, follow, WatchOnly};
use crate::output::Output;

#[derive(Debug, Parser)]
pub struct ResumeCmd {}

impl ResumeCmd {
    pub async fn run(&self, config: &Config, output: &Output) -> eyre::Result<()> {
        if config.journal.is_none() {
            return Err(eyre!(
                "no [journal] section in the configuration, nothing to resume"
            ));
        }

        let controller = build_controller(config, Arc::new(WatchOnly))?;

        let handles = controller.resume_pending();

        if handles.is_empty() {
            output.message("no pending transactions");
            return Ok(());
        }

        output.message(&format!("resuming {} pending transaction(s)", handles.len()));

        let tasks: Vec<_> = handles
            .into_iter()
            .map(|handle| {
                let output = *output;

                tokio::spawn(async move {
                    let lifecycle = follow(&handle, &output).await;
                    output.outcome(&handle, &lifecycle);
                    lifecycle.state
                })
            })
            .collect();

        let mut failed = 0;

        for task in tasks {
            match task.await {
                Ok(TxLifecycleState::Failed) => failed += 1,
                Ok(_) => {}
                Err(e) => {
                    warn!("follow task ended abnormally: {e}");
                    failed += 1;
                }
            }
        }

        flush_journal(&controller).await;

        if failed > 0 {
            return Err(eyre!("{failed} transaction(s) failed"));
        }

        Ok(())
    }
}
