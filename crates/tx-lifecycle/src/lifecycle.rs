//! Broadcast and confirmation state machine.
//!
//! A [`TxController`] creates one [`TxHandle`] per submission. The handle
//! moves forward through [`TxLifecycleState`]: its fee is estimated on
//! creation, the caller signs and broadcasts, and a background task then
//! polls the chain node for inclusion and the indexer for processing status.

mod accounts;
mod controller;
mod error;
mod handle;
mod poll;
mod state;

pub use controller::{TxController, TxControllerBuilder};
pub use error::{SubmissionError, SubmissionErrorKind};
pub use handle::{Lifecycle, TxHandle};
pub use state::TxLifecycleState;

#[cfg(test)]
mod tests;
