#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![allow(clippy::too_many_arguments)]

//! Client-side transaction lifecycle for Cosmos SDK chains.
//!
//! The crate takes a set of protobuf messages from the caller and drives them
//! through the whole submission pipeline:
//!
//! - encoding of the transaction body, auth info and sign documents
//!   ([`chain::cosmos::encode`]),
//! - signing through an external [`signer::OfflineSigner`], either with
//!   `SIGN_MODE_DIRECT` or with legacy amino JSON ([`chain::cosmos::sign`]),
//! - gas estimation through chain simulation and fee calculation
//!   ([`chain::cosmos::estimate`], [`chain::cosmos::gas`]),
//! - fire-and-forget broadcast and confirmation tracking against both the
//!   chain node and a downstream indexer ([`lifecycle`]).

pub mod chain;
pub mod config;
pub mod error;
pub mod indexer;
pub mod journal;
pub mod lifecycle;
pub mod sdk_error;
pub mod signer;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use crate::lifecycle::{
    SubmissionError, SubmissionErrorKind, TxController, TxHandle, TxLifecycleState,
};
