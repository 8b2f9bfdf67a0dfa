//! Clients for the chain node and the Cosmos SDK transaction codec.

pub mod client;
pub mod cosmos;

pub use client::{BroadcastResponse, ChainClient, TxResult};
