//! Cosmos SDK specific encoding, signing, estimation and RPC plumbing.

pub mod amino;
pub mod client;
pub mod encode;
pub mod estimate;
pub mod gas;
pub mod query;
pub mod sign;
pub mod simulate;
pub mod types;

pub use client::CosmosClient;
