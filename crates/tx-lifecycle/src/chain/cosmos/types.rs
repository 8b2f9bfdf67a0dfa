pub mod account;
pub mod tx;
