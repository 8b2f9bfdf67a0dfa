//! Transaction lifecycle configuration

pub mod error;
pub mod multiplier;
pub mod types;

use core::{
    cmp::Ordering,
    fmt::{Display, Error as FmtError, Formatter},
    str::FromStr,
    time::Duration,
};
use std::{
    fs,
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use serde_derive::{Deserialize, Serialize};
use tendermint::chain::Id as ChainId;
use tendermint_rpc::Url;

use crate::config::multiplier::Multiplier;
use crate::config::types::{MaxPollFailures, Memo};

pub use error::Error;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GasPrice {
    pub price: f64,
    pub denom: String,
}

impl GasPrice {
    pub const fn new(price: f64, denom: String) -> Self {
        Self { price, denom }
    }
}

impl Display for GasPrice {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        write!(f, "{}{}", self.price, self.denom)
    }
}

impl FromStr for GasPrice {
    type Err = Error;

    fn from_str(price_in: &str) -> Result<Self, Self::Err> {
        // Denominations start with a letter, so the first alphabetic
        // character ends the numeric part.
        let spos = price_in.find(char::is_alphabetic);

        match spos {
            Some(position) => {
                let (price_str, denom) = price_in.split_at(position);

                let price = price_str
                    .parse::<f64>()
                    .map_err(|_| Error::invalid_gas_price(price_in.to_string()))?;

                if !price.is_finite() || price < 0.0 {
                    return Err(Error::invalid_gas_price(price_in.to_string()));
                }

                Ok(GasPrice {
                    price,
                    denom: denom.to_owned(),
                })
            }

            None => Err(Error::invalid_gas_price(price_in.to_string())),
        }
    }
}

// Note: Only `PartialOrd` is implemented for `GasPrice` because gas
// prices must be of the same denomination in order to be compared.
impl PartialOrd for GasPrice {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.denom == other.denom {
            self.price.partial_cmp(&other.price)
        } else {
            None
        }
    }
}

/// Where the gas estimator sends its simulation requests.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationBackend {
    /// `cosmos.tx.v1beta1.Service/Simulate` over gRPC.
    #[default]
    Grpc,
    /// `POST /cosmos/tx/v1beta1/simulate` on the REST gateway.
    Rest,
}

impl Display for SimulationBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Self::Grpc => write!(f, "grpc"),
            Self::Rest => write!(f, "rest"),
        }
    }
}

/// Defaults for various fields
pub mod default {
    use super::*;

    pub fn gas_multiplier() -> Multiplier {
        Multiplier::unsafe_new(1.4)
    }

    pub fn fee_multiplier() -> Multiplier {
        Multiplier::unsafe_new(1.0)
    }

    pub fn rpc_timeout() -> Duration {
        Duration::from_secs(10)
    }

    pub fn poll_interval() -> Duration {
        Duration::from_secs(1)
    }

    pub fn max_poll_failures() -> MaxPollFailures {
        MaxPollFailures::default()
    }

    pub fn indexer_query() -> String {
        "query TransactionStatus($hash: String!) { transaction(hash: $hash) { status } }"
            .to_string()
    }

    pub fn status_path() -> String {
        "data.transaction.status".to_string()
    }

    pub fn journal_path() -> PathBuf {
        PathBuf::from("tx-journal.json")
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub chain: ChainConfig,
    pub indexer: IndexerConfig,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<JournalConfig>,
}

impl Config {
    /// The subset of the configuration driving estimation, fees and
    /// confirmation tracking.
    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            gas_price: self.chain.gas_price.clone(),
            gas_multiplier: self.chain.gas_multiplier,
            fee_multiplier: self.chain.fee_multiplier,
            max_gas: self.chain.max_gas,
            default_memo: self.chain.memo.clone(),
            poll_interval: self.confirmation.poll_interval,
            max_poll_failures: self.confirmation.max_poll_failures,
            poll_timeout: self.confirmation.poll_timeout,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChainConfig {
    pub id: ChainId,
    pub rpc_addr: Url,
    pub grpc_addr: Url,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_addr: Option<Url>,
    pub account_prefix: String,
    pub gas_price: GasPrice,
    #[serde(default = "default::gas_multiplier")]
    pub gas_multiplier: Multiplier,
    #[serde(default = "default::fee_multiplier")]
    pub fee_multiplier: Multiplier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_gas: Option<u64>,
    #[serde(default = "default::rpc_timeout", with = "humantime_serde")]
    pub rpc_timeout: Duration,
    #[serde(default)]
    pub simulation: SimulationBackend,
    /// Memo used when a submission does not provide one.
    #[serde(default)]
    pub memo: Memo,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IndexerConfig {
    pub url: Url,
    /// GraphQL document sent to the indexer. It receives the upper-case hex
    /// transaction hash as the `$hash` variable.
    #[serde(default = "default::indexer_query")]
    pub query: String,
    /// Dot-separated path to the status string in the JSON response.
    #[serde(default = "default::status_path")]
    pub status_path: String,
}

#[derive(Copy, Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfirmationConfig {
    #[serde(default = "default::poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(default = "default::max_poll_failures")]
    pub max_poll_failures: MaxPollFailures,
    #[serde(
        default,
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub poll_timeout: Option<Duration>,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval: default::poll_interval(),
            max_poll_failures: default::max_poll_failures(),
            poll_timeout: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct JournalConfig {
    #[serde(default = "default::journal_path")]
    pub path: PathBuf,
}

/// Parameters of a [`TxController`](crate::lifecycle::TxController).
#[derive(Clone, Debug)]
pub struct LifecycleConfig {
    pub gas_price: GasPrice,
    pub gas_multiplier: Multiplier,
    pub fee_multiplier: Multiplier,
    pub max_gas: Option<u64>,
    pub default_memo: Memo,
    pub poll_interval: Duration,
    pub max_poll_failures: MaxPollFailures,
    pub poll_timeout: Option<Duration>,
}

impl LifecycleConfig {
    pub fn new(gas_price: GasPrice) -> Self {
        Self {
            gas_price,
            gas_multiplier: default::gas_multiplier(),
            fee_multiplier: default::fee_multiplier(),
            max_gas: None,
            default_memo: Memo::default(),
            poll_interval: default::poll_interval(),
            max_poll_failures: default::max_poll_failures(),
            poll_timeout: None,
        }
    }
}

/// Attempt to load and parse the TOML config file as a `Config`.
pub fn load(path: impl AsRef<Path>) -> Result<Config, Error> {
    let config_toml = std::fs::read_to_string(&path).map_err(Error::io)?;

    let config = toml::from_str::<Config>(&config_toml[..]).map_err(Error::decode)?;

    Ok(config)
}

/// Serialize the given `Config` as TOML to the given config file.
pub fn store(config: &Config, path: impl AsRef<Path>) -> Result<(), Error> {
    let mut file = if path.as_ref().exists() {
        fs::OpenOptions::new().write(true).truncate(true).open(path)
    } else {
        File::create(path)
    }
    .map_err(Error::io)?;

    store_writer(config, &mut file)
}

/// Serialize the given `Config` as TOML to the given writer.
pub(crate) fn store_writer(config: &Config, mut writer: impl Write) -> Result<(), Error> {
    let toml_config = toml::to_string_pretty(&config).map_err(Error::encode)?;

    writeln!(writer, "{toml_config}").map_err(Error::io)?;

    Ok(())
}
