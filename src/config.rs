use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use solana_tax::accounting::AccountingMethod;
use solana_tax::chain;
use solana_tax::error::Error;
use solana_tax::tax::TaxRegion;

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub(crate) wallet: Option<String>,
    pub(crate) base_asset: String,
    pub(crate) method: String,
    pub(crate) tax_region: String,
    pub(crate) max_transactions: usize,
    pub(crate) default_base_price: f64,
    pub(crate) protocol_source_marker: String,
    pub(crate) protocol_programs: Vec<String>,
    pub(crate) api_key: HashMap<String, String>,
    pub(crate) cache_path: String,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            wallet: None,
            base_asset: chain::BASE_SYMBOL.to_string(),
            method: AccountingMethod::FIFO.to_string(),
            tax_region: TaxRegion::UsFederal.to_string(),
            max_transactions: 1000,
            default_base_price: chain::DEFAULT_BASE_PRICE,
            protocol_source_marker: chain::PUMP_SOURCE_MARKER.to_string(),
            protocol_programs: chain::PUMP_FUN_PROGRAMS.iter().map(|p| p.to_string()).collect(),
            api_key: HashMap::new(),
            cache_path: ".price_cache".to_string(),
        }
    }
}

impl Config {
    pub fn new(config_path: &str) -> Result<Config, Error> {
        let file = std::fs::File::open(config_path)?;
        let config: Config = ::serde_yaml::from_reader(file)?;
        Ok(config)
    }

    pub fn accounting_method(&self) -> AccountingMethod {
        AccountingMethod::from_name_or_default(&self.method)
    }

    pub fn tax_region(&self) -> TaxRegion {
        TaxRegion::from_id_or_default(&self.tax_region)
    }
}
