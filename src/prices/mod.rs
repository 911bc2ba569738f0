//! Token metadata and historical base prices, resolved once per key and
//! cached for the run (and optionally across runs).

pub mod providers;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::join_all;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::chain;
use crate::error::Result;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub mint: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub logo_uri: Option<String>,
    #[serde(skip)]
    pub fallback: bool,
}

impl TokenMetadata {
    pub fn new(mint: &str, symbol: &str, name: &str) -> TokenMetadata {
        TokenMetadata {
            mint: mint.to_string(),
            symbol: symbol.to_string(),
            name: name.to_string(),
            logo_uri: None,
            fallback: false,
        }
    }

    /// Placeholder derived from the mint address itself.
    pub fn fallback(mint: &str) -> TokenMetadata {
        let short: String = mint.chars().take(8).collect();
        TokenMetadata {
            name: format!("Unknown ({}...)", short),
            symbol: short,
            mint: mint.to_string(),
            logo_uri: None,
            fallback: true,
        }
    }
}

#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn token_metadata(&self, mint: &str) -> Result<TokenMetadata>;
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Base currency price on the given UTC day.
    async fn base_price(&self, date: NaiveDate) -> Result<f64>;
}

#[derive(Default, Serialize, Deserialize)]
struct PriceCache {
    #[serde(default)]
    metadata: HashMap<String, TokenMetadata>,
    #[serde(default)]
    base_prices: BTreeMap<NaiveDate, f64>,
}

pub struct PriceInformation {
    cache: PriceCache,
    fallback_dates: HashSet<NaiveDate>,
    metadata_source: Box<dyn MetadataSource>,
    price_source: Box<dyn PriceSource>,
    default_base_price: f64,
}

impl PriceInformation {
    pub fn new(metadata_source: Box<dyn MetadataSource>, price_source: Box<dyn PriceSource>) -> PriceInformation {
        let mut res = PriceInformation {
            cache: PriceCache::default(),
            fallback_dates: HashSet::new(),
            metadata_source,
            price_source,
            default_base_price: chain::DEFAULT_BASE_PRICE,
        };
        res.insert_base_metadata();
        res
    }

    /// Resolver that never goes to the network; every lookup falls back.
    pub fn offline() -> PriceInformation {
        PriceInformation::new(Box::new(providers::Offline), Box::new(providers::Offline))
    }

    pub fn default_base_price(&mut self, price: f64) -> &mut Self {
        self.default_base_price = price;
        self
    }

    pub fn insert_metadata(&mut self, metadata: TokenMetadata) {
        self.cache.metadata.insert(metadata.mint.clone(), metadata);
    }

    pub fn insert_base_price(&mut self, date: NaiveDate, price: f64) {
        self.fallback_dates.remove(&date);
        self.cache.base_prices.insert(date, price);
    }

    pub fn lookup(&self, mint: &str) -> Option<&TokenMetadata> {
        self.cache.metadata.get(mint)
    }

    pub fn clear(&mut self) {
        self.cache = PriceCache::default();
        self.fallback_dates.clear();
        self.insert_base_metadata();
    }

    fn insert_base_metadata(&mut self) {
        self.insert_metadata(TokenMetadata::new(chain::SOL_MINT, chain::BASE_SYMBOL, chain::BASE_NAME));
    }

    /// Fetches metadata for every uncached mint concurrently. Returns the
    /// number of mints that were looked up.
    pub async fn resolve_metadata<I>(&mut self, mints: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut pending: Vec<String> = mints
            .into_iter()
            .filter(|mint| !chain::is_base_mint(mint) && !self.cache.metadata.contains_key(mint))
            .collect();
        pending.sort();
        pending.dedup();
        if pending.is_empty() {
            return 0;
        }

        info!("Resolving metadata for {} tokens", pending.len());
        let source = &self.metadata_source;
        let results = join_all(pending.iter().map(|mint| source.token_metadata(mint))).await;

        for (mint, result) in pending.iter().zip(results) {
            let metadata = match result {
                Ok(mut metadata) => {
                    metadata.mint = mint.clone();
                    metadata.fallback = false;
                    metadata
                }
                Err(e) => {
                    debug!("No metadata for {}: {}", mint, e);
                    TokenMetadata::fallback(mint)
                }
            };
            self.cache.metadata.insert(mint.clone(), metadata);
        }
        pending.len()
    }

    /// Fetches the base price of every uncached day concurrently. Returns
    /// the number of days that were looked up.
    pub async fn resolve_base_prices<I>(&mut self, dates: I) -> usize
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let mut pending: Vec<NaiveDate> = dates
            .into_iter()
            .filter(|date| !self.cache.base_prices.contains_key(date))
            .collect();
        pending.sort();
        pending.dedup();
        if pending.is_empty() {
            return 0;
        }

        info!("Resolving base prices for {} days", pending.len());
        let source = &self.price_source;
        let results = join_all(pending.iter().map(|date| source.base_price(*date))).await;

        for (date, result) in pending.iter().zip(results) {
            match result {
                Ok(price) if price.is_finite() && price > 0.0 => {
                    self.cache.base_prices.insert(*date, price);
                }
                Ok(price) => {
                    warn!("Discarding base price {} for {}, using {}", price, date, self.default_base_price);
                    self.insert_fallback_price(*date);
                }
                Err(e) => {
                    warn!("No base price for {}: {}, using {}", date, e, self.default_base_price);
                    self.insert_fallback_price(*date);
                }
            }
        }
        pending.len()
    }

    fn insert_fallback_price(&mut self, date: NaiveDate) {
        self.cache.base_prices.insert(date, self.default_base_price);
        self.fallback_dates.insert(date);
    }

    /// Cached metadata for `mint`; a miss caches and returns the fallback.
    pub fn metadata(&mut self, mint: &str) -> &TokenMetadata {
        if !self.cache.metadata.contains_key(mint) {
            debug!("Metadata cache miss for {}", mint);
        }
        self.cache
            .metadata
            .entry(mint.to_string())
            .or_insert_with(|| TokenMetadata::fallback(mint))
    }

    /// Cached base price for `date`; a miss caches and returns the default.
    pub fn base_price(&mut self, date: NaiveDate) -> f64 {
        if let Some(price) = self.cache.base_prices.get(&date) {
            return *price;
        }
        debug!("Base price cache miss for {}", date);
        self.insert_fallback_price(date);
        self.default_base_price
    }

    /// Replaces the cache with the contents of `path`. A missing file leaves
    /// an empty cache.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        self.clear();
        if !path.exists() {
            debug!("No price cache at {}", path.display());
            return Ok(());
        }

        let file = File::open(path)?;
        let cache: PriceCache = serde_yaml::from_reader(file)?;
        info!(
            "Loaded {} tokens and {} base prices from {}",
            cache.metadata.len(),
            cache.base_prices.len(),
            path.display()
        );
        self.cache = cache;
        self.insert_base_metadata();
        Ok(())
    }

    /// Writes every resolved entry to `path`; fallback values are left out
    /// so the next run retries them.
    pub fn save(&self, path: &Path) -> Result<()> {
        let persisted = PriceCache {
            metadata: self
                .cache
                .metadata
                .iter()
                .filter(|(mint, metadata)| !metadata.fallback && !chain::is_base_mint(mint))
                .map(|(mint, metadata)| (mint.clone(), metadata.clone()))
                .collect(),
            base_prices: self
                .cache
                .base_prices
                .iter()
                .filter(|(date, _)| !self.fallback_dates.contains(*date))
                .map(|(date, price)| (*date, *price))
                .collect(),
        };
        serde_yaml::to_writer(File::create(path)?, &persisted)?;
        Ok(())
    }
}
