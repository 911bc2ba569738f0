//! Where raw transaction records come from.

use std::collections::VecDeque;
use std::fs::File;
use std::path::Path;

use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;

use crate::error::{Error, Result};

/// Yields pages of untyped transaction records, newest first. `Ok(None)`
/// marks the end of the history.
#[async_trait]
pub trait TransactionSource: Send {
    async fn next_page(&mut self) -> Result<Option<Vec<Value>>>;
}

const PAGE_SIZE: usize = 100;

/// Enhanced transaction history of one wallet, paged backwards with a
/// `before` signature cursor.
pub struct HeliusSource {
    client: reqwest::Client,
    base_url: String,
    wallet: String,
    api_key: String,
    before: Option<String>,
    done: bool,
}

impl HeliusSource {
    pub fn new(wallet: &str, api_key: &str) -> Result<HeliusSource> {
        HeliusSource::with_base_url("https://api.helius.xyz", wallet, api_key)
    }

    pub fn with_base_url(base_url: &str, wallet: &str, api_key: &str) -> Result<HeliusSource> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(HeliusSource {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            wallet: wallet.to_string(),
            api_key: api_key.to_string(),
            before: None,
            done: false,
        })
    }
}

#[async_trait]
impl TransactionSource for HeliusSource {
    async fn next_page(&mut self) -> Result<Option<Vec<Value>>> {
        if self.done {
            return Ok(None);
        }
        // any early return below ends the history
        self.done = true;

        let url = format!("{}/v0/addresses/{}/transactions", self.base_url, self.wallet);
        let mut request = self.client.get(&url).query(&[("api-key", self.api_key.as_str())]);
        if let Some(before) = &self.before {
            request = request.query(&[("before", before.as_str())]);
        }
        debug!("GET {} before={:?}", url, self.before);

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Error::Status {
                status: response.status().as_u16(),
                url,
            });
        }
        let page: Vec<Value> = response.json().await?;
        if page.is_empty() {
            return Ok(None);
        }

        if page.len() >= PAGE_SIZE {
            self.before = page
                .last()
                .and_then(|record| record.get("signature"))
                .and_then(Value::as_str)
                .map(String::from);
            self.done = self.before.is_none();
        }
        Ok(Some(page))
    }
}

/// Records held in memory, served in fixed-size pages.
pub struct MemorySource {
    pages: VecDeque<Vec<Value>>,
}

impl MemorySource {
    pub fn new(records: Vec<Value>) -> MemorySource {
        MemorySource::with_page_size(records, PAGE_SIZE)
    }

    pub fn with_page_size(records: Vec<Value>, page_size: usize) -> MemorySource {
        let page_size = page_size.max(1);
        let mut pages = VecDeque::new();
        let mut records = records.into_iter().peekable();
        while records.peek().is_some() {
            pages.push_back(records.by_ref().take(page_size).collect());
        }
        MemorySource { pages }
    }

    /// Reads a JSON array of records.
    pub fn from_json_file(path: &Path) -> Result<MemorySource> {
        let file = File::open(path)?;
        let records: Vec<Value> = serde_json::from_reader(file)?;
        info!("Read {} records from {}", records.len(), path.display());
        Ok(MemorySource::new(records))
    }
}

#[async_trait]
impl TransactionSource for MemorySource {
    async fn next_page(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.pages.pop_front())
    }
}
