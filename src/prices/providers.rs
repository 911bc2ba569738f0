use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::prices::{MetadataSource, PriceSource, TokenMetadata};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

async fn get_json<T: serde::de::DeserializeOwned>(request: reqwest::RequestBuilder, url: &str) -> Result<T> {
    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(Error::Status {
            status: response.status().as_u16(),
            url: url.to_string(),
        });
    }
    Ok(response.json().await?)
}

/// Token symbol and name from the DEX pairs a mint trades in.
pub struct DexScreener {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct PairsResponse {
    pairs: Option<Vec<Pair>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pair {
    base_token: Option<PairToken>,
    info: Option<PairInfo>,
}

#[derive(Deserialize)]
struct PairToken {
    address: Option<String>,
    symbol: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PairInfo {
    image_url: Option<String>,
}

impl DexScreener {
    pub fn new() -> Result<DexScreener> {
        DexScreener::with_base_url("https://api.dexscreener.com")
    }

    pub fn with_base_url(base_url: &str) -> Result<DexScreener> {
        Ok(DexScreener {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

fn usable(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty() && v != "N/A")
}

#[async_trait]
impl MetadataSource for DexScreener {
    async fn token_metadata(&self, mint: &str) -> Result<TokenMetadata> {
        let url = format!("{}/latest/dex/tokens/{}", self.base_url, mint);
        debug!("GET {}", url);
        let body: PairsResponse = get_json(self.client.get(&url), &url).await?;

        let mut pairs = body.pairs.unwrap_or_default();
        if pairs.is_empty() {
            return Err(Error::NotFound(mint.to_string()));
        }
        // prefer a pair where the mint is the base side
        let position = pairs
            .iter()
            .position(|pair| {
                pair.base_token
                    .as_ref()
                    .and_then(|token| token.address.as_deref())
                    == Some(mint)
            })
            .unwrap_or(0);
        let pair = pairs.swap_remove(position);

        let token = pair.base_token.ok_or_else(|| Error::NotFound(mint.to_string()))?;
        let symbol = usable(token.symbol).ok_or_else(|| Error::NotFound(mint.to_string()))?;
        let name = usable(token.name).unwrap_or_else(|| symbol.clone());

        let mut metadata = TokenMetadata::new(mint, &symbol, &name);
        metadata.logo_uri = pair.info.and_then(|info| info.image_url);
        Ok(metadata)
    }
}

/// Daily historical price of the base currency.
pub struct CoinGecko {
    client: reqwest::Client,
    base_url: String,
    coin_id: String,
    vs_currency: String,
}

#[derive(Deserialize)]
struct HistoryResponse {
    market_data: Option<MarketData>,
}

#[derive(Deserialize)]
struct MarketData {
    current_price: HashMap<String, f64>,
}

impl CoinGecko {
    pub fn new() -> Result<CoinGecko> {
        CoinGecko::with_base_url("https://api.coingecko.com/api/v3")
    }

    pub fn with_base_url(base_url: &str) -> Result<CoinGecko> {
        Ok(CoinGecko {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            coin_id: "solana".to_string(),
            vs_currency: "usd".to_string(),
        })
    }
}

#[async_trait]
impl PriceSource for CoinGecko {
    async fn base_price(&self, date: NaiveDate) -> Result<f64> {
        let url = format!("{}/coins/{}/history", self.base_url, self.coin_id);
        let day = date.format("%d-%m-%Y").to_string();
        debug!("GET {} date={}", url, day);
        let request = self
            .client
            .get(&url)
            .query(&[("date", day.as_str()), ("localization", "false")]);
        let body: HistoryResponse = get_json(request, &url).await?;

        body.market_data
            .and_then(|data| data.current_price.get(&self.vs_currency).copied())
            .ok_or_else(|| Error::NotFound(format!("{} price on {}", self.coin_id, day)))
    }
}

/// Answers every lookup with `NotFound`, so the resolver falls back.
pub struct Offline;

#[async_trait]
impl MetadataSource for Offline {
    async fn token_metadata(&self, mint: &str) -> Result<TokenMetadata> {
        Err(Error::NotFound(mint.to_string()))
    }
}

#[async_trait]
impl PriceSource for Offline {
    async fn base_price(&self, date: NaiveDate) -> Result<f64> {
        Err(Error::NotFound(date.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_http;

    #[test]
    fn pair_payload_is_tolerant() {
        let body: PairsResponse = serde_json::from_str(
            r#"{"pairs":[{"baseToken":{"address":"Mint","symbol":"BONK","name":"Bonk"},"info":{"imageUrl":"https://x/y.png"}},{"chainId":"solana"}]}"#,
        )
        .unwrap();
        let pairs = body.pairs.unwrap();
        assert_eq!(pairs.len(), 2);
        assert!(pairs[1].base_token.is_none());
        assert_eq!(pairs[0].info.as_ref().unwrap().image_url.as_deref(), Some("https://x/y.png"));

        let empty: PairsResponse = serde_json::from_str(r#"{"schemaVersion":"1.0.0","pairs":null}"#).unwrap();
        assert!(empty.pairs.is_none());
    }

    #[test]
    fn placeholder_symbols_are_rejected() {
        assert_eq!(usable(Some("N/A".to_string())), None);
        assert_eq!(usable(Some("  ".to_string())), None);
        assert_eq!(usable(Some("WIF".to_string())), Some("WIF".to_string()));
    }

    #[tokio::test]
    async fn dexscreener_prefers_base_side_pair() {
        let body = r#"{"pairs":[
            {"baseToken":{"address":"Other","symbol":"SOL","name":"Wrapped SOL"},"quoteToken":{"address":"Mint"}},
            {"baseToken":{"address":"Mint","symbol":"BONK","name":"Bonk"},"info":{"imageUrl":"https://x/bonk.png"}}
        ]}"#;
        let (base_url, server) = mock_http::serve(vec![(200, body.to_string())]).await;
        let metadata = DexScreener::with_base_url(&base_url)
            .unwrap()
            .token_metadata("Mint")
            .await
            .unwrap();

        assert_eq!(metadata.symbol, "BONK");
        assert_eq!(metadata.name, "Bonk");
        assert_eq!(metadata.logo_uri.as_deref(), Some("https://x/bonk.png"));
        assert!(server.await.unwrap()[0].starts_with("GET /latest/dex/tokens/Mint "));
    }

    #[tokio::test]
    async fn dexscreener_without_pairs_is_not_found() {
        let (base_url, _server) = mock_http::serve(vec![(200, r#"{"pairs":null}"#.to_string())]).await;
        let result = DexScreener::with_base_url(&base_url).unwrap().token_metadata("Mint").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn coingecko_asks_for_the_day() {
        let body = r#"{"market_data":{"current_price":{"usd":101.5}}}"#;
        let (base_url, server) = mock_http::serve(vec![(200, body.to_string())]).await;
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let price = CoinGecko::with_base_url(&base_url).unwrap().base_price(date).await.unwrap();

        assert_eq!(price, 101.5);
        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /coins/solana/history?date=02-01-2024&localization=false "));
    }

    #[test]
    fn history_payload() {
        let body: HistoryResponse =
            serde_json::from_str(r#"{"id":"solana","market_data":{"current_price":{"usd":101.5,"eur":93.1}}}"#).unwrap();
        assert_eq!(body.market_data.unwrap().current_price["usd"], 101.5);
    }
}
