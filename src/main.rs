mod app;
mod config;

use std::io::ErrorKind;
use std::path::Path;
use std::process;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use solana_tax::accounting::accountant::{Accountant, Analysis};
use solana_tax::accounting::{AccountingMethod, Progress};
use solana_tax::error::Error;
use solana_tax::prices::providers::{CoinGecko, DexScreener};
use solana_tax::prices::PriceInformation;
use solana_tax::source::{HeliusSource, MemorySource};
use solana_tax::swaps::Reconstructor;
use solana_tax::tax::TaxRegion;

use crate::app::App;
use crate::config::Config;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let app = App::new();
    if let Err(e) = run(&app).await {
        error!("{}", e);
        process::exit(1);
    }
}

async fn run(app: &App) -> Result<(), Error> {
    let config = match Config::new(app.get_config_path()) {
        Ok(config) => config,
        Err(Error::Io(e)) if e.kind() == ErrorKind::NotFound => {
            warn!("Config file \"{}\" not found, using defaults", app.get_config_path());
            Config::default()
        }
        Err(e) => return Err(e),
    };

    let wallet = app
        .get_wallet()
        .map(String::from)
        .or_else(|| config.wallet.clone())
        .ok_or_else(|| Error::Config("no wallet address given".to_string()))?;
    let method = app
        .get_method()
        .map(AccountingMethod::from_name_or_default)
        .unwrap_or_else(|| config.accounting_method());
    let region = app
        .get_region()
        .map(TaxRegion::from_id_or_default)
        .unwrap_or_else(|| config.tax_region());

    let mut price_information = PriceInformation::new(Box::new(DexScreener::new()?), Box::new(CoinGecko::new()?));
    price_information.default_base_price(config.default_base_price);
    let cache_path = Path::new(&config.cache_path);
    if app.get_clear_cache() {
        info!("Clearing price cache");
        price_information.clear();
    } else if let Err(e) = price_information.load(cache_path) {
        warn!("Ignoring unreadable price cache {}: {}", cache_path.display(), e);
    }

    let mut reconstructor = Reconstructor::new(&wallet);
    reconstructor
        .base_symbol(&config.base_asset)
        .source_marker(&config.protocol_source_marker)
        .protocol_programs(config.protocol_programs.iter().cloned());

    let (progress, mut updates) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            if let Progress::Disposal { event, .. } = update {
                debug!(
                    "{} sold {:.6} {} for {:.2}, gain {:.2} ({})",
                    event.date.format("%Y-%m-%d"),
                    event.amount,
                    event.token,
                    event.proceeds,
                    event.capital_gain,
                    event.term_type
                );
            }
        }
    });

    info!("Analyzing {} ({}, {})", wallet, method, region);
    let analysis = {
        let mut accountant = Accountant::new(&mut price_information, reconstructor);
        accountant
            .method(method)
            .region(region)
            .max_transactions(config.max_transactions)
            .progress(progress);

        match app.get_input_path() {
            Some(path) => accountant.analyze(MemorySource::from_json_file(Path::new(path))?).await,
            None => {
                let api_key = config
                    .api_key
                    .get("helius")
                    .ok_or_else(|| Error::Config("api_key.helius is required without --input".to_string()))?;
                accountant.analyze(HeliusSource::new(&wallet, api_key)?).await
            }
        }
    };

    if let Err(e) = price_information.save(cache_path) {
        warn!("Could not save price cache {}: {}", cache_path.display(), e);
    }

    let report = match analysis {
        Analysis::Complete(report) => report,
        Analysis::Empty => {
            info!("No swaps found for {}", wallet);
            return Ok(());
        }
    };

    println!("{}", report);
    if let Some(path) = app.get_output_path() {
        report.write_csv(Path::new(path))?;
        info!("Wrote {} taxable events to {}", report.events.len(), path);
    }
    if let Some(path) = app.get_json_path() {
        report.write_json(Path::new(path))?;
        info!("Wrote report to {}", path);
    }
    Ok(())
}
