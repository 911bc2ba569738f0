use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use csv::Writer;
use serde::Serialize;

use crate::accounting::{AccountingMethod, CapitalGainsCalculation, Holding, TaxableEvent};
use crate::error::Result;
use crate::swaps::BaseTransfer;
use crate::tax::{TaxRegion, TaxRegionConfig, Term};

/// Per-token P&L within this band counts as breakeven.
const BREAKEVEN_BAND: f64 = 0.01;

const TEXT_REPORT_TOKENS: usize = 20;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total_proceeds: f64,
    pub total_cost: f64,
    pub net_gain: f64,
    pub short_term_gains: f64,
    pub long_term_gains: f64,
    pub total_tax: f64,
    pub taxable_sales: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TokenReport {
    pub symbol: String,
    pub name: String,
    pub mint: String,
    pub logo_uri: Option<String>,
    pub gain: f64,
    pub invested: f64,
    pub sold_for: f64,
    pub roi_percent: f64,
    pub total_trades: u32,
    pub short_term_gains: f64,
    pub long_term_gains: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CurrencyFlows {
    pub deposits: f64,
    pub deposit_count: usize,
    pub withdrawals: f64,
    pub withdrawal_count: usize,
    pub spent_trading: f64,
    pub received_trading: f64,
    pub net_trading: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TradingStats {
    pub total_trades: usize,
    pub tokens_traded: usize,
    pub winning_tokens: usize,
    pub losing_tokens: usize,
    pub breakeven_tokens: usize,
    /// Winners over decided tokens; breakeven tokens are left out.
    pub win_rate_percent: f64,
    pub avg_gain: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_hold_days: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct HoldTimes {
    pub avg_hold_days: f64,
    pub median_hold_days: f64,
    /// Under one day.
    pub quick_trades: usize,
    /// One to seven days.
    pub swing_trades: usize,
    /// Seven to thirty days.
    pub position_trades: usize,
    pub long_holds: usize,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub wallet: String,
    pub accounting_method: AccountingMethod,
    pub tax_region: TaxRegion,
    pub tax_config: &'static TaxRegionConfig,
    pub generated: DateTime<Utc>,
    pub summary: Summary,
    pub tokens: Vec<TokenReport>,
    pub events: Vec<TaxableEvent>,
    pub holdings: Vec<Holding>,
    pub currency_flows: CurrencyFlows,
    pub trading: TradingStats,
    pub hold_times: HoldTimes,
}

impl Report {
    pub fn new(
        wallet: &str,
        accounting_method: AccountingMethod,
        tax_region: TaxRegion,
        calculation: &CapitalGainsCalculation,
        deposits: &[BaseTransfer],
        withdrawals: &[BaseTransfer],
    ) -> Report {
        let tax_config = tax_region.config();
        let mut events = calculation.events().to_vec();
        events.sort_by(|a, b| a.date.cmp(&b.date));

        let currency_flows = CurrencyFlows {
            deposits: deposits.iter().map(|d| d.amount).sum(),
            deposit_count: deposits.len(),
            withdrawals: withdrawals.iter().map(|w| w.amount).sum(),
            withdrawal_count: withdrawals.len(),
            spent_trading: calculation.base_spent(),
            received_trading: calculation.base_received(),
            net_trading: calculation.base_received() - calculation.base_spent(),
        };

        Report {
            wallet: wallet.to_string(),
            accounting_method,
            tax_region,
            tax_config,
            generated: Utc::now(),
            summary: summarize(&events),
            tokens: rank_tokens(&events, calculation),
            trading: trading_stats(&events),
            hold_times: hold_times(&events),
            holdings: calculation.holdings(),
            currency_flows,
            events,
        }
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = Writer::from_path(path)?;
        for event in self.events.iter() {
            writer.serialize(event)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        serde_json::to_writer_pretty(File::create(path)?, self)?;
        Ok(())
    }
}

/// Gain totals follow each event's term label, so non-taxable disposals land
/// in neither bucket.
fn summarize(events: &[TaxableEvent]) -> Summary {
    let mut summary = Summary {
        taxable_sales: events.len(),
        ..Summary::default()
    };
    for event in events {
        summary.total_proceeds += event.proceeds;
        summary.total_cost += event.cost_basis;
        summary.net_gain += event.capital_gain;
        summary.total_tax += event.tax_liability;
        match event.term_type {
            Term::ShortTerm => summary.short_term_gains += event.capital_gain,
            Term::LongTerm => summary.long_term_gains += event.capital_gain,
            Term::NotApplicable => {}
        }
    }
    summary
}

fn rank_tokens(events: &[TaxableEvent], calculation: &CapitalGainsCalculation) -> Vec<TokenReport> {
    let mut gains: Vec<(&TaxableEvent, f64)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for event in events {
        match index.get(event.token_mint.as_str()) {
            Some(&i) => gains[i].1 += event.capital_gain,
            None => {
                index.insert(event.token_mint.as_str(), gains.len());
                gains.push((event, event.capital_gain));
            }
        }
    }

    let mut tokens: Vec<TokenReport> = gains
        .into_iter()
        .map(|(event, gain)| {
            let stats = calculation.stats().get(&event.token).cloned().unwrap_or_default();
            TokenReport {
                symbol: event.token.clone(),
                name: event.token_name.clone(),
                mint: event.token_mint.clone(),
                logo_uri: calculation
                    .token_metadata(&event.token_mint)
                    .and_then(|metadata| metadata.logo_uri.clone()),
                gain,
                invested: stats.total_cost,
                sold_for: stats.total_proceeds,
                roi_percent: if stats.total_cost > 0.0 {
                    gain / stats.total_cost * 100.0
                } else {
                    0.0
                },
                total_trades: stats.total_trades,
                short_term_gains: stats.short_term_gains,
                long_term_gains: stats.long_term_gains,
            }
        })
        .collect();

    tokens.sort_by(|a, b| b.gain.abs().total_cmp(&a.gain.abs()).then_with(|| a.symbol.cmp(&b.symbol)));
    tokens
}

fn trading_stats(events: &[TaxableEvent]) -> TradingStats {
    if events.is_empty() {
        return TradingStats::default();
    }

    let mut pnl_by_token: HashMap<&str, f64> = HashMap::new();
    for event in events {
        *pnl_by_token.entry(event.token.as_str()).or_default() += event.capital_gain;
    }

    let wins: Vec<f64> = pnl_by_token.values().copied().filter(|p| *p > BREAKEVEN_BAND).collect();
    let losses: Vec<f64> = pnl_by_token.values().copied().filter(|p| *p < -BREAKEVEN_BAND).collect();
    let decided = wins.len() + losses.len();
    let mean = |values: &[f64]| {
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    };

    TradingStats {
        total_trades: events.len(),
        tokens_traded: pnl_by_token.len(),
        winning_tokens: wins.len(),
        losing_tokens: losses.len(),
        breakeven_tokens: pnl_by_token.len() - decided,
        win_rate_percent: if decided > 0 {
            wins.len() as f64 / decided as f64 * 100.0
        } else {
            0.0
        },
        avg_gain: mean(&wins),
        avg_loss: mean(&losses),
        largest_win: wins.iter().copied().fold(0.0, f64::max),
        largest_loss: losses.iter().copied().fold(0.0, f64::min),
        avg_hold_days: events.iter().map(|e| e.holding_days as f64).sum::<f64>() / events.len() as f64,
    }
}

fn hold_times(events: &[TaxableEvent]) -> HoldTimes {
    if events.is_empty() {
        return HoldTimes::default();
    }

    let mut days: Vec<i64> = events.iter().map(|e| e.holding_days).collect();
    days.sort_unstable();
    let mid = days.len() / 2;
    let median = if days.len() % 2 == 0 {
        (days[mid - 1] + days[mid]) as f64 / 2.0
    } else {
        days[mid] as f64
    };

    HoldTimes {
        avg_hold_days: days.iter().sum::<i64>() as f64 / days.len() as f64,
        median_hold_days: median,
        quick_trades: days.iter().filter(|d| **d < 1).count(),
        swing_trades: days.iter().filter(|d| (1..7).contains(*d)).count(),
        position_trades: days.iter().filter(|d| (7..30).contains(*d)).count(),
        long_holds: days.iter().filter(|d| **d >= 30).count(),
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rule = "=".repeat(90);
        let thin = "-".repeat(90);
        let config = self.tax_config;

        writeln!(f, "{}", rule)?;
        writeln!(f, "SOLANA WALLET TAX REPORT")?;
        writeln!(f, "Region: {}", config.name)?;
        writeln!(f, "Wallet: {}", self.wallet)?;
        writeln!(f, "Accounting Method: {}", self.accounting_method)?;
        writeln!(f, "Generated: {}", self.generated.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f, "{}", rule)?;
        writeln!(f)?;

        writeln!(f, "TAX CONFIGURATION")?;
        writeln!(f, "{}", thin)?;
        writeln!(f, "Description: {}", config.description)?;
        writeln!(f, "Short-term rate: {:.1}%", config.short_term_rate * 100.0)?;
        writeln!(f, "Long-term rate: {:.1}%", config.long_term_rate * 100.0)?;
        if let Some(exemption) = config.annual_exemption {
            writeln!(f, "Annual exemption: {} {:.0}", config.currency, exemption)?;
        }
        writeln!(f)?;

        let summary = &self.summary;
        writeln!(f, "TAX SUMMARY")?;
        writeln!(f, "{}", thin)?;
        writeln!(f, "Total Taxable Sales: {}", summary.taxable_sales)?;
        writeln!(f, "Total Proceeds: ${:.2}", summary.total_proceeds)?;
        writeln!(f, "Total Cost Basis: ${:.2}", summary.total_cost)?;
        writeln!(f, "NET CAPITAL GAIN/LOSS: ${:.2}", summary.net_gain)?;
        writeln!(f, "Estimated Tax: ${:.2}", summary.total_tax)?;
        writeln!(f)?;
        writeln!(f, "Short-term gains: ${:.2}", summary.short_term_gains)?;
        writeln!(f, "Long-term gains: ${:.2}", summary.long_term_gains)?;
        writeln!(f)?;

        let flows = &self.currency_flows;
        writeln!(f, "SOL FLOWS")?;
        writeln!(f, "{}", thin)?;
        writeln!(f, "Deposits: {} transactions, {:.4} SOL", flows.deposit_count, flows.deposits)?;
        writeln!(f, "Withdrawals: {} transactions, {:.4} SOL", flows.withdrawal_count, flows.withdrawals)?;
        writeln!(f, "Spent on Trading: {:.4} SOL", flows.spent_trading)?;
        writeln!(f, "Received from Trading: {:.4} SOL", flows.received_trading)?;
        writeln!(f, "Net from Trading: {:.4} SOL", flows.net_trading)?;
        writeln!(f)?;

        writeln!(f, "TOKEN PERFORMANCE (Top {} by absolute gain/loss)", TEXT_REPORT_TOKENS)?;
        writeln!(f, "{}", thin)?;
        writeln!(
            f,
            "{:<15} {:<12} {:<12} {:<12} {:<10} {:<8}",
            "Token", "Invested", "Proceeds", "Gain/Loss", "ROI", "Trades"
        )?;
        writeln!(f, "{}", thin)?;
        for token in self.tokens.iter().take(TEXT_REPORT_TOKENS) {
            writeln!(
                f,
                "{:<15} ${:<11.2} ${:<11.2} ${:<11.2} {:>8.1}% {:<8}",
                token.symbol, token.invested, token.sold_for, token.gain, token.roi_percent, token.total_trades
            )?;
        }
        writeln!(f)?;

        if !self.holdings.is_empty() {
            let symbols: BTreeSet<&str> = self.holdings.iter().map(|h| h.symbol.as_str()).collect();
            writeln!(f, "Open positions: {}", symbols.into_iter().collect::<Vec<_>>().join(", "))?;
            writeln!(f)?;
        }

        writeln!(f, "{}", rule)?;
        writeln!(f, "IMPORTANT DISCLAIMER")?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "This report is for informational purposes only and is not professional tax")?;
        writeln!(f, "advice. Tax laws vary by jurisdiction and change frequently. Rates shown are")?;
        writeln!(f, "top-bracket estimates; consult a qualified tax professional before filing.")?;
        write!(f, "{}", rule)
    }
}
