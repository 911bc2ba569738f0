pub mod accountant;
pub mod reports;
mod calculation;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::tax::Term;

pub use calculation::{calculate_capital_gains, CapitalGainsCalculation, Holding};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountingMethod {
    FIFO,
    LIFO,
}

impl AccountingMethod {
    /// Parses a method name, falling back to FIFO.
    pub fn from_name_or_default(name: &str) -> AccountingMethod {
        name.parse().unwrap_or_else(|_| {
            warn!("Unknown accounting method \"{}\", using FIFO", name);
            AccountingMethod::FIFO
        })
    }
}

impl Default for AccountingMethod {
    fn default() -> AccountingMethod {
        AccountingMethod::FIFO
    }
}

impl FromStr for AccountingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<AccountingMethod, String> {
        match s.trim().to_uppercase().as_str() {
            "FIFO" => Ok(AccountingMethod::FIFO),
            "LIFO" => Ok(AccountingMethod::LIFO),
            _ => Err(format!("unknown accounting method: {}", s)),
        }
    }
}

impl fmt::Display for AccountingMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One realized disposal.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaxableEvent {
    pub date: DateTime<Utc>,
    pub token: String,
    pub token_name: String,
    pub token_mint: String,
    pub amount: f64,
    pub proceeds: f64,
    pub cost_basis: f64,
    pub capital_gain: f64,
    /// Quantity-weighted average age of the consumed lots, truncated to days.
    pub holding_days: i64,
    pub term_type: Term,
    pub tax_liability: f64,
}

/// Running per-token aggregates.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TokenStats {
    pub total_bought: f64,
    pub total_sold: f64,
    pub total_cost: f64,
    pub total_proceeds: f64,
    pub first_purchase_date: Option<DateTime<Utc>>,
    pub last_sale_date: Option<DateTime<Utc>>,
    pub total_trades: u32,
    pub short_term_gains: f64,
    pub long_term_gains: f64,
}

/// Incremental updates for callers rendering live progress.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Progress {
    FetchProgress {
        page: usize,
        transactions_on_page: usize,
        total_transactions: usize,
    },
    ParseProgress {
        parsed_swaps: usize,
        known_protocol: usize,
    },
    Processed {
        processed: usize,
        total: usize,
    },
    Disposal {
        event: TaxableEvent,
        stats: TokenStats,
    },
}

/// Optional progress channel; a closed receiver is not an error.
#[derive(Clone, Default)]
pub struct ProgressSender(Option<UnboundedSender<Progress>>);

impl ProgressSender {
    pub fn new(sender: UnboundedSender<Progress>) -> ProgressSender {
        ProgressSender(Some(sender))
    }

    pub fn none() -> ProgressSender {
        ProgressSender(None)
    }

    pub fn emit(&self, progress: Progress) {
        if let Some(sender) = &self.0 {
            let _ = sender.send(progress);
        }
    }
}
