//! Boundary parser for enhanced transaction records.
//!
//! Upstream records are loosely typed JSON; every field is optional on the
//! wire. This module maps a record onto a [`RawTransaction`] relative to one
//! wallet, applying defaults where the accounting does not care and rejecting
//! records whose timestamp, balance section or transfer fields are unusable.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::chain::LAMPORTS_PER_SOL;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("missing or invalid timestamp")]
    MissingTimestamp,
    #[error("missing account balance data")]
    MissingBalanceData,
    #[error("token transfer #{index} has no {field}")]
    MissingTransferField { index: usize, field: &'static str },
}

#[derive(Clone, Debug, PartialEq)]
pub struct TokenTransfer {
    pub mint: String,
    pub from_account: String,
    pub to_account: String,
    pub amount: f64,
}

/// One on-chain transaction as seen from a single wallet.
#[derive(Clone, Debug, PartialEq)]
pub struct RawTransaction {
    pub signature: String,
    pub date: DateTime<Utc>,
    /// Net native balance change of the wallet in SOL; positive means received.
    pub net_base_change: f64,
    pub token_transfers: Vec<TokenTransfer>,
    /// Provider source tag, e.g. `PUMP_AMM` or `JUPITER`.
    pub source: String,
    /// Every account and program id the transaction touched.
    pub accounts: Vec<String>,
}

impl RawTransaction {
    pub fn parse(value: Value, wallet: &str) -> Result<RawTransaction, ParseError> {
        let record: EnhancedRecord = serde_json::from_value(value)?;

        let date = match record.timestamp {
            Some(ts) if ts != 0 => Utc.timestamp_opt(ts, 0).single(),
            _ => None,
        }
        .ok_or(ParseError::MissingTimestamp)?;

        let account_data = record.account_data.ok_or(ParseError::MissingBalanceData)?;

        let net_base_change = account_data
            .iter()
            .find(|entry| matches_wallet(entry.account.as_deref(), wallet))
            .and_then(|entry| entry.native_balance_change)
            .map(|lamports| lamports / LAMPORTS_PER_SOL)
            .unwrap_or(0.0);

        let mut token_transfers = Vec::new();
        for (index, transfer) in record.token_transfers.unwrap_or_default().into_iter().enumerate() {
            let mint = transfer
                .mint
                .filter(|mint| !mint.is_empty())
                .ok_or(ParseError::MissingTransferField { index, field: "mint" })?;
            let amount = transfer
                .token_amount
                .ok_or(ParseError::MissingTransferField { index, field: "tokenAmount" })?;
            token_transfers.push(TokenTransfer {
                mint,
                from_account: transfer.from_user_account.unwrap_or_default(),
                to_account: transfer.to_user_account.unwrap_or_default(),
                amount,
            });
        }

        let mut accounts: Vec<String> = account_data
            .into_iter()
            .filter_map(|entry| entry.account)
            .collect();
        let mut pending = record.instructions.unwrap_or_default();
        while let Some(instruction) = pending.pop() {
            if let Some(program_id) = instruction.program_id {
                accounts.push(program_id);
            }
            pending.extend(instruction.inner_instructions.unwrap_or_default());
        }

        Ok(RawTransaction {
            signature: record.signature.unwrap_or_default(),
            date,
            net_base_change,
            token_transfers,
            source: record.source.unwrap_or_default(),
            accounts,
        })
    }
}

pub(crate) fn matches_wallet(account: Option<&str>, wallet: &str) -> bool {
    account.map_or(false, |account| account.eq_ignore_ascii_case(wallet))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnhancedRecord {
    signature: Option<String>,
    timestamp: Option<i64>,
    source: Option<String>,
    account_data: Option<Vec<AccountRecord>>,
    token_transfers: Option<Vec<TransferRecord>>,
    instructions: Option<Vec<InstructionRecord>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountRecord {
    account: Option<String>,
    native_balance_change: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferRecord {
    mint: Option<String>,
    from_user_account: Option<String>,
    to_user_account: Option<String>,
    token_amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstructionRecord {
    program_id: Option<String>,
    inner_instructions: Option<Vec<InstructionRecord>>,
}
