//! Swap reconstruction.
//!
//! Turns one [`RawTransaction`] into the economic events it represents,
//! using the wallet's net SOL change and the aggregated token transfers.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::chain::{self, FLOAT_EPSILON};
use crate::parser::{matches_wallet, RawTransaction};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SwapKind {
    Buy,
    Sell,
    Swap,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SwapLeg {
    pub mint: String,
    pub amount: f64,
    pub symbol: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SwapEvent {
    pub date: DateTime<Utc>,
    pub kind: SwapKind,
    pub sold: SwapLeg,
    pub bought: SwapLeg,
    pub signature: String,
    /// Net SOL change of the originating transaction. Informational for
    /// token-to-token swaps; never used for valuation.
    pub base_change: f64,
    pub known_protocol: bool,
}

/// Pure SOL movement into or out of the wallet.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BaseTransfer {
    pub date: DateTime<Utc>,
    pub amount: f64,
    pub signature: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Reconstruction {
    Swaps(Vec<SwapEvent>),
    Deposit(BaseTransfer),
    Withdrawal(BaseTransfer),
    Ignored,
}

pub struct Reconstructor {
    wallet: String,
    base_mint: String,
    base_symbol: String,
    excluded_mints: HashSet<String>,
    source_marker: String,
    protocol_programs: HashSet<String>,
}

impl Reconstructor {
    pub fn new(wallet: &str) -> Reconstructor {
        Reconstructor {
            wallet: wallet.to_string(),
            base_mint: chain::SOL_MINT.to_string(),
            base_symbol: chain::BASE_SYMBOL.to_string(),
            excluded_mints: chain::excluded_mints().into_iter().collect(),
            source_marker: chain::PUMP_SOURCE_MARKER.to_string(),
            protocol_programs: chain::PUMP_FUN_PROGRAMS.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn base_symbol(&mut self, symbol: &str) -> &mut Self {
        self.base_symbol = symbol.to_string();
        self
    }

    pub fn source_marker(&mut self, marker: &str) -> &mut Self {
        self.source_marker = marker.to_uppercase();
        self
    }

    pub fn protocol_programs<I, S>(&mut self, programs: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocol_programs = programs.into_iter().map(Into::into).collect();
        self
    }

    pub fn wallet(&self) -> &str {
        &self.wallet
    }

    pub fn reconstruct(&self, tx: &RawTransaction) -> Reconstruction {
        let net = tx.net_base_change;

        if tx.token_transfers.is_empty() {
            let transfer = BaseTransfer {
                date: tx.date,
                amount: net.abs(),
                signature: tx.signature.clone(),
            };
            return if net > FLOAT_EPSILON {
                Reconstruction::Deposit(transfer)
            } else if net < -FLOAT_EPSILON {
                Reconstruction::Withdrawal(transfer)
            } else {
                Reconstruction::Ignored
            };
        }

        // same-mint transfers collapse into one movement, in order of first appearance
        let mut tokens_in: Vec<(String, f64)> = Vec::new();
        let mut tokens_out: Vec<(String, f64)> = Vec::new();
        for transfer in &tx.token_transfers {
            if self.excluded_mints.contains(&transfer.mint) {
                continue;
            }
            if matches_wallet(Some(transfer.to_account.as_str()), &self.wallet) {
                accumulate(&mut tokens_in, &transfer.mint, transfer.amount);
            } else if matches_wallet(Some(transfer.from_account.as_str()), &self.wallet) {
                accumulate(&mut tokens_out, &transfer.mint, transfer.amount);
            }
        }

        let known_protocol = self.is_known_protocol(tx);
        let event = |kind, sold: SwapLeg, bought: SwapLeg| SwapEvent {
            date: tx.date,
            kind,
            sold,
            bought,
            signature: tx.signature.clone(),
            base_change: net,
            known_protocol,
        };

        let swaps: Vec<SwapEvent> = if net < -FLOAT_EPSILON && !tokens_in.is_empty() && tokens_out.is_empty() {
            // equal split across co-bought tokens, not weighted by value
            let per_token = net.abs() / tokens_in.len() as f64;
            tokens_in
                .into_iter()
                .map(|(mint, amount)| {
                    event(SwapKind::Buy, self.base_leg(per_token), token_leg(mint, amount))
                })
                .collect()
        } else if net > FLOAT_EPSILON && !tokens_out.is_empty() && tokens_in.is_empty() {
            let per_token = net / tokens_out.len() as f64;
            tokens_out
                .into_iter()
                .map(|(mint, amount)| {
                    event(SwapKind::Sell, token_leg(mint, amount), self.base_leg(per_token))
                })
                .collect()
        } else if !tokens_out.is_empty() && !tokens_in.is_empty() {
            let mut swaps = Vec::new();
            for (out_mint, out_amount) in &tokens_out {
                for (in_mint, in_amount) in &tokens_in {
                    if out_mint != in_mint {
                        swaps.push(event(
                            SwapKind::Swap,
                            token_leg(out_mint.clone(), *out_amount),
                            token_leg(in_mint.clone(), *in_amount),
                        ));
                    }
                }
            }
            swaps
        } else {
            Vec::new()
        };

        if swaps.is_empty() {
            Reconstruction::Ignored
        } else {
            Reconstruction::Swaps(swaps)
        }
    }

    fn is_known_protocol(&self, tx: &RawTransaction) -> bool {
        if !self.source_marker.is_empty() && tx.source.to_uppercase().contains(&self.source_marker) {
            return true;
        }
        tx.accounts.iter().any(|account| self.protocol_programs.contains(account))
    }

    fn base_leg(&self, amount: f64) -> SwapLeg {
        SwapLeg {
            mint: self.base_mint.clone(),
            amount,
            symbol: Some(self.base_symbol.clone()),
        }
    }
}

fn token_leg(mint: String, amount: f64) -> SwapLeg {
    SwapLeg { mint, amount, symbol: None }
}

fn accumulate(movements: &mut Vec<(String, f64)>, mint: &str, amount: f64) {
    match movements.iter_mut().find(|(m, _)| m == mint) {
        Some((_, total)) => *total += amount,
        None => movements.push((mint.to_string(), amount)),
    }
}
