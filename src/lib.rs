//! Capital gains accounting for a Solana wallet.
//!
//! Raw enhanced transactions are reconstructed into swaps, valued in the
//! base currency, run through a FIFO or LIFO lot ledger and assessed against
//! a regional tax table. [`accounting::accountant::Accountant`] drives the
//! whole pipeline.

pub mod accounting;
pub mod chain;
pub mod error;
pub mod parser;
pub mod prices;
pub mod source;
pub mod swaps;
pub mod tax;

#[cfg(test)]
mod mock_http;
