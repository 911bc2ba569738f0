//! Mint addresses, program ids and numeric constants of the Solana chain
//! that the reconstruction and accounting code relies on.

pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Amounts within this distance of zero are treated as zero.
pub const FLOAT_EPSILON: f64 = 0.0001;

/// Native SOL and wrapped SOL share the same mint address.
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";
pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

pub const BASE_SYMBOL: &str = "SOL";
pub const BASE_NAME: &str = "Solana";

/// Reference price of the base currency used when no history is available.
pub const DEFAULT_BASE_PRICE: f64 = 150.0;

/// Source tag substring marking pump.fun routed transactions.
pub const PUMP_SOURCE_MARKER: &str = "PUMP";

pub const PUMP_FUN_PROGRAMS: [&str; 5] = [
    "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P",
    "Ce6TQqeHC9p8KetsN6JsjHK7UTZk7nasjjnr7XxXp9F1",
    "62qc2CNXwrYqQScmEdiZFFAnJR262PxWEuNQtxfafNgV",
    "4wTV1YmiEkRvAtNtsSGPtUrqRYQMe5SKy2uB4Jjaxnjf",
    "8Wf5TiAheLUqBrKXeYg2JtAFFMWtKdG2BSFgqUcPVwTt",
];

/// Mints whose transfers are never aggregated as token movements; their
/// value is already reflected in the wallet's native balance change.
pub fn excluded_mints() -> Vec<String> {
    vec![SOL_MINT.to_string(), WSOL_MINT.to_string(), USDC_MINT.to_string()]
}

pub fn is_base_mint(mint: &str) -> bool {
    mint == SOL_MINT || mint == WSOL_MINT
}
