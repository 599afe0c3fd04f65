//! Symbol normalization.
//!
//! Exchanges disagree on instrument naming: Binance uses `BTCUSDT`, OKX
//! uses `BTC-USDT`, Gate uses `BTC_USDT`. Internally everything is keyed
//! by the normalized form: uppercase, no delimiters.

/// Normalize an instrument symbol to the canonical internal form.
///
/// Strips `-`, `_`, `/` delimiters and uppercases. The inverse (canonical
/// -> wire) lives in each protocol adapter, since the split point is
/// exchange-specific.
pub fn normalize_symbol(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '-' | '_' | '/'))
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Split a normalized symbol into (base, quote) by matching a known quote
/// suffix. Used by adapters that need a delimited wire format.
///
/// Returns None when no known quote currency matches.
pub fn split_symbol(symbol: &str) -> Option<(&str, &str)> {
    // Longest suffixes first so USDT wins over USD.
    const QUOTES: [&str; 6] = ["USDT", "USDC", "BUSD", "USD", "BTC", "ETH"];

    for quote in QUOTES {
        if let Some(base) = symbol.strip_suffix(quote) {
            if !base.is_empty() {
                return Some((base, quote));
            }
        }
    }
    None
}
