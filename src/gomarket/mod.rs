//! GoMarket market-data endpoint addressing
//!
//! GoMarket serves public feeds at
//! `wss://<host>/ws/<channel>/<exchange>/<symbol>`, keyed by the upstream
//! exchange's native symbol. Perp symbols like `BTC-USDT-PERP` collapse to
//! `BTCUSDT` for the binance-usdm source.

pub mod messages;

pub use messages::{DepthSnapshot, TradeMsg};

/// Upstream exchange every feed is sourced from.
pub const EXCHANGE: &str = "binance-usdm";

/// Public feed channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    L2Orderbook,
    LastTrades,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::L2Orderbook => "l2-orderbook",
            Channel::LastTrades => "last-trades",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convert a dash-separated perp symbol to the exchange-native form.
///
/// `BTC-USDT-PERP` becomes `BTCUSDT` (base and quote concatenated, the
/// contract suffix dropped). Symbols with fewer than two segments just lose
/// their dashes.
pub fn to_gomarket_symbol(symbol: &str) -> String {
    let mut parts = symbol.split('-');
    match (parts.next(), parts.next()) {
        (Some(base), Some(quote)) if !base.is_empty() && !quote.is_empty() => {
            format!("{}{}", base, quote)
        }
        _ => symbol.replace('-', ""),
    }
}

/// Build the feed URL for one channel and symbol.
pub fn ws_url(host: &str, channel: Channel, symbol: &str) -> String {
    format!(
        "{}/ws/{}/{}/{}",
        host.trim_end_matches('/'),
        channel.as_str(),
        EXCHANGE,
        to_gomarket_symbol(symbol)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_conversion() {
        assert_eq!(to_gomarket_symbol("BTC-USDT-PERP"), "BTCUSDT");
        assert_eq!(to_gomarket_symbol("ETH-USDT-PERP"), "ETHUSDT");
        assert_eq!(to_gomarket_symbol("SOL-USDC"), "SOLUSDC");
    }

    #[test]
    fn test_symbol_without_dashes_passes_through() {
        assert_eq!(to_gomarket_symbol("BTCUSDT"), "BTCUSDT");
    }

    #[test]
    fn test_symbol_with_trailing_dash() {
        assert_eq!(to_gomarket_symbol("BTC-"), "BTC");
    }

    #[test]
    fn test_ws_url() {
        assert_eq!(
            ws_url(
                "wss://gomarket-api.goquant.io",
                Channel::L2Orderbook,
                "BTC-USDT-PERP"
            ),
            "wss://gomarket-api.goquant.io/ws/l2-orderbook/binance-usdm/BTCUSDT"
        );
        assert_eq!(
            ws_url("wss://host/", Channel::LastTrades, "ETH-USDT-PERP"),
            "wss://host/ws/last-trades/binance-usdm/ETHUSDT"
        );
    }
}
