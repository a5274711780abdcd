//! Wire types for GoMarket feed payloads

use serde::Deserialize;

/// Full L2 orderbook snapshot. Every message replaces the prior book
/// entirely; there are no incremental diffs on this channel.
///
/// Levels arrive as `[price, size]` string pairs, bids descending and asks
/// ascending by price.
#[derive(Debug, Clone, Deserialize)]
pub struct DepthSnapshot {
    #[serde(default)]
    pub bids: Vec<[String; 2]>,
    #[serde(default)]
    pub asks: Vec<[String; 2]>,
}

/// One trade print from the last-trades channel.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeMsg {
    pub trade_id: u64,
    pub price: String,
    pub quantity: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    /// True when the buyer was the resting (maker) side
    pub buyer_maker: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_depth_snapshot() {
        let json = r#"{
            "bids": [["100.00", "1.5"], ["99.50", "2.0"]],
            "asks": [["100.50", "1.0"], ["101.00", "3.0"]]
        }"#;

        let snapshot: DepthSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.bids.len(), 2);
        assert_eq!(snapshot.asks.len(), 2);
        assert_eq!(snapshot.bids[0], ["100.00".to_string(), "1.5".to_string()]);
        assert_eq!(snapshot.asks[1], ["101.00".to_string(), "3.0".to_string()]);
    }

    #[test]
    fn test_parse_depth_snapshot_missing_sides() {
        let snapshot: DepthSnapshot = serde_json::from_str(r#"{"bids": []}"#).unwrap();
        assert!(snapshot.bids.is_empty());
        assert!(snapshot.asks.is_empty());
    }

    #[test]
    fn test_parse_trade() {
        let json = r#"{
            "trade_id": 42,
            "price": "100.25",
            "quantity": "0.5",
            "timestamp": 1700000000000,
            "buyer_maker": false
        }"#;

        let trade: TradeMsg = serde_json::from_str(json).unwrap();
        assert_eq!(trade.trade_id, 42);
        assert_eq!(trade.price, "100.25");
        assert_eq!(trade.quantity, "0.5");
        assert_eq!(trade.timestamp, 1_700_000_000_000);
        assert!(!trade.buyer_maker);
    }
}
