// Library exports for godark-client

pub mod config; // Configuration management
pub mod error;

// Market data modules
pub mod feed; // Orderbook and trade feed aggregators
pub mod gomarket; // GoMarket endpoint addressing and wire types
pub mod ws; // Reconnecting WebSocket stream client

// Exchange access modules
pub mod monitor; // Backend service status polling
pub mod trading; // REST trading API and private stream
