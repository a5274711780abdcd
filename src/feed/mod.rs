pub mod orderbook;
pub mod registry;
pub mod trades;

pub use orderbook::{aggregate, BookLevel, OrderbookFeed, OrderbookView};
pub use registry::FeedRegistry;
pub use trades::{Side, TradeEvent, TradeFeed, TradeTape};
