pub mod rest;
pub mod ws;

pub use rest::{
    ApiClient, ApiEnvelope, CreateAccountRequest, CreateApiKeyRequest, Instrument,
    ModifyOrderRequest, NbboStatus, OrderResponse, OrderSide, OrderType, PlaceOrderRequest,
    TimeInForce, Visibility,
};
pub use ws::{ChannelMessage, TradingSocket};
