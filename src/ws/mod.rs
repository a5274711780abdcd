pub mod backoff;
pub mod client;

pub use backoff::ReconnectPolicy;
pub use client::{StreamClient, StreamEvent};
