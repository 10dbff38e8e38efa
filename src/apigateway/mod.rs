pub mod api;
pub mod client;
pub mod error;
pub mod http;
pub mod state;
pub mod types;

pub use client::ApiGatewayClient;
