pub mod client;
pub mod error;
pub mod function;
pub mod http;
pub mod state;
pub mod types;

pub use client::LambdaClient;
