pub mod client;
pub mod error;
pub mod http;
pub mod state;

pub use client::IamClient;
