//! Declarative deployment of a REST API and the function behind it.
//!
//! A YAML [`config::Document`] describes the desired resource tree. The
//! [`deployer::Deployer`] converges the remote API with it through the
//! [`reconcile`] passes, and publishes the function the API integrates with.

pub mod apigateway;
pub mod config;
pub mod credentials;
pub mod deployer;
pub mod error;
pub mod generate;
pub mod iam;
pub mod journal;
pub mod lambda;
pub mod logging;
pub mod normalize;
pub mod poll;
pub mod reconcile;
pub mod sigv4;
pub mod tasks;
pub mod transport;

pub use deployer::{Clients, Deployer};
pub use error::{Error, ErrorKind, Result};
