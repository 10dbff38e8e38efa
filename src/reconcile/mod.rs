//! Diff-and-converge passes over the remote API tree, one module per level.

pub mod integration;
pub mod methods;
pub mod resources;

pub use integration::check_integration;
pub use methods::reconcile_methods;
pub use resources::reconcile_resources;
