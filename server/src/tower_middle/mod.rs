//! Tower middleware wrapped around the API router.
//!
//! - `IdentityLayer` verifies bearer tokens and attaches a `Principal`
//! - `TimeoutLayer` turns a stuck handler into a JSON 408
pub mod identity_layer;
pub mod tower_timeout_handler;

pub use identity_layer::{IdentityLayer, IdentityService};
pub use tower_timeout_handler::{TimeoutLayer, TimeoutService};
