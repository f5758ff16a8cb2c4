//! Fallback-chain selection and request dispatch.

mod dispatcher;
mod strategy;

pub use dispatcher::Dispatcher;
pub use strategy::{FallbackChain, RoutingStrategy};
