#![deny(unused)]
//! Resilient classification gateway for CiviScan.
//!
//! This crate composes rate limiting and bounded retry around the
//! generative provider, normalizes provider responses into the fixed
//! result shape, and exposes the HTTP surface.

pub mod classifier;
pub mod rate_limiter;
pub mod retry;
pub mod server;

pub use classifier::ClassificationGateway;
pub use rate_limiter::RateLimiter;
pub use retry::{RetryCallback, RetryPolicy};
pub use server::{GatewayServer, ServerConfig};
