#![deny(unused)]
//! Core types, traits, and error definitions for CiviScan.
//!
//! This crate provides the foundational building blocks shared across the
//! classification gateway: the request/result data model, the generative
//! provider trait, the error taxonomy, and configuration.

pub mod config;
pub mod error;
pub mod mocks;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::*;
pub use types::*;
