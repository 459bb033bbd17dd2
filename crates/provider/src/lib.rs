#![deny(unused)]
//! Provider adapters for CiviScan.
//!
//! This crate adapts the external Gemini `generateContent` REST API to the
//! core `GenerativeClient` trait.

pub mod gemini;

pub use gemini::{create_client_from_config, GeminiClient, GeminiConfig};
