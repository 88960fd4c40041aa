//! Shared types and models for the Pescadería Huina back office
//!
//! This crate contains the sale and product domain shared between the
//! backend, the browser sale form (via WASM), and tests.

pub mod models;
pub mod pricing;
pub mod types;
pub mod validation;

pub use models::*;
pub use pricing::*;
pub use types::*;
pub use validation::*;
