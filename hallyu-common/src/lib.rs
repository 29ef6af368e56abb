//! # HallyuHub Common Library
//!
//! Shared code for the HallyuHub back-office services:
//! - Database schema and row models
//! - Event types (HallyuEvent enum) and the broadcast event bus
//! - Bootstrap configuration loading
//! - SSE helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sse;
pub mod types;

pub use error::{Error, Result};
pub use types::{MergeStrategy, SyncKind};
