//! Database access for hallyu-sync
//!
//! Schema creation and row models live in `hallyu_common::db`; this module
//! holds the queries the duplicate, merge and sync services run.

pub mod albums;
pub mod artists;
pub mod productions;
pub mod settings;
