//! HTTP API handlers for hallyu-sync

pub mod artists;
pub mod health;
pub mod sse;
pub mod sync;

pub use artists::artist_routes;
pub use health::health_routes;
pub use sse::event_stream;
pub use sync::sync_routes;
