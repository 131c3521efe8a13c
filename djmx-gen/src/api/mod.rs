//! HTTP API handlers for djmx-gen

pub mod catalog;
pub mod generate;
pub mod health;
pub mod sse;

pub use catalog::catalog_routes;
pub use generate::generate_routes;
pub use health::health_routes;
pub use sse::event_stream;
