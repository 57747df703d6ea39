// src/lib.rs

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod utils;

// Re-exported for the binary and integration tests
pub use routes::create_router;
