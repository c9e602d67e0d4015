//! Archive Fever Gateway - HTTP API and WebSocket observer surface

pub mod error;
pub mod server;
pub mod ws;

pub use error::ApiError;
pub use server::{router, start_gateway, AppState};
