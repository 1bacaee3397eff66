//! MCP tool registry for the ESP-IDF server

pub mod handler;
pub mod types;

pub use handler::EspIdfToolHandler;
