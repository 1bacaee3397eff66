//! ESP-IDF MCP Server
//!
//! Exposes ESP-IDF project, build, flash, monitor, debug and test operations
//! as MCP tools, and turns the toolchain's text output (build logs, linker
//! maps, sdkconfig files, serial logs, component CMake files) into
//! structured results.

pub mod commands;
pub mod config;
pub mod error;
pub mod parsers;
pub mod paths;
pub mod runner;
pub mod toolchain;
pub mod tools;

pub use config::Config;
pub use error::{Result, ToolError};
pub use tools::EspIdfToolHandler;
