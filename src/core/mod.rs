//! Core application modules
//!
//! This module contains the core functionality of the application:
//! - Configuration management
//! - Terminal event handling
//! - Runner event types
//! - The output sink for script runs

mod config;
mod events;
mod output_sink;

pub mod ipc;

pub use config::*;
pub use events::*;
pub use ipc::*;
pub use output_sink::*;
