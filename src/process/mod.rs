//! Process management module
//!
//! Spawns one test script at a time and streams its output and exit
//! status back to the UI loop.

mod runner;
mod types;

pub use runner::*;
pub use types::*;
