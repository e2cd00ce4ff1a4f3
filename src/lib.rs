//! benchterm library: the pieces behind the `benchterm` binary

// Core modules (config, events, runner events, output sink)
pub mod core;
// Script execution
pub mod process;
// Startup self-update against the git upstream
pub mod update;
// Script catalogue and report browser
pub mod bench;
// Main application logic
pub mod app;
// Terminal UI rendering
pub mod ui;
