//! Terminal UI module
//!
//! This module provides all UI rendering functionality including:
//! - Theme system with light and dark palettes
//! - Icon set with Unicode and ASCII support
//! - View rendering functions

pub mod icons;
pub mod theme;
mod render;

pub use icons::Icons;
pub use render::draw;
pub use theme::Theme;

/// Initialize the UI system with config settings
pub fn init(config: &crate::core::Config) {
    theme::init_from_config(config.ui.theme);
    let icons = if config.ui.ascii_icons {
        Icons::ascii()
    } else {
        Icons::unicode()
    };
    icons::set_icons(icons);
}
