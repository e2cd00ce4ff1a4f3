//! Theme system for consistent UI styling
//!
//! Color palettes and style builders, selected from the `ui.theme`
//! config preference.

use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::BorderType;
use std::sync::RwLock;

use crate::core::LineSource;

/// Color palette for the application
#[derive(Debug, Clone)]
pub struct ColorPalette {
    pub primary: Color,
    pub secondary: Color,

    // Status colors
    pub success: Color,
    pub warning: Color,
    pub error: Color,

    // Text colors
    pub text: Color,
    pub text_muted: Color,
    pub text_dim: Color,

    // Background colors
    pub bg_secondary: Color,
    pub bg_highlight: Color,
    pub bg_selected: Color,

    pub border: Color,
    pub border_focused: Color,
}

impl ColorPalette {
    /// Dark theme (default)
    pub fn dark() -> Self {
        Self {
            primary: Color::Cyan,
            secondary: Color::Yellow,

            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,

            text: Color::White,
            text_muted: Color::Gray,
            text_dim: Color::DarkGray,

            bg_secondary: Color::Rgb(30, 30, 30),
            bg_highlight: Color::Rgb(50, 50, 60),
            bg_selected: Color::Rgb(40, 60, 80),

            border: Color::DarkGray,
            border_focused: Color::Cyan,
        }
    }

    /// Light theme
    pub fn light() -> Self {
        Self {
            primary: Color::Blue,
            secondary: Color::Rgb(200, 120, 0),

            success: Color::Rgb(0, 150, 0),
            warning: Color::Rgb(200, 150, 0),
            error: Color::Rgb(200, 0, 0),

            text: Color::Black,
            text_muted: Color::DarkGray,
            text_dim: Color::Gray,

            bg_secondary: Color::Rgb(240, 240, 240),
            bg_highlight: Color::Rgb(220, 230, 240),
            bg_selected: Color::Rgb(200, 220, 255),

            border: Color::Gray,
            border_focused: Color::Blue,
        }
    }
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self::dark()
    }
}

#[derive(Debug, Clone)]
pub struct Theme {
    pub colors: ColorPalette,
    pub border_type: BorderType,
    pub border_type_focused: BorderType,
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            colors: ColorPalette::dark(),
            border_type: BorderType::Rounded,
            border_type_focused: BorderType::Double,
        }
    }

    pub fn light() -> Self {
        Self {
            colors: ColorPalette::light(),
            ..Self::dark()
        }
    }

    // ===== Style Builders =====

    pub fn text(&self) -> Style {
        Style::default().fg(self.colors.text)
    }

    /// Labels and key hints
    pub fn text_muted(&self) -> Style {
        Style::default().fg(self.colors.text_muted)
    }

    pub fn text_dim(&self) -> Style {
        Style::default().fg(self.colors.text_dim)
    }

    pub fn primary(&self) -> Style {
        Style::default().fg(self.colors.primary)
    }

    pub fn success(&self) -> Style {
        Style::default().fg(self.colors.success)
    }

    pub fn warning(&self) -> Style {
        Style::default().fg(self.colors.warning)
    }

    pub fn error(&self) -> Style {
        Style::default().fg(self.colors.error)
    }

    /// Style for an output line by where it came from
    pub fn output_line(&self, source: LineSource) -> Style {
        match source {
            LineSource::Stdout => self.text(),
            LineSource::Stderr => self.error(),
            LineSource::Host => Style::default()
                .fg(self.colors.secondary)
                .add_modifier(Modifier::BOLD),
        }
    }

    /// List highlight style (for ratatui List widget)
    pub fn list_highlight(&self) -> Style {
        Style::default()
            .fg(self.colors.text)
            .bg(self.colors.bg_selected)
            .add_modifier(Modifier::BOLD)
    }

    /// Active entry of the menu bar
    pub fn tab_highlight(&self) -> Style {
        Style::default()
            .fg(self.colors.secondary)
            .bg(self.colors.bg_highlight)
            .add_modifier(Modifier::BOLD)
    }

    pub fn border(&self) -> Style {
        Style::default().fg(self.colors.border)
    }

    pub fn border_focused(&self) -> Style {
        Style::default().fg(self.colors.border_focused)
    }

    pub fn input_focused(&self) -> Style {
        Style::default()
            .fg(self.colors.text)
            .bg(self.colors.bg_highlight)
    }

    pub fn status_bar(&self) -> Style {
        Style::default()
            .fg(self.colors.text)
            .bg(self.colors.bg_secondary)
    }

    pub fn title(&self) -> Style {
        Style::default()
            .fg(self.colors.primary)
            .add_modifier(Modifier::BOLD)
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

static CURRENT_THEME: RwLock<Option<Theme>> = RwLock::new(None);

/// Get the current theme (defaults to dark)
pub fn current() -> Theme {
    CURRENT_THEME
        .read()
        .ok()
        .and_then(|theme| theme.clone())
        .unwrap_or_default()
}

pub fn set_theme(theme: Theme) {
    if let Ok(mut current) = CURRENT_THEME.write() {
        *current = Some(theme);
    }
}

/// Initialize theme from config
pub fn init_from_config(config_theme: crate::core::Theme) {
    let theme = match config_theme {
        crate::core::Theme::Dark => Theme::dark(),
        crate::core::Theme::Light => Theme::light(),
    };
    set_theme(theme);
}
