//! Color themes.
//!
//! [`ThemeMode`] is what the user toggles with `t`; [`Theme`] is the resolved
//! palette. `Auto` picks light or dark from the `COLORFGBG` variable many
//! terminals export.

use std::fmt;

use ratatui::style::Color;

/// Theme selection cycled by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeMode {
    #[default]
    Auto,
    Light,
    Dark,
}

impl ThemeMode {
    /// Auto → Light → Dark → Auto.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Auto => Self::Light,
            Self::Light => Self::Dark,
            Self::Dark => Self::Auto,
        }
    }

    #[must_use]
    pub fn resolve(self) -> Theme {
        match self {
            Self::Auto => Theme::detect(),
            Self::Light => Theme::light(),
            Self::Dark => Theme::dark(),
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Light => "light",
            Self::Dark => "dark",
        })
    }
}

/// Palette used by the views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    /// Titles and key hints.
    pub highlight: Color,
    /// The selected script.
    pub selected: Color,
    pub border: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    /// Secondary text such as the status line.
    pub muted: Color,
    pub text: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Theme {
    #[must_use]
    pub fn dark() -> Self {
        Self {
            highlight: Color::Cyan,
            selected: Color::LightBlue,
            border: Color::DarkGray,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            muted: Color::DarkGray,
            text: Color::White,
        }
    }

    #[must_use]
    pub fn light() -> Self {
        Self {
            highlight: Color::Blue,
            selected: Color::Magenta,
            border: Color::Gray,
            success: Color::Rgb(0, 128, 0),
            warning: Color::Rgb(204, 153, 0),
            error: Color::Rgb(139, 0, 0),
            muted: Color::Gray,
            text: Color::Black,
        }
    }

    /// Picks a palette from `COLORFGBG`, falling back to dark.
    #[must_use]
    pub fn detect() -> Self {
        std::env::var("COLORFGBG")
            .ok()
            .and_then(|value| from_colorfgbg(&value))
            .unwrap_or_else(Self::dark)
    }
}

/// Parses `foreground;background[;...]`.
///
/// Background 7 (light gray) and the bright colors 8-15 count as light.
fn from_colorfgbg(value: &str) -> Option<Theme> {
    let background: u8 = value.split(';').nth(1)?.trim().parse().ok()?;
    if background >= 8 || background == 7 {
        Some(Theme::light())
    } else {
        Some(Theme::dark())
    }
}
