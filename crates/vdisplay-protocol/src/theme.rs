//! Display themes.
//!
//! Themes are a visual tag only; the engine stores them so monitoring
//! consumers can render the display in the right colours.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported display themes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Classic green LCD.
    #[default]
    #[serde(alias = "lcd-green")]
    Green,
    /// Blue LCD.
    #[serde(alias = "lcd-blue")]
    Blue,
    /// Red LED.
    #[serde(alias = "led-red")]
    Red,
    /// White OLED.
    #[serde(alias = "oled-white")]
    White,
    /// Cyan VFD.
    #[serde(alias = "vfd-cyan")]
    Cyan,
}

impl Theme {
    /// Every supported theme.
    pub const ALL: [Theme; 5] = [Theme::Green, Theme::Blue, Theme::Red, Theme::White, Theme::Cyan];

    /// Get the canonical tag for this theme.
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Green => "green",
            Theme::Blue => "blue",
            Theme::Red => "red",
            Theme::White => "white",
            Theme::Cyan => "cyan",
        }
    }

    /// Parse a theme tag. Accepts canonical tags and the legacy
    /// `lcd-green` style names.
    pub fn from_tag(tag: &str) -> Option<Theme> {
        match tag {
            "green" | "lcd-green" => Some(Theme::Green),
            "blue" | "lcd-blue" => Some(Theme::Blue),
            "red" | "led-red" => Some(Theme::Red),
            "white" | "oled-white" => Some(Theme::White),
            "cyan" | "vfd-cyan" => Some(Theme::Cyan),
            _ => None,
        }
    }

    /// Foreground and background colours.
    pub fn colors(&self) -> ThemeColors {
        let (foreground, background) = match self {
            Theme::Green => ("#00ff00", "#001100"),
            Theme::Blue => ("#0088ff", "#000011"),
            Theme::Red => ("#ff0000", "#110000"),
            Theme::White => ("#ffffff", "#000000"),
            Theme::Cyan => ("#00ffff", "#001111"),
        };
        ThemeColors { foreground, background }
    }
}

/// Colours a theme renders with, as `#rrggbb` strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThemeColors {
    /// Text colour.
    pub foreground: &'static str,
    /// Panel colour.
    pub background: &'static str,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a theme tag is not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTheme(pub String);

impl fmt::Display for UnknownTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown theme '{}'", self.0)
    }
}

impl std::error::Error for UnknownTheme {}

impl FromStr for Theme {
    type Err = UnknownTheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Theme::from_tag(s).ok_or_else(|| UnknownTheme(s.to_string()))
    }
}
