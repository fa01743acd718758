//! User configuration
//!
//! Edit this file to customize labels, colors and timings.

use crossterm::style::{Attribute, Attributes, Color, ContentStyle};
use std::path::PathBuf;

// ============================================================================
// LABELS
// ============================================================================

/// Characters handed out as labels, in allocation order.
/// Matches beyond this many are left unlabeled.
pub const LABEL_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";

/// Delimiters drawn around a label in the popup
pub const LABEL_LEFT_DELIM: char = '⠐';
pub const LABEL_RIGHT_DELIM: char = '⠂';

/// Markers wrapping a label inside the annotated text (private use area)
pub const PLACEHOLDER_OPEN: char = '\u{E000}';
pub const PLACEHOLDER_CLOSE: char = '\u{E001}';

// ============================================================================
// STYLES
// ============================================================================

/// Style applied at the start of every line and after every highlighted match
pub fn baseline_style() -> ContentStyle {
    ContentStyle {
        foreground_color: Some(Color::AnsiValue(240)),
        ..ContentStyle::default()
    }
}

/// Style of the label glyph (bold bright green)
pub fn label_style() -> ContentStyle {
    ContentStyle {
        foreground_color: Some(Color::AnsiValue(46)),
        attributes: Attributes::from(Attribute::Bold),
        ..ContentStyle::default()
    }
}

/// Named styles available to rules without defining them in the rules file
pub fn builtin_style(name: &str) -> Option<ContentStyle> {
    let on_dark = |fg: u8| ContentStyle {
        foreground_color: Some(Color::AnsiValue(fg)),
        background_color: Some(Color::AnsiValue(235)),
        ..ContentStyle::default()
    };
    let fg = |color: Color| ContentStyle {
        foreground_color: Some(color),
        ..ContentStyle::default()
    };
    let attr = |attribute: Attribute| ContentStyle {
        attributes: Attributes::from(attribute),
        ..ContentStyle::default()
    };

    let style = match name {
        "reset" => ContentStyle::default(),
        "bold" => attr(Attribute::Bold),
        "dim" => attr(Attribute::Dim),
        "underline" => attr(Attribute::Underlined),
        "red" => fg(Color::DarkRed),
        "green" => fg(Color::DarkGreen),
        "blue" => fg(Color::DarkBlue),
        "cyan" => fg(Color::DarkCyan),
        // Solarized dark background
        "highlight_orange" => on_dark(166),
        "highlight_cyan" => on_dark(37),
        "highlight_blue" => on_dark(33),
        "dull" => baseline_style(),
        "label_color" => label_style(),
        _ => return None,
    };
    Some(style)
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

/// How long tmux shows the status message, in milliseconds
pub const NOTIFY_SHORT_MS: u32 = 1000;
pub const NOTIFY_LONG_MS: u32 = 2000;

// ============================================================================
// RULES
// ============================================================================

/// Default location of the rules file: <config_dir>/tmux-uhm/rules.toml
pub fn default_rules_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tmux-uhm").join("rules.toml"))
}
