//! Pass/fail markers
//!
//! Whether markers are colored is decided once, from configuration, and
//! handed to the runner as a plain flag.

use colored::Color;

use super::config::{ColorChoice, Config};

const CHECK_MARK: &str = "\u{2713}";
const BALLOT_X: &str = "\u{2717}";

/// Glyphs printed in front of pass and fail lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pass: String,
    fail: String,
}

impl Markers {
    /// Build markers, wrapping the glyphs in ANSI color codes when enabled
    pub fn new(color: bool) -> Self {
        if color {
            Self {
                pass: paint(CHECK_MARK, Color::Green),
                fail: paint(BALLOT_X, Color::Red),
            }
        } else {
            Self {
                pass: CHECK_MARK.to_string(),
                fail: BALLOT_X.to_string(),
            }
        }
    }

    /// Markers following the process configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(color_enabled(config.output.color))
    }

    pub fn pass(&self) -> &str {
        &self.pass
    }

    pub fn fail(&self) -> &str {
        &self.fail
    }
}

impl Default for Markers {
    fn default() -> Self {
        Self::from_config(Config::global())
    }
}

/// Resolve a color choice to a yes/no answer
///
/// `Auto` defers to `colored`'s own detection (CLICOLOR, CLICOLOR_FORCE,
/// NO_COLOR and whether stdout is a terminal).
pub fn color_enabled(choice: ColorChoice) -> bool {
    match choice {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => colored::control::SHOULD_COLORIZE.should_colorize(),
    }
}

// Not ColoredString: its Display re-checks the global override, and the
// decision here has already been made.
fn paint(glyph: &str, color: Color) -> String {
    format!("\x1b[{}m{}\x1b[0m", color.to_fg_str(), glyph)
}
