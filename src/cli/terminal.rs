//! Terminal capability detection and styling

use owo_colors::{colors::css, OwoColorize};
use shall::{Confidence, Status};

/// Detects whether colored output should be enabled
pub fn supports_color() -> bool {
    supports_color::on(supports_color::Stream::Stdout).is_some()
}

/// Whether stderr is a terminal, so progress can be drawn on it
pub fn is_interactive() -> bool {
    use std::io::IsTerminal;
    std::io::stderr().is_terminal()
}

/// Terminal width in columns, if stdout is a terminal
pub fn terminal_width() -> Option<u16> {
    terminal_size::terminal_size().map(|(w, _)| w.0)
}

/// Width available for a text column after `used` columns, at least 20
pub fn text_width(used: usize) -> usize {
    terminal_width().map_or(80, usize::from).saturating_sub(used).max(20)
}

/// Shorten `text` to `width` characters, ending in an ellipsis if cut
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut short: String = text.chars().take(width.saturating_sub(1)).collect();
    short.push('…');
    short
}

/// Extension trait for colorizing output
pub trait Colorize {
    /// Color as success (green)
    fn success(&self) -> String;
    /// Color as warning (amber)
    fn warning(&self) -> String;
    /// Color as error (red)
    fn error(&self) -> String;
    /// Dim the text
    fn dim(&self) -> String;
}

impl Colorize for str {
    fn success(&self) -> String {
        if supports_color() {
            self.fg::<css::Green>().to_string()
        } else {
            self.to_string()
        }
    }

    fn warning(&self) -> String {
        if supports_color() {
            self.fg::<css::Orange>().to_string()
        } else {
            self.to_string()
        }
    }

    fn error(&self) -> String {
        if supports_color() {
            self.fg::<css::Red>().to_string()
        } else {
            self.to_string()
        }
    }

    fn dim(&self) -> String {
        if supports_color() {
            self.dimmed().to_string()
        } else {
            self.to_string()
        }
    }
}

impl Colorize for String {
    fn success(&self) -> String {
        self.as_str().success()
    }

    fn warning(&self) -> String {
        self.as_str().warning()
    }

    fn error(&self) -> String {
        self.as_str().error()
    }

    fn dim(&self) -> String {
        self.as_str().dim()
    }
}

/// A confidence bucket, padded to `width` and colored by how much review it
/// needs.
pub fn confidence(confidence: Confidence, width: usize) -> String {
    let text = format!("{:<width$}", confidence.as_str());
    match confidence {
        Confidence::Low => text.error(),
        Confidence::Medium => text.warning(),
        Confidence::High => text.success(),
    }
}

/// A review status, padded to `width` and colored.
pub fn status(status: Status, width: usize) -> String {
    let text = format!("{:<width$}", status.as_str());
    match status {
        Status::AiExtracted => text.dim(),
        Status::HumanValidated | Status::HumanCorrected => text.success(),
        Status::FlaggedForReview => text.warning(),
    }
}
