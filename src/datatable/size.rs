//! Column size encoding
//!
//! Widths travel as short tagged strings and are resolved to pixels at render
//! time against the current container width:
//! - `Px:<n>`       fixed pixels
//! - `Rem:<n>`      relative units (16 px each)
//! - `Fraction:<f>` fraction of the container width
//! - `Fit`          fit-content (calculated width when known)
//!
//! Absent or malformed values resolve to [`DEFAULT_COLUMN_WIDTH`].

use std::fmt;

/// Width used when nothing better is known
pub const DEFAULT_COLUMN_WIDTH: f64 = 150.0;

/// Pixels per relative unit
pub const REM_PX: f64 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnSize {
    Px(f64),
    Rem(f64),
    Fraction(f64),
    Fit,
}

impl ColumnSize {
    /// Parse a tagged size string, `None` if it is not a recognised encoding
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("fit") {
            return Some(ColumnSize::Fit);
        }

        let (tag, number) = trimmed.split_once(':')?;
        let number: f64 = number.trim().parse().ok()?;
        if !number.is_finite() || number < 0.0 {
            return None;
        }

        match tag.trim() {
            "Px" => Some(ColumnSize::Px(number)),
            "Rem" => Some(ColumnSize::Rem(number)),
            "Fraction" if number <= 1.0 => Some(ColumnSize::Fraction(number)),
            _ => None,
        }
    }

    /// Resolve to absolute pixels
    ///
    /// `content_width` is the calculated width for fit-content columns; when it
    /// is unknown the default width is used.
    pub fn to_pixels(&self, container_width: f64, content_width: Option<f64>) -> f64 {
        match self {
            ColumnSize::Px(px) => *px,
            ColumnSize::Rem(rem) => rem * REM_PX,
            ColumnSize::Fraction(f) if container_width > 0.0 => f * container_width,
            ColumnSize::Fraction(_) => DEFAULT_COLUMN_WIDTH,
            ColumnSize::Fit => content_width.unwrap_or(DEFAULT_COLUMN_WIDTH),
        }
    }
}

impl fmt::Display for ColumnSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnSize::Px(px) => write!(f, "Px:{}", px),
            ColumnSize::Rem(rem) => write!(f, "Rem:{}", rem),
            ColumnSize::Fraction(frac) => write!(f, "Fraction:{}", frac),
            ColumnSize::Fit => f.write_str("Fit"),
        }
    }
}

/// Parse an optional size string straight to pixels, falling back to the default
pub fn parse_width(value: Option<&str>, container_width: f64) -> f64 {
    value
        .and_then(ColumnSize::parse)
        .map(|size| size.to_pixels(container_width, None))
        .unwrap_or(DEFAULT_COLUMN_WIDTH)
}
