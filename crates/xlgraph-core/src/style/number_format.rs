//! Number format types

use std::fmt;

/// Number format attached to a cell
///
/// Only the decimal part of the format matters to evaluation: numeric results are rounded to
/// [`NumberFormat::decimal_places`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum NumberFormat {
    /// General format (default)
    #[default]
    General,

    /// Custom format string
    Custom(String),
}

impl NumberFormat {
    /// Interpret a format string as reported by a workbook
    ///
    /// An empty string or `General` (any case) is the general format.
    pub fn parse(format: &str) -> Self {
        let trimmed = format.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("general") {
            NumberFormat::General
        } else {
            NumberFormat::Custom(trimmed.to_string())
        }
    }

    /// Get the format string
    pub fn format_string(&self) -> &str {
        match self {
            NumberFormat::General => "General",
            NumberFormat::Custom(s) => s,
        }
    }

    /// Decimal places implied by the format, `None` when results are not rounded
    ///
    /// Counts the digit placeholders (`0`, `#`, `?`) directly after the first `.`.
    pub fn decimal_places(&self) -> Option<u32> {
        let format = self.format_string();
        let (_, fraction) = format.split_once('.')?;
        let places = fraction
            .chars()
            .take_while(|c| matches!(c, '0' | '#' | '?'))
            .count();
        Some(places as u32)
    }
}

impl fmt::Display for NumberFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.format_string())
    }
}

impl From<&str> for NumberFormat {
    fn from(format: &str) -> Self {
        NumberFormat::parse(format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(NumberFormat::parse("General"), NumberFormat::General);
        assert_eq!(NumberFormat::parse(""), NumberFormat::General);
        assert_eq!(
            NumberFormat::parse("0.000"),
            NumberFormat::Custom("0.000".into())
        );
    }

    #[test]
    fn test_decimal_places() {
        assert_eq!(NumberFormat::General.decimal_places(), None);
        assert_eq!(NumberFormat::parse("0").decimal_places(), None);
        assert_eq!(NumberFormat::parse("0.00").decimal_places(), Some(2));
        assert_eq!(NumberFormat::parse("#,##0.000").decimal_places(), Some(3));
        assert_eq!(NumberFormat::parse("0.0%").decimal_places(), Some(1));
        assert_eq!(NumberFormat::parse("#,##0.00;(#,##0.00)").decimal_places(), Some(2));
    }
}
