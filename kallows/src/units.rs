//! Length and angle literals used in presets, e.g. `"3mm"`, `"0.1in"`,
//! `"45deg"`, `"50%"`.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum UnitError {
    #[error("Invalid length '{0}': expected a number with unit mm, cm, in or mil")]
    InvalidLength(String),
    #[error("Invalid angle '{0}': expected a number with unit deg or rad")]
    InvalidAngle(String),
    #[error("Invalid page coordinate '{0}': expected a length or a percentage")]
    InvalidPageCoordinate(String),
}

/// Position on the page, either absolute or relative to the page size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageCoord {
    Millimeters(f64),
    Percent(f64),
}

impl PageCoord {
    pub fn resolve(self, page_extent: f64) -> f64 {
        match self {
            PageCoord::Millimeters(mm) => mm,
            PageCoord::Percent(p) => page_extent * p / 100.0,
        }
    }
}

fn split_number(s: &str) -> Option<(f64, &str)> {
    let s = s.trim();
    let end = s
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')))
        .map_or(s.len(), |(i, _)| i);
    // A trailing exponent marker belongs to the unit, not the number.
    let end = if s[..end].ends_with(['e', 'E']) { end - 1 } else { end };
    let number = s[..end].parse().ok()?;
    Some((number, s[end..].trim()))
}

/// Parse a length into millimetres. Bare numbers are millimetres.
pub fn parse_length(s: &str) -> Result<f64, UnitError> {
    let err = || UnitError::InvalidLength(s.to_string());
    let (value, unit) = split_number(s).ok_or_else(err)?;
    let factor = match unit.to_ascii_lowercase().as_str() {
        "" | "mm" => 1.0,
        "cm" => 10.0,
        "m" => 1000.0,
        "in" | "inch" => 25.4,
        "mil" | "mils" => 0.0254,
        _ => return Err(err()),
    };
    Ok(value * factor)
}

/// Parse an angle into degrees. Bare numbers are degrees.
pub fn parse_angle(s: &str) -> Result<f64, UnitError> {
    let err = || UnitError::InvalidAngle(s.to_string());
    let (value, unit) = split_number(s).ok_or_else(err)?;
    match unit.to_ascii_lowercase().as_str() {
        "" | "deg" | "°" => Ok(value),
        "rad" => Ok(value.to_degrees()),
        _ => Err(err()),
    }
}

pub fn parse_page_coord(s: &str) -> Result<PageCoord, UnitError> {
    if let Some(percent) = s.trim().strip_suffix('%') {
        return percent
            .trim()
            .parse()
            .map(PageCoord::Percent)
            .map_err(|_| UnitError::InvalidPageCoordinate(s.to_string()));
    }
    parse_length(s)
        .map(PageCoord::Millimeters)
        .map_err(|_| UnitError::InvalidPageCoordinate(s.to_string()))
}

/// Text form of a preset value for unit parsing; numbers stay numbers.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lengths() {
        assert_eq!(parse_length("3mm"), Ok(3.0));
        assert_eq!(parse_length(" 2.5 mm "), Ok(2.5));
        assert_eq!(parse_length("1in"), Ok(25.4));
        assert!((parse_length("10mil").unwrap() - 0.254).abs() < 1e-12);
        assert_eq!(parse_length("70"), Ok(70.0));
        assert_eq!(parse_length("-1cm"), Ok(-10.0));
        assert!(parse_length("3 parsecs").is_err());
        assert!(parse_length("mm").is_err());
    }

    #[test]
    fn test_angles() {
        assert_eq!(parse_angle("45deg"), Ok(45.0));
        assert_eq!(parse_angle("0"), Ok(0.0));
        assert!((parse_angle("3.14159265rad").unwrap() - 180.0).abs() < 1e-6);
        assert!(parse_angle("45grad").is_err());
    }

    #[test]
    fn test_page_coordinates() {
        assert_eq!(parse_page_coord("50%"), Ok(PageCoord::Percent(50.0)));
        assert_eq!(parse_page_coord("20mm"), Ok(PageCoord::Millimeters(20.0)));
        assert_eq!(PageCoord::Percent(50.0).resolve(297.0), 148.5);
        assert!(parse_page_coord("half").is_err());
    }
}
