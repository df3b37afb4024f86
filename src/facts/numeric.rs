use chrono::NaiveDateTime;

use crate::core::ExtractError;

const KIB: f64 = 1024.0;

/// Parses a report number, dropping thousands separators. A blank cell reads as zero.
pub fn to_number(raw: &str) -> Result<f64, ExtractError> {
    let cleaned = raw.replace(',', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Ok(0.0);
    }
    cleaned.parse::<f64>().map_err(|_| ExtractError::InvalidNumber {
        value: raw.to_string(),
    })
}

/// Converts a size such as `12.5M`, `3G`, `500K` or plain bytes to mebibytes,
/// rounded to two significant digits.
pub fn parse_mib(raw: &str) -> Result<f64, ExtractError> {
    let trimmed = raw.trim();
    let Some(suffix) = trimmed.chars().last() else {
        return Err(ExtractError::InvalidNumber {
            value: raw.to_string(),
        });
    };

    let bytes = match suffix.to_ascii_uppercase() {
        'G' => to_number(&trimmed[..trimmed.len() - 1])? * KIB * KIB * KIB,
        'M' => to_number(&trimmed[..trimmed.len() - 1])? * KIB * KIB,
        'K' => to_number(&trimmed[..trimmed.len() - 1])? * KIB,
        c if c.is_ascii_digit() || c == '.' => to_number(trimmed)?,
        _ => {
            return Err(ExtractError::InvalidNumber {
                value: raw.to_string(),
            })
        }
    };

    Ok(round_significant(bytes / (KIB * KIB), 2))
}

pub fn round_significant(value: f64, digits: i32) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return value;
    }
    let magnitude = value.abs().log10().floor() as i32;
    let power = digits - 1 - magnitude;
    if power >= 0 {
        let factor = 10f64.powi(power);
        (value * factor).round() / factor
    } else {
        let factor = 10f64.powi(-power);
        (value / factor).round() * factor
    }
}

/// Reads a "Snap Time" cell with the first matching format.
pub fn parse_snap_time(raw: &str, formats: &[String]) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    formats
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}
