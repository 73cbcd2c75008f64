use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ceiling substituted for unlimited data, in GB.
pub const DATA_UNLIMITED: f64 = 1000.0;
/// Ceiling substituted for unlimited local call minutes.
pub const VOICE_UNLIMITED: f64 = 3000.0;
/// Ceiling substituted for unlimited SMS.
pub const SMS_UNLIMITED: f64 = 5000.0;

const UNLIMITED: &str = "unlimited";
const FREE_NUMBERS: &str = "2 free numbers";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Price,
    Data,
    Voice,
    Sms,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Price,
        Dimension::Data,
        Dimension::Voice,
        Dimension::Sms,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Price => "price",
            Dimension::Data => "data",
            Dimension::Voice => "voice",
            Dimension::Sms => "sms",
        }
    }

    /// Value substituted when the field reads as unbounded. Price has none.
    pub fn sentinel(&self) -> Option<f64> {
        match self {
            Dimension::Price => None,
            Dimension::Data => Some(DATA_UNLIMITED),
            Dimension::Voice => Some(VOICE_UNLIMITED),
            Dimension::Sms => Some(SMS_UNLIMITED),
        }
    }

    fn unbounded_keywords(&self) -> &'static [&'static str] {
        match self {
            Dimension::Price => &[],
            Dimension::Data | Dimension::Sms => &[UNLIMITED],
            Dimension::Voice => &[UNLIMITED, FREE_NUMBERS],
        }
    }

    fn accepts_fraction(&self) -> bool {
        matches!(self, Dimension::Price | Dimension::Data)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "price" | "cost" => Ok(Dimension::Price),
            "data" => Ok(Dimension::Data),
            "voice" | "calls" => Ok(Dimension::Voice),
            "sms" => Ok(Dimension::Sms),
            other => Err(format!("unknown dimension: {other}")),
        }
    }
}

/// Whether `raw` carries the dimension's unbounded keyword set.
///
/// Matching is a case-insensitive substring test, so "Unlimited (fair use)"
/// still counts.
pub fn is_unbounded(dimension: Dimension, raw: &str) -> bool {
    let keywords = dimension.unbounded_keywords();
    if keywords.is_empty() {
        return false;
    }
    let lowered = raw.to_lowercase();
    keywords.iter().any(|keyword| lowered.contains(keyword))
}

/// Converts a raw plan field into a comparable quantity.
///
/// Total: anything that cannot be read as a number becomes `0.0`, and an
/// absent field is treated the same way.
pub fn normalize(dimension: Dimension, raw: Option<&str>) -> f64 {
    let Some(raw) = raw else {
        return 0.0;
    };
    if let Some(sentinel) = dimension.sentinel() {
        if is_unbounded(dimension, raw) {
            return sentinel;
        }
    }
    leading_number(raw, dimension.accepts_fraction()).unwrap_or(0.0)
}

/// Sanitizes a numeric cost: negative or non-finite values become `0.0`.
pub fn normalize_cost(cost: f64) -> f64 {
    if cost.is_finite() && cost >= 0.0 {
        cost
    } else {
        0.0
    }
}

/// Parses the unsigned number at the start of `raw`, after leading whitespace.
///
/// With `fraction` set, a decimal part is consumed as well (`"1.5GB"` -> 1.5,
/// `".5"` -> 0.5); otherwise parsing stops at the first non-digit. Digit runs
/// too long to stay finite read as unparseable.
pub fn leading_number(raw: &str, fraction: bool) -> Option<f64> {
    let trimmed = raw.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    let integer_digits = end;

    if fraction && bytes.get(end) == Some(&b'.') {
        let decimals = bytes[end + 1..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if decimals > 0 {
            end += 1 + decimals;
        }
    }

    if end == 0 {
        return None;
    }
    let parsed = if integer_digits == 0 {
        format!("0{}", &trimmed[..end]).parse::<f64>()
    } else {
        trimmed[..end].parse::<f64>()
    };
    parsed.ok().filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_maps_to_sentinel_in_any_case() {
        assert_eq!(normalize(Dimension::Data, Some("UNLIMITED")), DATA_UNLIMITED);
        assert_eq!(
            normalize(Dimension::Data, Some("50GB then Unlimited at 1Mbps")),
            DATA_UNLIMITED
        );
        assert_eq!(normalize(Dimension::Voice, Some("unlimited")), VOICE_UNLIMITED);
        assert_eq!(normalize(Dimension::Sms, Some("Unlimited SMS")), SMS_UNLIMITED);
    }

    #[test]
    fn free_numbers_phrase_only_counts_for_voice() {
        assert_eq!(
            normalize(Dimension::Voice, Some("2 Free Numbers")),
            VOICE_UNLIMITED
        );
        assert!(is_unbounded(Dimension::Voice, "Calls to 2 free numbers"));
        assert!(!is_unbounded(Dimension::Sms, "2 free numbers"));
        assert_eq!(normalize(Dimension::Sms, Some("2 free numbers")), 2.0);
    }

    #[test]
    fn data_keeps_decimals_and_counts_drop_them() {
        assert_eq!(normalize(Dimension::Data, Some("1.5 GB")), 1.5);
        assert_eq!(normalize(Dimension::Data, Some(" .5GB")), 0.5);
        assert_eq!(normalize(Dimension::Data, Some("40GB")), 40.0);
        assert_eq!(normalize(Dimension::Voice, Some("100.9 mins")), 100.0);
        assert_eq!(normalize(Dimension::Sms, Some("250")), 250.0);
    }

    #[test]
    fn unparseable_text_degrades_to_zero() {
        assert_eq!(normalize(Dimension::Data, Some("GB 5")), 0.0);
        assert_eq!(normalize(Dimension::Data, Some("")), 0.0);
        assert_eq!(normalize(Dimension::Voice, Some("-5")), 0.0);
        assert_eq!(normalize(Dimension::Sms, Some("n/a")), 0.0);
        assert_eq!(normalize(Dimension::Sms, None), 0.0);
        assert_eq!(normalize(Dimension::Data, Some(".")), 0.0);
    }

    #[test]
    fn overflowing_digit_runs_degrade_to_zero() {
        let huge = format!("1{}GB", "0".repeat(400));
        assert_eq!(normalize(Dimension::Data, Some(&huge)), 0.0);
        assert_eq!(normalize(Dimension::Sms, Some(&huge)), 0.0);
        assert_eq!(leading_number(&format!("1{}", "0".repeat(20)), false), Some(1e20));
    }

    #[test]
    fn price_has_no_sentinel() {
        assert_eq!(normalize(Dimension::Price, Some("unlimited")), 0.0);
        assert_eq!(normalize(Dimension::Price, Some("499.5")), 499.5);
        assert_eq!(normalize_cost(f64::NAN), 0.0);
        assert_eq!(normalize_cost(-10.0), 0.0);
        assert_eq!(normalize_cost(299.0), 299.0);
    }

    #[test]
    fn dimension_parses_aliases() {
        assert_eq!("Cost".parse::<Dimension>().unwrap(), Dimension::Price);
        assert_eq!("calls".parse::<Dimension>().unwrap(), Dimension::Voice);
        assert!("minutes".parse::<Dimension>().is_err());
    }
}
