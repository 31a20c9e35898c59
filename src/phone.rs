//! Phone number parsing and normalization
//!
//! Thin adapter over the `phonenumber` crate. Everything downstream works with
//! a [`NumberDescriptor`], never with the parser's own types.

use phonenumber::{Mode, PhoneNumber, Type};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidNumber {
    #[error("Invalid number: empty input")]
    Empty,

    #[error("Invalid number: {0}")]
    Unparseable(String),

    #[error("Invalid number: {0}")]
    NotValid(String),
}

/// Line type reported by the numbering plan metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineType {
    FixedLine,
    Mobile,
    FixedLineOrMobile,
    TollFree,
    PremiumRate,
    SharedCost,
    Voip,
    PersonalNumber,
    Pager,
    Uan,
    Voicemail,
    Unknown,
}

impl LineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineType::FixedLine => "FIXED_LINE",
            LineType::Mobile => "MOBILE",
            LineType::FixedLineOrMobile => "FIXED_LINE_OR_MOBILE",
            LineType::TollFree => "TOLL_FREE",
            LineType::PremiumRate => "PREMIUM_RATE",
            LineType::SharedCost => "SHARED_COST",
            LineType::Voip => "VOIP",
            LineType::PersonalNumber => "PERSONAL_NUMBER",
            LineType::Pager => "PAGER",
            LineType::Uan => "UAN",
            LineType::Voicemail => "VOICEMAIL",
            LineType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for LineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Type> for LineType {
    fn from(value: Type) -> Self {
        match value {
            Type::FixedLine => LineType::FixedLine,
            Type::Mobile => LineType::Mobile,
            Type::FixedLineOrMobile => LineType::FixedLineOrMobile,
            Type::TollFree => LineType::TollFree,
            Type::PremiumRate => LineType::PremiumRate,
            Type::SharedCost => LineType::SharedCost,
            Type::Voip => LineType::Voip,
            Type::PersonalNumber => LineType::PersonalNumber,
            Type::Pager => LineType::Pager,
            Type::Uan => LineType::Uan,
            Type::Voicemail => LineType::Voicemail,
            _ => LineType::Unknown,
        }
    }
}

/// Standard renderings of a number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberFormats {
    pub e164: String,
    pub international: String,
    pub national: String,
    pub rfc3966: String,
}

impl NumberFormats {
    /// Formats with their display labels, in presentation order
    pub fn labeled(&self) -> [(&'static str, &str); 4] {
        [
            ("E164", self.e164.as_str()),
            ("International", self.international.as_str()),
            ("National", self.national.as_str()),
            ("RFC3966", self.rfc3966.as_str()),
        ]
    }
}

/// A parsed, validated phone number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberDescriptor {
    /// Input exactly as the caller supplied it (trimmed)
    pub raw: String,
    pub country_code: u16,
    pub national_number: u64,
    /// ISO region code, when the numbering plan maps to a single region
    pub region: Option<String>,
    pub line_type: LineType,
    pub formats: NumberFormats,
}

impl NumberDescriptor {
    /// Build a descriptor directly from its parts.
    ///
    /// Used where the numbering-plan metadata is not needed, e.g. fake numbers
    /// in resolver tests.
    pub fn from_parts(country_code: u16, national_number: u64) -> Self {
        let e164 = format!("+{}{}", country_code, national_number);
        Self {
            raw: e164.clone(),
            country_code,
            national_number,
            region: None,
            line_type: LineType::Unknown,
            formats: NumberFormats {
                international: e164.clone(),
                national: national_number.to_string(),
                rfc3966: format!("tel:{}", e164),
                e164,
            },
        }
    }

    /// Normalized cache key: country code followed by national number
    pub fn key(&self) -> String {
        format!("{}{}", self.country_code, self.national_number)
    }

    pub fn is_voip(&self) -> bool {
        self.line_type == LineType::Voip
    }
}

/// Parse and validate a number in international format
pub fn parse_number(input: &str) -> Result<NumberDescriptor, InvalidNumber> {
    let raw = input.trim();
    if raw.is_empty() {
        return Err(InvalidNumber::Empty);
    }

    let parsed = phonenumber::parse(None, raw)
        .map_err(|_| InvalidNumber::Unparseable(raw.to_string()))?;

    if !phonenumber::is_valid(&parsed) {
        return Err(InvalidNumber::NotValid(raw.to_string()));
    }

    Ok(describe(raw, &parsed))
}

fn describe(raw: &str, parsed: &PhoneNumber) -> NumberDescriptor {
    let line_type = parsed
        .number_type(&phonenumber::metadata::DATABASE)
        .into();

    NumberDescriptor {
        raw: raw.to_string(),
        country_code: parsed.code().value(),
        national_number: parsed.national().value(),
        region: parsed.country().id().map(|id| {
            let code: &str = id.as_ref();
            code.to_string()
        }),
        line_type,
        formats: NumberFormats {
            e164: parsed.format().mode(Mode::E164).to_string(),
            international: parsed.format().mode(Mode::International).to_string(),
            national: parsed.format().mode(Mode::National).to_string(),
            rfc3966: parsed.format().mode(Mode::Rfc3966).to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_us_number() {
        let descriptor = parse_number("+14155552671").unwrap();
        assert_eq!(descriptor.country_code, 1);
        assert_eq!(descriptor.national_number, 4155552671);
        assert_eq!(descriptor.key(), "14155552671");
        assert_eq!(descriptor.formats.e164, "+14155552671");
    }

    #[test]
    fn test_region_is_iso_code() {
        assert_eq!(parse_number("+447400123456").unwrap().region.as_deref(), Some("GB"));
        assert_eq!(parse_number("+33612345678").unwrap().region.as_deref(), Some("FR"));
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let descriptor = parse_number("  +447400123456 \n").unwrap();
        assert_eq!(descriptor.raw, "+447400123456");
        assert_eq!(descriptor.key(), "447400123456");
    }

    #[test]
    fn test_reject_empty_and_garbage() {
        assert_eq!(parse_number("   "), Err(InvalidNumber::Empty));
        assert!(parse_number("invalid").is_err());
        assert!(parse_number("not-a-number").is_err());
    }

    #[test]
    fn test_error_messages_carry_category() {
        assert_eq!(InvalidNumber::Empty.to_string(), "Invalid number: empty input");
        let err = parse_number("invalid").unwrap_err();
        assert_eq!(err.to_string(), "Invalid number: invalid");
    }

    #[test]
    fn test_from_parts_key() {
        let descriptor = NumberDescriptor::from_parts(44, 7400123456);
        assert_eq!(descriptor.key(), "447400123456");
        assert_eq!(descriptor.line_type, LineType::Unknown);
        assert!(!descriptor.is_voip());
    }

    #[test]
    fn test_labeled_formats_order() {
        let descriptor = parse_number("+14155552671").unwrap();
        let labeled = descriptor.formats.labeled();

        let labels: Vec<&str> = labeled.iter().map(|(label, _)| *label).collect();
        assert_eq!(labels, vec!["E164", "International", "National", "RFC3966"]);
        assert_eq!(labeled[0].1, "+14155552671");
        assert!(labeled[3].1.starts_with("tel:+1"));
    }

    #[test]
    fn test_line_type_labels() {
        assert_eq!(LineType::PremiumRate.to_string(), "PREMIUM_RATE");
        assert_eq!(
            serde_json::to_string(&LineType::FixedLineOrMobile).unwrap(),
            "\"FIXED_LINE_OR_MOBILE\""
        );
    }
}
