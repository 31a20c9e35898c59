//! Single-number scan: metadata, owner guess, risk tier and lookup links

use crate::owner::{OwnerProfile, OwnerResolver};
use crate::phone::{LineType, NumberDescriptor, NumberFormats};
use crate::risk::{self, RiskInputs, RiskLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Carrier label used when no carrier name is known for the number
pub const UNKNOWN_CARRIER: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geo {
    /// ISO region code or "Unknown"
    pub country: String,
}

/// Everything learned about one number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub number: String,
    pub geo: Geo,
    pub carrier: String,
    pub line_type: LineType,
    pub formats: NumberFormats,
    pub voip: bool,
    pub risk: RiskLevel,
    pub owner: OwnerProfile,
    pub reputation: BTreeMap<String, String>,
    pub osint: BTreeMap<String, String>,
}

/// Scan a validated number. Owner lookup runs only when a resolver is given.
pub fn scan_number(number: &NumberDescriptor, resolver: Option<&OwnerResolver>) -> ScanReport {
    let owner = match resolver {
        Some(resolver) => resolver.lookup_owner_name(number).as_ref().clone(),
        None => OwnerProfile::disabled(),
    };

    let carrier = UNKNOWN_CARRIER.to_string();
    let voip = number.is_voip();
    let risk = risk::score(&RiskInputs {
        is_voip: voip,
        carrier: &carrier,
        line_type: number.line_type,
        owner_profile: Some(&owner),
    });

    ScanReport {
        number: number.raw.clone(),
        geo: Geo {
            country: number.region.clone().unwrap_or_else(|| "Unknown".to_string()),
        },
        carrier,
        line_type: number.line_type,
        formats: number.formats.clone(),
        voip,
        risk,
        owner,
        reputation: reputation_links(number),
        osint: osint_links(number),
    }
}

/// Community spam-report pages for the number
pub fn reputation_links(number: &NumberDescriptor) -> BTreeMap<String, String> {
    let key = number.key();
    BTreeMap::from([
        ("800notes".to_string(), format!("https://800notes.com/Phone.aspx/{}", key)),
        ("WhoCalledMe".to_string(), format!("https://whocalledme.com/Phone-Number.aspx/{}", key)),
        ("SpamCalls".to_string(), format!("https://spamcalls.net/en/number/{}", key)),
    ])
}

/// Manual follow-up searches for the number
pub fn osint_links(number: &NumberDescriptor) -> BTreeMap<String, String> {
    let key = number.key();
    let cc = number.country_code;
    let national = number.national_number;
    BTreeMap::from([
        ("Truecaller".to_string(), format!("https://www.truecaller.com/search/{}/{}", cc, national)),
        ("Google".to_string(), format!("https://www.google.com/search?q={}", key)),
        ("GoogleExact".to_string(), format!("https://www.google.com/search?q=%22{}%22", key)),
        ("Bing".to_string(), format!("https://www.bing.com/search?q=%22{}%22", key)),
        ("Facebook".to_string(), format!("https://www.facebook.com/search/top/?q={}", key)),
        ("LinkedIn".to_string(), format!("https://www.linkedin.com/search/results/all/?keywords={}", key)),
        ("WhatsApp".to_string(), format!("https://wa.me/{}", key)),
        ("Telegram".to_string(), format!("https://t.me/{}", key)),
    ])
}

impl ScanReport {
    /// Plain-text rendering for terminal output
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Number      : {}\n", self.number));
        out.push_str(&format!("E.164       : {}\n", self.formats.e164));
        out.push_str(&format!("International: {}\n", self.formats.international));
        out.push_str(&format!("National    : {}\n", self.formats.national));
        out.push_str(&format!("Country     : {}\n", self.geo.country));
        out.push_str(&format!("Carrier     : {}\n", self.carrier));
        out.push_str(&format!("Line type   : {}\n", self.line_type));
        out.push_str(&format!("VoIP        : {}\n", if self.voip { "yes" } else { "no" }));
        out.push_str(&format!("Risk        : {}\n", self.risk));
        out.push_str(&format!("Owner       : {} ({} confidence)\n", self.owner.name, self.owner.confidence));
        if !self.owner.candidates.is_empty() {
            out.push_str(&format!("Candidates  : {}\n", self.owner.candidates.join(", ")));
        }
        out.push_str(&format!("Owner notes : {}\n", self.owner.notes));

        out.push_str("Reputation:\n");
        for (name, link) in &self.reputation {
            out.push_str(&format!("  {:<12} {}\n", name, link));
        }
        out.push_str("OSINT:\n");
        for (name, link) in &self.osint {
            out.push_str(&format!("  {:<12} {}\n", name, link));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::Confidence;

    #[test]
    fn test_scan_without_owner_lookup() {
        let number = NumberDescriptor::from_parts(1, 4155552671);
        let report = scan_number(&number, None);

        assert_eq!(report.number, "+14155552671");
        assert_eq!(report.owner.name, "Lookup disabled");
        assert_eq!(report.owner.confidence, Confidence::Low);
        assert_eq!(report.carrier, UNKNOWN_CARRIER);
        // unknown carrier 25 + unknown line type 10 + unresolved owner 10
        assert_eq!(report.risk, RiskLevel::Medium);
        assert_eq!(report.geo.country, "Unknown");
    }

    #[test]
    fn test_links_use_normalized_key() {
        let number = NumberDescriptor::from_parts(44, 7400123456);
        let osint = osint_links(&number);
        assert_eq!(osint["Truecaller"], "https://www.truecaller.com/search/44/7400123456");
        assert_eq!(osint["WhatsApp"], "https://wa.me/447400123456");
        assert_eq!(osint.len(), 8);

        let reputation = reputation_links(&number);
        assert_eq!(reputation["800notes"], "https://800notes.com/Phone.aspx/447400123456");
        assert_eq!(reputation.len(), 3);
    }

    #[test]
    fn test_render_contains_key_fields() {
        let number = NumberDescriptor::from_parts(1, 4155552671);
        let text = scan_number(&number, None).render();
        assert!(text.contains("Number      : +14155552671"));
        assert!(text.contains("Owner       : Lookup disabled (Low confidence)"));
        assert!(text.contains("Risk        : Medium"));
        assert!(text.contains("https://t.me/14155552671"));
    }
}
