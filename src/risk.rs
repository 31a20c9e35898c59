//! Additive risk scoring over number metadata and the owner guess

use crate::owner::{Confidence, OwnerProfile};
use crate::phone::LineType;
use serde::{Deserialize, Serialize};
use std::fmt;

const VOIP_POINTS: u32 = 45;
const UNKNOWN_CARRIER_POINTS: u32 = 25;
const HIGH_RISK_LINE_POINTS: u32 = 25;
const UNKNOWN_LINE_POINTS: u32 = 10;
const UNRESOLVED_OWNER_POINTS: u32 = 10;
const WEAK_OWNER_POINTS: u32 = 5;

const HIGH_THRESHOLD: u32 = 70;
const MEDIUM_THRESHOLD: u32 = 35;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
        }
    }
}

/// Signals folded into the score
#[derive(Debug, Clone, Copy)]
pub struct RiskInputs<'a> {
    pub is_voip: bool,
    pub carrier: &'a str,
    pub line_type: LineType,
    pub owner_profile: Option<&'a OwnerProfile>,
}

/// Raw additive score before classification
pub fn risk_points(inputs: &RiskInputs<'_>) -> u32 {
    let mut points = 0;

    if inputs.is_voip {
        points += VOIP_POINTS;
    }
    if inputs.carrier == "Unknown" {
        points += UNKNOWN_CARRIER_POINTS;
    }

    match inputs.line_type {
        LineType::PremiumRate | LineType::Pager => points += HIGH_RISK_LINE_POINTS,
        LineType::Unknown => points += UNKNOWN_LINE_POINTS,
        _ => {}
    }

    if let Some(owner) = inputs.owner_profile {
        if !owner.is_resolved() {
            points += UNRESOLVED_OWNER_POINTS;
        } else if owner.confidence == Confidence::Low {
            points += WEAK_OWNER_POINTS;
        }
    }

    points
}

pub fn classify(points: u32) -> RiskLevel {
    if points >= HIGH_THRESHOLD {
        RiskLevel::High
    } else if points >= MEDIUM_THRESHOLD {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Risk tier for a set of signals
pub fn score(inputs: &RiskInputs<'_>) -> RiskLevel {
    classify(risk_points(inputs))
}
