//! Classification results produced by the range matcher.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::GuideBand;

/// Outcome of comparing a value with its reference band.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RangeStatus {
    /// Below `normal_min`
    Low,
    /// Inside `[normal_min, normal_max]`
    Normal,
    /// Above `normal_max`
    High,
    /// No band covers this marker/age/gender
    NoRange,
    /// The measured value is not a number
    Unreadable,
}

/// The band chosen for a classification, with the guide it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchedBand {
    pub guide_name: String,
    pub band: GuideBand,
}

/// Result of classifying one value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Classification {
    pub status: RangeStatus,
    /// `None` for `NoRange` and `Unreadable`
    pub matched: Option<MatchedBand>,
    /// More than one band matched; `matched` is the deterministic pick
    pub ambiguous: bool,
    /// Number of bands that matched before disambiguation
    pub candidate_count: usize,
}

impl Classification {
    /// No applicable band.
    pub fn no_range() -> Self {
        Self::without_band(RangeStatus::NoRange)
    }

    /// Value could not be read as a number.
    pub fn unreadable() -> Self {
        Self::without_band(RangeStatus::Unreadable)
    }

    fn without_band(status: RangeStatus) -> Self {
        Self {
            status,
            matched: None,
            ambiguous: false,
            candidate_count: 0,
        }
    }

    /// Check if the value is outside the normal interval.
    pub fn is_abnormal(&self) -> bool {
        matches!(self.status, RangeStatus::Low | RangeStatus::High)
    }
}

/// Classification of one measurement of a report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarkerEvaluation {
    pub marker: String,
    pub raw_value: String,
    /// Parsed value, `None` if unreadable
    pub value: Option<f64>,
    pub classification: Classification,
}

/// Per-marker classifications of a whole report, in measurement order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReportEvaluation {
    pub report_id: String,
    pub entries: Vec<MarkerEvaluation>,
}

impl ReportEvaluation {
    /// First evaluation recorded for a marker.
    pub fn get(&self, marker: &str) -> Option<&MarkerEvaluation> {
        self.entries.iter().find(|e| e.marker == marker)
    }

    /// Marker name to evaluation. Duplicated markers keep their first entry.
    pub fn by_marker(&self) -> BTreeMap<&str, &MarkerEvaluation> {
        let mut map = BTreeMap::new();
        for entry in &self.entries {
            map.entry(entry.marker.as_str()).or_insert(entry);
        }
        map
    }

    /// Entries outside their normal interval.
    pub fn abnormal(&self) -> impl Iterator<Item = &MarkerEvaluation> {
        self.entries.iter().filter(|e| e.classification.is_abnormal())
    }

    /// Check if any entry was classified against conflicting bands.
    pub fn has_ambiguity(&self) -> bool {
        self.entries.iter().any(|e| e.classification.ambiguous)
    }
}
