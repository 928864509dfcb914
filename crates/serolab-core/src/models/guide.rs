//! Reference-range guide models.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Gender scope of a band, stored with the labels used by the entry form.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Gender {
    #[serde(rename = "Erkek")]
    Male,
    #[serde(rename = "Kadın")]
    Female,
}

impl Gender {
    /// Parse a gender label leniently (trimmed, case-insensitive).
    ///
    /// Accepts the Turkish labels ("Erkek", "Kadın"/"Kadin") and the English
    /// ones ("male"/"m", "female"/"f"). Anything else is `None`.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "erkek" | "male" | "m" => Some(Self::Male),
            "kadın" | "kadin" | "female" | "f" => Some(Self::Female),
            _ => None,
        }
    }

    /// Canonical storage label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Male => "Erkek",
            Self::Female => "Kadın",
        }
    }
}

/// One reference-range rule scoped by marker, age interval and gender.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuideBand {
    /// Serum marker this band applies to (exact, case-sensitive)
    pub marker: String,
    /// Youngest covered age in years (inclusive)
    pub min_age: u32,
    /// Oldest covered age in years (inclusive)
    pub max_age: u32,
    /// Gender filter; `None` applies to both
    #[serde(default)]
    pub gender: Option<Gender>,
    /// Lower bound of the normal interval (inclusive)
    pub normal_min: f64,
    /// Upper bound of the normal interval (inclusive)
    pub normal_max: f64,
}

impl GuideBand {
    /// Create a band that applies to both genders.
    pub fn new(
        marker: impl Into<String>,
        min_age: u32,
        max_age: u32,
        normal_min: f64,
        normal_max: f64,
    ) -> Self {
        Self {
            marker: marker.into(),
            min_age,
            max_age,
            gender: None,
            normal_min,
            normal_max,
        }
    }

    /// Restrict the band to one gender.
    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }

    /// Check if the age falls inside `[min_age, max_age]`.
    pub fn covers_age(&self, age: u32) -> bool {
        self.min_age <= age && age <= self.max_age
    }

    /// Check if the band applies to a patient of the given gender.
    pub fn applies_to(&self, gender: Option<Gender>) -> bool {
        match self.gender {
            None => true,
            Some(scope) => gender == Some(scope),
        }
    }

    /// Width of the age interval in years.
    pub fn age_span(&self) -> u32 {
        self.max_age.saturating_sub(self.min_age)
    }

    /// Check if both bands could match the same `(marker, age, gender)`.
    ///
    /// Gender scopes intersect when they are equal or either is unset.
    pub fn overlaps(&self, other: &GuideBand) -> bool {
        let genders_intersect = match (self.gender, other.gender) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        self.marker == other.marker
            && genders_intersect
            && self.min_age <= other.max_age
            && other.min_age <= self.max_age
    }

    /// Describe what is wrong with the band, if anything.
    pub fn problem(&self) -> Option<&'static str> {
        if self.marker.trim().is_empty() {
            Some("marker name is blank")
        } else if self.min_age > self.max_age {
            Some("min_age is greater than max_age")
        } else if !self.normal_min.is_finite() || !self.normal_max.is_finite() {
            Some("normal interval bounds must be finite numbers")
        } else if self.normal_min > self.normal_max {
            Some("normal_min is greater than normal_max")
        } else {
            None
        }
    }
}

/// Two bands of one guide that violate the no-overlap invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandOverlap {
    pub marker: String,
    /// Index of the earlier band
    pub first: usize,
    /// Index of the later band
    pub second: usize,
}

/// Find the first pair of overlapping bands, in band order.
pub fn find_overlap(bands: &[GuideBand]) -> Option<BandOverlap> {
    bands.iter().enumerate().find_map(|(i, a)| {
        bands[i + 1..]
            .iter()
            .position(|b| a.overlaps(b))
            .map(|offset| BandOverlap {
                marker: a.marker.clone(),
                first: i,
                second: i + 1 + offset,
            })
    })
}

/// A named reference-range table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Guide {
    /// Unique name, also the lookup key
    pub name: String,
    /// Bands in entry order
    pub bands: Vec<GuideBand>,
}

impl Guide {
    /// Create a guide.
    pub fn new(name: impl Into<String>, bands: Vec<GuideBand>) -> Self {
        Self {
            name: name.into(),
            bands,
        }
    }

    /// Distinct marker names covered by this guide, sorted.
    pub fn markers(&self) -> Vec<String> {
        let mut markers: Vec<String> = self.bands.iter().map(|b| b.marker.clone()).collect();
        markers.sort();
        markers.dedup();
        markers
    }

    /// Serialize the bands to canonical JSON for fingerprinting.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.bands)
    }

    /// SHA-256 of the canonical band JSON, hex-encoded.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let payload = self.to_canonical_json()?;
        let mut hasher = Sha256::new();
        hasher.update(payload.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }

    /// Build the list-view summary.
    pub fn summary(&self) -> Result<GuideSummary, serde_json::Error> {
        Ok(GuideSummary {
            name: self.name.clone(),
            band_count: self.bands.len(),
            markers: self.markers(),
            fingerprint: self.fingerprint()?,
        })
    }
}

/// List-view summary of a guide.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuideSummary {
    pub name: String,
    pub band_count: usize,
    pub markers: Vec<String>,
    /// Changes whenever the band set changes
    pub fingerprint: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_parse() {
        assert_eq!(Gender::parse("Erkek"), Some(Gender::Male));
        assert_eq!(Gender::parse(" erkek "), Some(Gender::Male));
        assert_eq!(Gender::parse("Kadın"), Some(Gender::Female));
        assert_eq!(Gender::parse("KADIN"), Some(Gender::Female));
        assert_eq!(Gender::parse("female"), Some(Gender::Female));
        assert_eq!(Gender::parse(""), None);
        assert_eq!(Gender::parse("unknown"), None);
    }

    #[test]
    fn test_gender_serde_labels() {
        let json = serde_json::to_string(&Gender::Female).unwrap();
        assert_eq!(json, "\"Kadın\"");
        let parsed: Gender = serde_json::from_str("\"Erkek\"").unwrap();
        assert_eq!(parsed, Gender::Male);
    }

    #[test]
    fn test_band_scope() {
        let band = GuideBand::new("IgG", 6, 120, 600.0, 1600.0).with_gender(Gender::Male);
        assert!(band.covers_age(6));
        assert!(band.covers_age(120));
        assert!(!band.covers_age(5));
        assert!(band.applies_to(Some(Gender::Male)));
        assert!(!band.applies_to(Some(Gender::Female)));
        assert!(!band.applies_to(None));

        let any = GuideBand::new("IgG", 0, 5, 200.0, 500.0);
        assert!(any.applies_to(None));
        assert!(any.applies_to(Some(Gender::Female)));
        assert_eq!(any.age_span(), 5);
    }

    #[test]
    fn test_overlap_rules() {
        let young = GuideBand::new("IgG", 0, 5, 200.0, 500.0);
        let older = GuideBand::new("IgG", 6, 120, 600.0, 1600.0);
        let touching = GuideBand::new("IgG", 5, 10, 600.0, 1600.0);
        let other_marker = GuideBand::new("IgA", 0, 5, 10.0, 50.0);

        assert!(!young.overlaps(&older));
        assert!(young.overlaps(&touching));
        assert!(!young.overlaps(&other_marker));

        let male = GuideBand::new("IgM", 0, 18, 40.0, 200.0).with_gender(Gender::Male);
        let female = GuideBand::new("IgM", 0, 18, 50.0, 220.0).with_gender(Gender::Female);
        let any = GuideBand::new("IgM", 10, 30, 45.0, 210.0);
        assert!(!male.overlaps(&female));
        assert!(male.overlaps(&any));
        assert!(female.overlaps(&any));
    }

    #[test]
    fn test_find_overlap_reports_indexes() {
        let bands = vec![
            GuideBand::new("IgG", 0, 5, 200.0, 500.0),
            GuideBand::new("IgA", 0, 5, 10.0, 50.0),
            GuideBand::new("IgG", 6, 120, 600.0, 1600.0),
            GuideBand::new("IgA", 3, 10, 20.0, 90.0),
        ];
        assert_eq!(
            find_overlap(&bands),
            Some(BandOverlap {
                marker: "IgA".into(),
                first: 1,
                second: 3,
            })
        );
        assert_eq!(find_overlap(&bands[..3]), None);
        assert_eq!(find_overlap(&[]), None);
    }

    #[test]
    fn test_band_problems() {
        assert_eq!(GuideBand::new("IgG", 0, 5, 200.0, 500.0).problem(), None);
        assert!(GuideBand::new(" ", 0, 5, 200.0, 500.0).problem().is_some());
        assert!(GuideBand::new("IgG", 6, 5, 200.0, 500.0).problem().is_some());
        assert!(GuideBand::new("IgG", 0, 5, 500.0, 200.0).problem().is_some());
        assert!(GuideBand::new("IgG", 0, 5, f64::NAN, 200.0).problem().is_some());
    }

    #[test]
    fn test_summary_and_fingerprint() {
        let guide = Guide::new(
            "IgG-Guide",
            vec![
                GuideBand::new("IgG", 0, 5, 200.0, 500.0),
                GuideBand::new("IgA", 0, 5, 10.0, 50.0),
                GuideBand::new("IgG", 6, 120, 600.0, 1600.0),
            ],
        );
        let summary = guide.summary().unwrap();
        assert_eq!(summary.band_count, 3);
        assert_eq!(summary.markers, vec!["IgA".to_string(), "IgG".to_string()]);
        assert_eq!(summary.fingerprint.len(), 64);

        let mut changed = guide.clone();
        changed.bands[0].normal_max = 510.0;
        assert_ne!(changed.fingerprint().unwrap(), summary.fingerprint);
        assert_eq!(guide.fingerprint().unwrap(), summary.fingerprint);
    }
}
