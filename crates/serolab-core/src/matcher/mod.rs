//! Reference-range matcher.
//!
//! Pipeline: candidate bands (marker, age, gender) → disambiguation → interval comparison
//!
//! The matcher is pure: the guide set is an explicit snapshot passed in by the
//! caller, usually from [`crate::repository::GuideRepository::snapshot`]. All
//! supplied guides are active at once and their bands are searched together.

mod evaluate;

pub use evaluate::*;

use tracing::warn;

use crate::models::{Classification, Gender, Guide, GuideBand, MatchedBand, RangeStatus};

/// Classify a value for a patient against every band of `guides`.
///
/// Bands match on exact marker name, inclusive age interval, and gender
/// (unset, or equal to the patient's parsed gender). With no match the
/// status is `NoRange`. With several matches the narrowest age span wins,
/// then the lexically smallest guide name, then band order; the result is
/// flagged `ambiguous`. A NaN value is `Unreadable`.
pub fn classify(
    marker: &str,
    value: f64,
    age: u32,
    gender: &str,
    guides: &[Guide],
) -> Classification {
    if value.is_nan() {
        return Classification::unreadable();
    }

    let patient_gender = Gender::parse(gender);
    let candidates: Vec<(&Guide, &GuideBand)> = guides
        .iter()
        .flat_map(|guide| guide.bands.iter().map(move |band| (guide, band)))
        .filter(|(_, band)| {
            band.marker == marker && band.covers_age(age) && band.applies_to(patient_gender)
        })
        .collect();

    // min_by keeps the first of equal elements, so band order breaks final ties.
    let Some(&(guide, band)) = candidates.iter().min_by(|a, b| {
        a.1.age_span()
            .cmp(&b.1.age_span())
            .then_with(|| a.0.name.cmp(&b.0.name))
    }) else {
        return Classification::no_range();
    };

    let ambiguous = candidates.len() > 1;
    if ambiguous {
        warn!(
            marker,
            age,
            candidates = candidates.len(),
            guide = %guide.name,
            "multiple reference bands matched, using the narrowest"
        );
    }

    Classification {
        status: compare(value, band),
        matched: Some(MatchedBand {
            guide_name: guide.name.clone(),
            band: band.clone(),
        }),
        ambiguous,
        candidate_count: candidates.len(),
    }
}

/// Compare a value with a band's inclusive normal interval.
fn compare(value: f64, band: &GuideBand) -> RangeStatus {
    if value < band.normal_min {
        RangeStatus::Low
    } else if value > band.normal_max {
        RangeStatus::High
    } else {
        RangeStatus::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn igg_guide() -> Guide {
        Guide::new(
            "IgG-Guide",
            vec![
                GuideBand::new("IgG", 0, 5, 200.0, 500.0),
                GuideBand::new("IgG", 6, 120, 600.0, 1600.0),
            ],
        )
    }

    #[test]
    fn test_classify_picks_band_by_age() {
        let guides = vec![igg_guide()];

        let young = classify("IgG", 550.0, 4, "Erkek", &guides);
        assert_eq!(young.status, RangeStatus::High);
        assert_eq!(young.matched.as_ref().unwrap().band.max_age, 5);
        assert!(!young.ambiguous);
        assert_eq!(young.candidate_count, 1);

        let older = classify("IgG", 550.0, 10, "Erkek", &guides);
        assert_eq!(older.status, RangeStatus::Low);

        let normal = classify("IgG", 800.0, 10, "Erkek", &guides);
        assert_eq!(normal.status, RangeStatus::Normal);
        assert_eq!(normal.matched.unwrap().guide_name, "IgG-Guide");
    }

    #[test]
    fn test_boundaries_are_normal() {
        let guides = vec![igg_guide()];
        assert_eq!(classify("IgG", 200.0, 3, "", &guides).status, RangeStatus::Normal);
        assert_eq!(classify("IgG", 500.0, 3, "", &guides).status, RangeStatus::Normal);
        assert_eq!(classify("IgG", 199.99, 3, "", &guides).status, RangeStatus::Low);
        assert_eq!(classify("IgG", 500.01, 3, "", &guides).status, RangeStatus::High);
    }

    #[test]
    fn test_no_range_cases() {
        let guides = vec![igg_guide()];
        assert_eq!(classify("IgA", 100.0, 10, "Erkek", &guides).status, RangeStatus::NoRange);
        assert_eq!(classify("igg", 100.0, 10, "Erkek", &guides).status, RangeStatus::NoRange);
        assert_eq!(classify("IgG", 100.0, 121, "Erkek", &guides).status, RangeStatus::NoRange);
        assert_eq!(classify("IgG", 100.0, 10, "Erkek", &[]).status, RangeStatus::NoRange);

        let none = classify("IgA", 100.0, 10, "Erkek", &guides);
        assert!(none.matched.is_none());
        assert_eq!(none.candidate_count, 0);
    }

    #[test]
    fn test_gender_specific_bands() {
        let guide = Guide::new(
            "IgM",
            vec![
                GuideBand::new("IgM", 18, 99, 40.0, 230.0).with_gender(Gender::Male),
                GuideBand::new("IgM", 18, 99, 50.0, 300.0).with_gender(Gender::Female),
            ],
        );
        let guides = vec![guide];

        assert_eq!(classify("IgM", 250.0, 30, "Erkek", &guides).status, RangeStatus::High);
        assert_eq!(classify("IgM", 250.0, 30, "Kadın", &guides).status, RangeStatus::Normal);
        assert_eq!(classify("IgM", 250.0, 30, "", &guides).status, RangeStatus::NoRange);
    }

    #[test]
    fn test_ambiguous_prefers_narrowest_span() {
        let wide = Guide::new("A-Guide", vec![GuideBand::new("IgA", 0, 18, 10.0, 100.0)]);
        let narrow = Guide::new("B-Guide", vec![GuideBand::new("IgA", 5, 9, 30.0, 60.0)]);
        let guides = vec![wide, narrow];

        let result = classify("IgA", 80.0, 7, "Erkek", &guides);
        assert!(result.ambiguous);
        assert_eq!(result.candidate_count, 2);
        assert_eq!(result.status, RangeStatus::High);
        assert_eq!(result.matched.unwrap().guide_name, "B-Guide");
    }

    #[test]
    fn test_ambiguous_tie_breaks_on_guide_name() {
        let zeta = Guide::new("Zeta", vec![GuideBand::new("IgA", 0, 10, 10.0, 50.0)]);
        let alpha = Guide::new("Alpha", vec![GuideBand::new("IgA", 0, 10, 60.0, 90.0)]);
        let guides = vec![zeta, alpha];

        let result = classify("IgA", 55.0, 4, "", &guides);
        assert!(result.ambiguous);
        assert_eq!(result.matched.unwrap().guide_name, "Alpha");
        assert_eq!(result.status, RangeStatus::Low);
    }

    #[test]
    fn test_nan_is_unreadable() {
        let result = classify("IgG", f64::NAN, 10, "", &[igg_guide()]);
        assert_eq!(result.status, RangeStatus::Unreadable);
        assert!(result.matched.is_none());
    }
}
