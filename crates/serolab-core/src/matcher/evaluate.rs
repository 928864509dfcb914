//! Whole-report evaluation.

use crate::models::{Classification, Guide, MarkerEvaluation, ReportEvaluation, ReportRecord};

use super::classify;

/// Classify every measurement of a report independently.
///
/// The report's own age and gender snapshot is used for every marker. There is
/// no cross-marker logic. Values that do not parse as numbers are reported as
/// `Unreadable` instead of being dropped.
pub fn evaluate_report(report: &ReportRecord, guides: &[Guide]) -> ReportEvaluation {
    let entries = report
        .measurements
        .iter()
        .map(|measurement| {
            let value = measurement.numeric_value();
            let classification = match value {
                Some(v) => classify(&measurement.marker, v, report.age, &report.gender, guides),
                None => Classification::unreadable(),
            };
            MarkerEvaluation {
                marker: measurement.marker.clone(),
                raw_value: measurement.raw_value.clone(),
                value,
                classification,
            }
        })
        .collect();

    ReportEvaluation {
        report_id: report.id.clone(),
        entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GuideBand, Measurement, RangeStatus};

    fn guides() -> Vec<Guide> {
        vec![Guide::new(
            "Pediatric",
            vec![
                GuideBand::new("IgG", 0, 5, 200.0, 500.0),
                GuideBand::new("IgG", 6, 120, 600.0, 1600.0),
                GuideBand::new("IgA", 0, 120, 20.0, 300.0),
            ],
        )]
    }

    fn report(measurements: Vec<Measurement>) -> ReportRecord {
        ReportRecord {
            id: "r-1".into(),
            patient_id: "p-1".into(),
            age: 4,
            gender: "Erkek".into(),
            measurements,
            ..ReportRecord::default()
        }
    }

    #[test]
    fn test_evaluate_report_per_marker() {
        let report = report(vec![
            Measurement::new("IgG", "550"),
            Measurement::new("IgA", "10,5"),
            Measurement::new("IgM", "90"),
        ]);

        let evaluation = evaluate_report(&report, &guides());
        assert_eq!(evaluation.report_id, "r-1");
        assert_eq!(evaluation.entries.len(), 3);
        assert_eq!(evaluation.get("IgG").unwrap().classification.status, RangeStatus::High);
        assert_eq!(evaluation.get("IgA").unwrap().value, Some(10.5));
        assert_eq!(evaluation.get("IgA").unwrap().classification.status, RangeStatus::Low);
        assert_eq!(evaluation.get("IgM").unwrap().classification.status, RangeStatus::NoRange);
        assert_eq!(evaluation.abnormal().count(), 2);
        assert!(!evaluation.has_ambiguity());
    }

    #[test]
    fn test_unreadable_values() {
        let report = report(vec![Measurement::new("IgG", ""), Measurement::new("IgA", "n/a")]);

        let evaluation = evaluate_report(&report, &guides());
        for entry in &evaluation.entries {
            assert_eq!(entry.value, None);
            assert_eq!(entry.classification.status, RangeStatus::Unreadable);
        }
    }

    #[test]
    fn test_duplicate_markers_are_kept_in_order() {
        let report = report(vec![Measurement::new("IgG", "300"), Measurement::new("IgG", "700")]);

        let evaluation = evaluate_report(&report, &guides());
        assert_eq!(evaluation.entries.len(), 2);
        assert_eq!(evaluation.entries[0].classification.status, RangeStatus::Normal);
        assert_eq!(evaluation.entries[1].classification.status, RangeStatus::High);

        let map = evaluation.by_marker();
        assert_eq!(map.len(), 1);
        assert_eq!(map["IgG"].raw_value, "300");
    }
}
