//! Report history aggregation.

use std::cmp::Reverse;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::ReportRecord;
use crate::store::{LabStore, StoreError};

/// A report id that could not be resolved into a record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkippedReport {
    pub id: String,
    pub reason: String,
}

/// A patient's reports, most recent first, plus the ids that failed to load.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReportHistory {
    pub reports: Vec<ReportRecord>,
    pub skipped: Vec<SkippedReport>,
}

impl ReportHistory {
    /// Check if every listed id was resolved.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Fetch every id with at most `max_in_flight` requests outstanding, then sort.
///
/// Results are collected in id order regardless of completion order, and the
/// sort runs only once every fetch has finished or been recorded as skipped.
pub(crate) async fn collect<S: LabStore>(
    store: &S,
    ids: Vec<String>,
    max_in_flight: usize,
) -> ReportHistory {
    let outcomes: Vec<(String, Result<serde_json::Value, StoreError>)> = stream::iter(ids)
        .map(|id| async move {
            let result = store.get_report(&id).await;
            (id, result)
        })
        .buffered(max_in_flight.max(1))
        .collect()
        .await;

    let mut history = ReportHistory::default();
    for (id, outcome) in outcomes {
        match outcome {
            Ok(raw) => {
                let mut record = ReportRecord::from_raw(&raw);
                if record.id.is_empty() {
                    record.id = id;
                }
                history.reports.push(record);
            }
            Err(e) => {
                warn!(id = %id, error = %e, "skipping report that failed to load");
                history.skipped.push(SkippedReport {
                    id,
                    reason: e.to_string(),
                });
            }
        }
    }

    sort_most_recent_first(&mut history.reports);
    history
}

/// Sort reports by parsed report date, most recent first.
///
/// The sort is stable: equal dates keep their relative order, and reports
/// whose date is missing or does not parse go after every dated report in
/// their original relative order.
pub fn sort_most_recent_first(reports: &mut [ReportRecord]) {
    reports.sort_by_cached_key(|report| {
        let date = report.parsed_report_date();
        (date.is_none(), Reverse(date))
    });
}
