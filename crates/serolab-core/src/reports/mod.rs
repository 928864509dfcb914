//! Report retrieval and entry.
//!
//! Pipeline: list ids → concurrent fetch → permissive parse → stable date sort

mod history;

pub use history::*;

use thiserror::Error;
use tracing::{debug, info};

use crate::models::{Measurement, ReportDraft, ReportRecord};
use crate::store::{LabStore, StoreError};

/// Default bound on concurrent per-report fetches.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Report service errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReportError {
    #[error("Report not found: {0}")]
    NotFound(String),

    #[error("Report has no patient id")]
    MissingPatientId,

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl From<StoreError> for ReportError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => ReportError::NotFound(id),
            StoreError::Unavailable(msg) => ReportError::StorageUnavailable(msg),
        }
    }
}

pub type ReportResult<T> = Result<T, ReportError>;

/// Report operations over a storage collaborator.
///
/// Holds no state besides the store reference and its fetch bound; every call
/// returns fresh data.
pub struct ReportService<'a, S> {
    store: &'a S,
    max_in_flight: usize,
}

impl<'a, S: LabStore> ReportService<'a, S> {
    /// Create a service with the default fetch concurrency.
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    /// Set the maximum number of outstanding report fetches (at least 1).
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// A patient's reports, most recent first.
    ///
    /// Failing to list ids is a hard error. Reports that fail to load are
    /// recorded in [`ReportHistory::skipped`] and do not abort the call. A
    /// blank patient id yields an empty history without touching storage.
    pub async fn history_for(&self, patient_id: &str) -> ReportResult<ReportHistory> {
        if patient_id.trim().is_empty() {
            debug!("blank patient id, returning empty history");
            return Ok(ReportHistory::default());
        }
        let ids = self.store.list_report_ids(patient_id).await?;
        debug!(patient_id, count = ids.len(), "loading report history");
        Ok(collect(self.store, ids, self.max_in_flight).await)
    }

    /// Every stored report, ordered like [`Self::history_for`].
    pub async fn all_reports(&self) -> ReportResult<ReportHistory> {
        let ids = self.store.list_all_report_ids().await?;
        Ok(collect(self.store, ids, self.max_in_flight).await)
    }

    /// One report by id.
    pub async fn get_report(&self, id: &str) -> ReportResult<ReportRecord> {
        let raw = self.store.get_report(id).await?;
        let mut record = ReportRecord::from_raw(&raw);
        if record.id.is_empty() {
            record.id = id.to_string();
        }
        Ok(record)
    }

    /// Persist a new report and return it with its assigned id.
    pub async fn submit_report(&self, draft: ReportDraft) -> ReportResult<ReportRecord> {
        if draft.patient_id.trim().is_empty() {
            return Err(ReportError::MissingPatientId);
        }
        let mut record = draft.into_record();
        record.id = self.store.insert_report(record.to_raw()).await?;
        info!(
            id = %record.id,
            measurements = record.measurements.len(),
            "report submitted"
        );
        Ok(record)
    }

    /// Replace the full measurement set of a report.
    pub async fn replace_measurements(
        &self,
        id: &str,
        measurements: Vec<Measurement>,
    ) -> ReportResult<()> {
        self.store.replace_measurements(id, &measurements).await?;
        info!(id, measurements = measurements.len(), "report measurements replaced");
        Ok(())
    }

    /// Delete a report by id.
    pub async fn delete_report(&self, id: &str) -> ReportResult<()> {
        self.store.delete_report(id).await?;
        info!(id, "report deleted");
        Ok(())
    }
}
