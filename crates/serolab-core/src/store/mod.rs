//! Storage collaborator interface.
//!
//! The core never talks to a backend directly. Everything it reads or writes
//! goes through [`LabStore`]; the crate ships a SQLite implementation in
//! [`crate::db`]. Transport errors surface as [`StoreError::Unavailable`],
//! which callers treat as retryable and distinct from `NotFound`.

use std::future::Future;

use serde_json::Value;
use thiserror::Error;

use crate::models::{Guide, GuideBand, Measurement};

/// Storage collaborator errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Async request/response interface to the report and guide store.
///
/// Reports are exchanged as untyped payloads (see
/// [`crate::models::ReportRecord::from_raw`]); guides are typed.
pub trait LabStore {
    /// Report ids for one patient, in storage order.
    fn list_report_ids(
        &self,
        patient_id: &str,
    ) -> impl Future<Output = StoreResult<Vec<String>>> + Send;

    /// Every report id, in storage order.
    fn list_all_report_ids(&self) -> impl Future<Output = StoreResult<Vec<String>>> + Send;

    /// Raw payload of one report.
    fn get_report(&self, id: &str) -> impl Future<Output = StoreResult<Value>> + Send;

    /// Persist a new report payload and return the id assigned to it.
    fn insert_report(&self, raw: Value) -> impl Future<Output = StoreResult<String>> + Send;

    /// Replace the full measurement set of a report.
    fn replace_measurements(
        &self,
        id: &str,
        measurements: &[Measurement],
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Delete a report by id.
    fn delete_report(&self, id: &str) -> impl Future<Output = StoreResult<()>> + Send;

    /// Every stored guide.
    fn list_guides(&self) -> impl Future<Output = StoreResult<Vec<Guide>>> + Send;

    /// One guide by name.
    fn get_guide(&self, name: &str) -> impl Future<Output = StoreResult<Guide>> + Send;

    /// Write a guide's bands, creating it if needed.
    ///
    /// With `new_name`, the guide stored under `name` is renamed in the same
    /// write; `NotFound` if there is no such guide.
    fn save_guide(
        &self,
        name: &str,
        bands: &[GuideBand],
        new_name: Option<&str>,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Delete a guide by name.
    fn delete_guide(&self, name: &str) -> impl Future<Output = StoreResult<()>> + Send;
}
