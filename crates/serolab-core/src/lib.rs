//! Serolab Core Library
//!
//! Local-first lab report history and serum reference-range evaluation.
//!
//! # Architecture
//!
//! ```text
//!   Report entry ──► ReportService ──► LabStore (SQLite)
//!                                          │
//!        ┌─────────────────────────────────┼──────────────────────┐
//!        │                                 │                      │
//!        ▼                                 ▼                      ▼
//!   history_for                     GuideRepository          get_report
//!   (concurrent fetch,              (validated CRUD,              │
//!    date-sorted)                    no overlapping bands)        │
//!        │                                 │ snapshot             │
//!        └───────────────┬─────────────────┘                      │
//!                        ▼                                        │
//!                 Range matcher ◄─────────────────────────────────┘
//!           Low / Normal / High / NoRange
//! ```
//!
//! # Core Principle
//!
//! **A missing reference range is a result, not an error.** Values with no
//! applicable band are reported as `NoRange` and never hidden.
//!
//! # Modules
//!
//! - [`db`]: SQLite storage implementing [`store::LabStore`]
//! - [`models`]: Domain types (ReportRecord, Guide, GuideBand, Classification)
//! - [`repository`]: Guide CRUD with band validation
//! - [`reports`]: Report retrieval, entry and history aggregation
//! - [`matcher`]: Reference-range classification
//! - [`config`] and [`logging`]: Runtime setup

pub mod config;
pub mod db;
pub mod logging;
pub mod matcher;
pub mod models;
pub mod reports;
pub mod repository;
pub mod store;

// Re-export commonly used types
pub use config::CoreConfig;
pub use db::Database;
pub use matcher::{classify, evaluate_report};
pub use models::{
    Classification, Gender, Guide, GuideBand, GuideSummary, Measurement, RangeStatus,
    ReportDraft, ReportEvaluation, ReportRecord,
};
pub use reports::{ReportError, ReportHistory, ReportService};
pub use repository::{GuideError, GuideRepository};
pub use store::{LabStore, StoreError};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::Arc;

use chrono::NaiveDate;
use futures::executor::block_on;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum SerolabError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    #[error("Bands {first} and {second} overlap for marker {marker}")]
    OverlappingBands {
        marker: String,
        first: u32,
        second: u32,
    },

    #[error("Band {index} is invalid: {reason}")]
    InvalidBand { index: u32, reason: String },

    #[error("Guide name must not be blank")]
    EmptyName,

    #[error("Report has no patient id")]
    MissingPatientId,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<db::DbError> for SerolabError {
    fn from(e: db::DbError) -> Self {
        SerolabError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for SerolabError {
    fn from(e: serde_json::Error) -> Self {
        SerolabError::SerializationError(e.to_string())
    }
}

impl From<GuideError> for SerolabError {
    fn from(e: GuideError) -> Self {
        match e {
            GuideError::NotFound(name) => SerolabError::NotFound(name),
            GuideError::DuplicateName(name) => SerolabError::DuplicateName(name),
            GuideError::OverlappingBands {
                marker,
                first,
                second,
            } => SerolabError::OverlappingBands {
                marker,
                first: saturating_u32(first),
                second: saturating_u32(second),
            },
            GuideError::InvalidBand { index, reason } => SerolabError::InvalidBand {
                index: saturating_u32(index),
                reason,
            },
            GuideError::EmptyName => SerolabError::EmptyName,
            GuideError::Serialization(msg) => SerolabError::SerializationError(msg),
            GuideError::StorageUnavailable(msg) => SerolabError::StorageUnavailable(msg),
        }
    }
}

impl From<ReportError> for SerolabError {
    fn from(e: ReportError) -> Self {
        match e {
            ReportError::NotFound(id) => SerolabError::NotFound(id),
            ReportError::MissingPatientId => SerolabError::MissingPatientId,
            ReportError::StorageUnavailable(msg) => SerolabError::StorageUnavailable(msg),
        }
    }
}

impl From<anyhow::Error> for SerolabError {
    fn from(e: anyhow::Error) -> Self {
        SerolabError::ConfigError(format!("{e:#}"))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<LabCore>, SerolabError> {
    let db = Database::open(&path)?;
    Ok(LabCore::new(db, CoreConfig::default()))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<LabCore>, SerolabError> {
    let db = Database::open_in_memory()?;
    Ok(LabCore::new(db, CoreConfig::default()))
}

/// Open a database described by a JSON [`CoreConfig`].
#[uniffi::export]
pub fn open_with_config(config_json: String) -> Result<Arc<LabCore>, SerolabError> {
    let config = CoreConfig::from_json_str(&config_json)?;
    let db = match &config.database_path {
        Some(path) => Database::open(path)?,
        None => Database::open_in_memory()?,
    };
    Ok(LabCore::new(db, config))
}

/// Install the log subscriber. Returns false if one was already installed.
#[uniffi::export]
pub fn init_logging(filter: String) -> bool {
    logging::init(&filter)
}

/// Markers offered by the report entry form, in display order.
#[uniffi::export]
pub fn standard_serum_panel() -> Vec<String> {
    models::STANDARD_SERUM_PANEL
        .iter()
        .map(|marker| marker.to_string())
        .collect()
}

/// Completed years between two dates (`YYYY-MM-DD` or `DD/MM/YYYY`).
#[uniffi::export]
pub fn age_from_birth_date(birth_date: String, on: String) -> Result<u32, SerolabError> {
    let birth = parse_date_arg(&birth_date)?;
    let on = parse_date_arg(&on)?;
    models::age_in_years(birth, on).ok_or_else(|| {
        SerolabError::InvalidInput(format!("birth date {birth} is after {on}"))
    })
}

fn saturating_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn parse_date_arg(text: &str) -> Result<NaiveDate, SerolabError> {
    models::parse_birth_date(text)
        .ok_or_else(|| SerolabError::InvalidInput(format!("unrecognized date: {text:?}")))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe core handle for FFI.
///
/// The database serialises its own access, so calls from several threads
/// are safe. Async operations are driven to completion on the calling thread.
#[derive(uniffi::Object)]
pub struct LabCore {
    db: Arc<Database>,
    config: CoreConfig,
}

impl LabCore {
    fn new(db: Database, config: CoreConfig) -> Arc<Self> {
        Arc::new(Self {
            db: Arc::new(db),
            config,
        })
    }

    fn guides(&self) -> GuideRepository<'_, Database> {
        GuideRepository::new(&*self.db)
    }

    fn reports(&self) -> ReportService<'_, Database> {
        ReportService::new(&*self.db).with_max_in_flight(self.config.max_in_flight_fetches)
    }
}

#[uniffi::export]
impl LabCore {
    // =========================================================================
    // Guide Operations
    // =========================================================================

    /// Create a reference guide.
    pub fn create_guide(
        &self,
        name: String,
        bands: Vec<FfiGuideBand>,
    ) -> Result<FfiGuide, SerolabError> {
        let bands = bands.into_iter().map(GuideBand::from).collect();
        let guide = block_on(self.guides().create(&name, bands))?;
        Ok(guide.into())
    }

    /// Get a guide by name.
    pub fn get_guide(&self, name: String) -> Result<FfiGuide, SerolabError> {
        Ok(block_on(self.guides().get(&name))?.into())
    }

    /// Summaries of every guide, sorted by name.
    pub fn list_guides(&self) -> Result<Vec<FfiGuideSummary>, SerolabError> {
        let summaries = block_on(self.guides().list())?;
        Ok(summaries.into_iter().map(|s| s.into()).collect())
    }

    /// Replace a guide's bands, optionally renaming it.
    pub fn update_guide(
        &self,
        name: String,
        bands: Vec<FfiGuideBand>,
        new_name: Option<String>,
    ) -> Result<FfiGuide, SerolabError> {
        let bands = bands.into_iter().map(GuideBand::from).collect();
        let guide = block_on(self.guides().update(&name, bands, new_name.as_deref()))?;
        Ok(guide.into())
    }

    /// Delete a guide by name.
    pub fn delete_guide(&self, name: String) -> Result<(), SerolabError> {
        Ok(block_on(self.guides().delete(&name))?)
    }

    // =========================================================================
    // Matcher Operations
    // =========================================================================

    /// Classify one value against the current guide set.
    pub fn classify_marker(
        &self,
        marker: String,
        value: f64,
        age: u32,
        gender: String,
    ) -> Result<FfiClassification, SerolabError> {
        let guides = block_on(self.guides().snapshot())?;
        Ok(classify(&marker, value, age, &gender, &guides).into())
    }

    /// Classify every measurement of a stored report.
    pub fn evaluate_report(&self, report_id: String) -> Result<FfiReportEvaluation, SerolabError> {
        let report = block_on(self.reports().get_report(&report_id))?;
        let guides = block_on(self.guides().snapshot())?;
        Ok(evaluate_report(&report, &guides).into())
    }

    /// Classify the measurements of an unsaved entry form. Nothing is stored.
    pub fn evaluate_draft(&self, draft: FfiReportDraft) -> Result<FfiReportEvaluation, SerolabError> {
        let record = ReportDraft::try_from(draft)?.into_record();
        let guides = block_on(self.guides().snapshot())?;
        Ok(evaluate_report(&record, &guides).into())
    }

    // =========================================================================
    // Report Operations
    // =========================================================================

    /// A patient's reports, most recent first.
    pub fn history_for(&self, patient_id: String) -> Result<FfiHistory, SerolabError> {
        Ok(block_on(self.reports().history_for(&patient_id))?.into())
    }

    /// Every stored report, most recent first.
    pub fn all_reports(&self) -> Result<FfiHistory, SerolabError> {
        Ok(block_on(self.reports().all_reports())?.into())
    }

    /// Get a report by id.
    pub fn get_report(&self, id: String) -> Result<FfiReport, SerolabError> {
        Ok(block_on(self.reports().get_report(&id))?.into())
    }

    /// Save a new report and return it with its assigned id.
    pub fn submit_report(&self, draft: FfiReportDraft) -> Result<FfiReport, SerolabError> {
        let draft = ReportDraft::try_from(draft)?;
        Ok(block_on(self.reports().submit_report(draft))?.into())
    }

    /// Replace the measurements of a report.
    pub fn replace_measurements(
        &self,
        id: String,
        measurements: Vec<FfiMeasurement>,
    ) -> Result<(), SerolabError> {
        let measurements = measurements.into_iter().map(Measurement::from).collect();
        Ok(block_on(self.reports().replace_measurements(&id, measurements))?)
    }

    /// Delete a report by id.
    pub fn delete_report(&self, id: String) -> Result<(), SerolabError> {
        Ok(block_on(self.reports().delete_report(&id))?)
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe gender scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiGender {
    Male,
    Female,
}

impl From<Gender> for FfiGender {
    fn from(gender: Gender) -> Self {
        match gender {
            Gender::Male => FfiGender::Male,
            Gender::Female => FfiGender::Female,
        }
    }
}

impl From<FfiGender> for Gender {
    fn from(gender: FfiGender) -> Self {
        match gender {
            FfiGender::Male => Gender::Male,
            FfiGender::Female => Gender::Female,
        }
    }
}

/// FFI-safe reference band.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiGuideBand {
    pub marker: String,
    pub min_age: u32,
    pub max_age: u32,
    pub gender: Option<FfiGender>,
    pub normal_min: f64,
    pub normal_max: f64,
}

impl From<GuideBand> for FfiGuideBand {
    fn from(band: GuideBand) -> Self {
        Self {
            marker: band.marker,
            min_age: band.min_age,
            max_age: band.max_age,
            gender: band.gender.map(FfiGender::from),
            normal_min: band.normal_min,
            normal_max: band.normal_max,
        }
    }
}

impl From<FfiGuideBand> for GuideBand {
    fn from(band: FfiGuideBand) -> Self {
        GuideBand {
            marker: band.marker,
            min_age: band.min_age,
            max_age: band.max_age,
            gender: band.gender.map(Gender::from),
            normal_min: band.normal_min,
            normal_max: band.normal_max,
        }
    }
}

/// FFI-safe guide.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiGuide {
    pub name: String,
    pub bands: Vec<FfiGuideBand>,
}

impl From<Guide> for FfiGuide {
    fn from(guide: Guide) -> Self {
        Self {
            name: guide.name,
            bands: guide.bands.into_iter().map(|b| b.into()).collect(),
        }
    }
}

/// FFI-safe guide summary.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiGuideSummary {
    pub name: String,
    pub band_count: u32,
    pub markers: Vec<String>,
    pub fingerprint: String,
}

impl From<GuideSummary> for FfiGuideSummary {
    fn from(summary: GuideSummary) -> Self {
        Self {
            name: summary.name,
            band_count: saturating_u32(summary.band_count),
            markers: summary.markers,
            fingerprint: summary.fingerprint,
        }
    }
}

/// FFI-safe measurement.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiMeasurement {
    pub marker: String,
    pub raw_value: String,
}

impl From<Measurement> for FfiMeasurement {
    fn from(m: Measurement) -> Self {
        Self {
            marker: m.marker,
            raw_value: m.raw_value,
        }
    }
}

impl From<FfiMeasurement> for Measurement {
    fn from(m: FfiMeasurement) -> Self {
        Measurement::new(m.marker, m.raw_value)
    }
}

/// FFI-safe report.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiReport {
    pub id: String,
    pub patient_id: String,
    pub full_name: String,
    /// `YYYY-MM-DD`
    pub birth_date: Option<String>,
    pub age: u32,
    pub gender: String,
    pub patient_type: String,
    pub sample_type: String,
    pub report_date: String,
    pub measurements: Vec<FfiMeasurement>,
}

impl From<ReportRecord> for FfiReport {
    fn from(report: ReportRecord) -> Self {
        Self {
            id: report.id,
            patient_id: report.patient_id,
            full_name: report.full_name,
            birth_date: report.birth_date.map(|d| d.format("%Y-%m-%d").to_string()),
            age: report.age,
            gender: report.gender,
            patient_type: report.patient_type,
            sample_type: report.sample_type,
            report_date: report.report_date,
            measurements: report.measurements.into_iter().map(|m| m.into()).collect(),
        }
    }
}

/// FFI-safe report entry form.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiReportDraft {
    pub patient_id: String,
    pub full_name: String,
    /// `YYYY-MM-DD` or `DD/MM/YYYY`
    pub birth_date: Option<String>,
    /// Derived from `birth_date` when absent
    pub age: Option<u32>,
    pub gender: String,
    pub patient_type: String,
    pub sample_type: String,
    pub report_date: String,
    pub measurements: Vec<FfiMeasurement>,
}

impl TryFrom<FfiReportDraft> for ReportDraft {
    type Error = SerolabError;

    fn try_from(draft: FfiReportDraft) -> Result<Self, Self::Error> {
        let birth_date = match draft.birth_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(text) => Some(parse_date_arg(text)?),
        };
        Ok(ReportDraft {
            patient_id: draft.patient_id,
            full_name: draft.full_name,
            birth_date,
            age: draft.age,
            gender: draft.gender,
            patient_type: draft.patient_type,
            sample_type: draft.sample_type,
            report_date: draft.report_date,
            measurements: draft.measurements.into_iter().map(|m| m.into()).collect(),
        })
    }
}

/// FFI-safe range status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiRangeStatus {
    Low,
    Normal,
    High,
    NoRange,
    Unreadable,
}

impl From<RangeStatus> for FfiRangeStatus {
    fn from(status: RangeStatus) -> Self {
        match status {
            RangeStatus::Low => FfiRangeStatus::Low,
            RangeStatus::Normal => FfiRangeStatus::Normal,
            RangeStatus::High => FfiRangeStatus::High,
            RangeStatus::NoRange => FfiRangeStatus::NoRange,
            RangeStatus::Unreadable => FfiRangeStatus::Unreadable,
        }
    }
}

/// FFI-safe classification.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiClassification {
    pub status: FfiRangeStatus,
    pub guide_name: Option<String>,
    pub band: Option<FfiGuideBand>,
    pub ambiguous: bool,
    pub candidate_count: u32,
}

impl From<Classification> for FfiClassification {
    fn from(c: Classification) -> Self {
        let (guide_name, band) = match c.matched {
            Some(m) => (Some(m.guide_name), Some(m.band.into())),
            None => (None, None),
        };
        Self {
            status: c.status.into(),
            guide_name,
            band,
            ambiguous: c.ambiguous,
            candidate_count: saturating_u32(c.candidate_count),
        }
    }
}

/// FFI-safe marker evaluation.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMarkerEvaluation {
    pub marker: String,
    pub raw_value: String,
    pub value: Option<f64>,
    pub classification: FfiClassification,
}

impl From<models::MarkerEvaluation> for FfiMarkerEvaluation {
    fn from(e: models::MarkerEvaluation) -> Self {
        Self {
            marker: e.marker,
            raw_value: e.raw_value,
            value: e.value,
            classification: e.classification.into(),
        }
    }
}

/// FFI-safe report evaluation.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiReportEvaluation {
    pub report_id: String,
    pub entries: Vec<FfiMarkerEvaluation>,
}

impl From<ReportEvaluation> for FfiReportEvaluation {
    fn from(e: ReportEvaluation) -> Self {
        Self {
            report_id: e.report_id,
            entries: e.entries.into_iter().map(|entry| entry.into()).collect(),
        }
    }
}

/// FFI-safe skipped report.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSkippedReport {
    pub id: String,
    pub reason: String,
}

/// FFI-safe report history.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiHistory {
    pub reports: Vec<FfiReport>,
    pub skipped: Vec<FfiSkippedReport>,
}

impl From<ReportHistory> for FfiHistory {
    fn from(history: ReportHistory) -> Self {
        Self {
            reports: history.reports.into_iter().map(|r| r.into()).collect(),
            skipped: history
                .skipped
                .into_iter()
                .map(|s| FfiSkippedReport {
                    id: s.id,
                    reason: s.reason,
                })
                .collect(),
        }
    }
}
