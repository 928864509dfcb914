//! [`LabStore`] implementation backed by the local SQLite database.

use serde_json::Value;
use tracing::debug;

use super::{Database, DbError};
use crate::models::{Guide, GuideBand, Measurement};
use crate::store::{LabStore, StoreError, StoreResult};

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => StoreError::NotFound(what),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

fn found<T>(value: Option<T>, what: &str) -> StoreResult<T> {
    value.ok_or_else(|| StoreError::NotFound(what.to_string()))
}

fn affected(changed: bool, what: &str) -> StoreResult<()> {
    if changed {
        Ok(())
    } else {
        Err(StoreError::NotFound(what.to_string()))
    }
}

impl LabStore for Database {
    async fn list_report_ids(&self, patient_id: &str) -> StoreResult<Vec<String>> {
        debug!(patient_id, "listing report ids");
        Ok(self.list_report_ids_for_patient(patient_id)?)
    }

    async fn list_all_report_ids(&self) -> StoreResult<Vec<String>> {
        Ok(self.list_report_ids()?)
    }

    async fn get_report(&self, id: &str) -> StoreResult<Value> {
        debug!(id, "fetching report");
        found(Database::get_report(self, id)?, id)
    }

    async fn insert_report(&self, raw: Value) -> StoreResult<String> {
        Ok(Database::insert_report(self, &raw)?)
    }

    async fn replace_measurements(&self, id: &str, measurements: &[Measurement]) -> StoreResult<()> {
        affected(self.replace_report_measurements(id, measurements)?, id)
    }

    async fn delete_report(&self, id: &str) -> StoreResult<()> {
        affected(Database::delete_report(self, id)?, id)
    }

    async fn list_guides(&self) -> StoreResult<Vec<Guide>> {
        Ok(Database::list_guides(self)?)
    }

    async fn get_guide(&self, name: &str) -> StoreResult<Guide> {
        found(Database::get_guide(self, name)?, name)
    }

    async fn save_guide(
        &self,
        name: &str,
        bands: &[GuideBand],
        new_name: Option<&str>,
    ) -> StoreResult<()> {
        Ok(Database::save_guide(self, name, bands, new_name)?)
    }

    async fn delete_guide(&self, name: &str) -> StoreResult<()> {
        affected(Database::delete_guide(self, name)?, name)
    }
}
