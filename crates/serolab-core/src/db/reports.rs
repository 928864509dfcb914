//! Lab report database operations.

use rusqlite::{params, OptionalExtension};
use serde_json::Value;

use super::{Database, DbError, DbResult};
use crate::models::{measurements_to_raw, Measurement, ReportRecord};

impl Database {
    /// Insert a new report payload, assigning it a fresh id.
    ///
    /// The payload must be a JSON object carrying a patient id
    /// (`tcNumber` or `patientId`). Any `id` it carries is overwritten.
    pub fn insert_report(&self, raw: &Value) -> DbResult<String> {
        let mut payload = raw
            .as_object()
            .cloned()
            .ok_or_else(|| DbError::Constraint("report payload must be a JSON object".into()))?;

        let patient_id = ReportRecord::from_raw(raw).patient_id;
        if patient_id.is_empty() {
            return Err(DbError::Constraint("report has no patient id".into()));
        }

        let id = uuid::Uuid::new_v4().to_string();
        payload.insert("id".into(), Value::String(id.clone()));
        let payload_json = serde_json::to_string(&payload)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO lab_reports (id, patient_id, payload) VALUES (?1, ?2, ?3)",
                params![id, patient_id, payload_json],
            )?;
            Ok(())
        })?;
        Ok(id)
    }

    /// Get a report payload by id.
    pub fn get_report(&self, id: &str) -> DbResult<Option<Value>> {
        let payload: Option<String> = self.with_conn(|conn| {
            conn.query_row("SELECT payload FROM lab_reports WHERE id = ?", [id], |row| {
                row.get(0)
            })
            .optional()
            .map_err(Into::into)
        })?;

        payload
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(Into::into)
    }

    /// List report ids for a patient, in insertion order.
    pub fn list_report_ids_for_patient(&self, patient_id: &str) -> DbResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id FROM lab_reports WHERE patient_id = ? ORDER BY rowid")?;
            let rows = stmt.query_map([patient_id], |row| row.get(0))?;
            rows.collect::<Result<Vec<String>, _>>().map_err(Into::into)
        })
    }

    /// List every report id, in insertion order.
    pub fn list_report_ids(&self) -> DbResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM lab_reports ORDER BY rowid")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<Result<Vec<String>, _>>().map_err(Into::into)
        })
    }

    /// Replace the measurement set of a report.
    pub fn replace_report_measurements(
        &self,
        id: &str,
        measurements: &[Measurement],
    ) -> DbResult<bool> {
        self.with_transaction(|tx| {
            let payload: Option<String> = tx
                .query_row("SELECT payload FROM lab_reports WHERE id = ?", [id], |row| {
                    row.get(0)
                })
                .optional()?;
            let Some(payload) = payload else {
                return Ok(false);
            };

            let mut document: Value = serde_json::from_str(&payload)?;
            let object = document
                .as_object_mut()
                .ok_or_else(|| DbError::Constraint(format!("stored report {id} is not an object")))?;
            object.remove("measurements");
            object.insert("serumTypes".into(), measurements_to_raw(measurements));

            tx.execute(
                "UPDATE lab_reports SET payload = ?2, updated_at = datetime('now') WHERE id = ?1",
                params![id, serde_json::to_string(&document)?],
            )?;
            Ok(true)
        })
    }

    /// Delete a report.
    pub fn delete_report(&self, id: &str) -> DbResult<bool> {
        let rows_affected =
            self.with_conn(|conn| Ok(conn.execute("DELETE FROM lab_reports WHERE id = ?", [id])?))?;
        Ok(rows_affected > 0)
    }
}
