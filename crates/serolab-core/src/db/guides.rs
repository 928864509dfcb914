//! Reference guide database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{Guide, GuideBand};

impl Database {
    /// Insert a new guide. Fails on a duplicate name.
    pub fn insert_guide(&self, guide: &Guide) -> DbResult<()> {
        let bands_json = serde_json::to_string(&guide.bands)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reference_guides (name, bands) VALUES (?1, ?2)",
                params![guide.name, bands_json],
            )?;
            Ok(())
        })
    }

    /// Get a guide by name.
    pub fn get_guide(&self, name: &str) -> DbResult<Option<Guide>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT name, bands FROM reference_guides WHERE name = ?",
                [name],
                |row| {
                    Ok(GuideRow {
                        name: row.get(0)?,
                        bands: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(DbError::from)
        })?
        .map(Guide::try_from)
        .transpose()
    }

    /// List all guides, ordered by name.
    pub fn list_guides(&self) -> DbResult<Vec<Guide>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT name, bands FROM reference_guides ORDER BY name")?;
            let rows = stmt.query_map([], |row| {
                Ok(GuideRow {
                    name: row.get(0)?,
                    bands: row.get(1)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
        })?;

        rows.into_iter().map(Guide::try_from).collect()
    }

    /// Write a guide's bands, inserting it if it does not exist.
    ///
    /// With `new_name`, the existing guide is renamed and its bands replaced
    /// in one transaction. Renaming a missing guide is `NotFound`; renaming
    /// onto an existing name is a constraint violation and changes nothing.
    pub fn save_guide(
        &self,
        name: &str,
        bands: &[GuideBand],
        new_name: Option<&str>,
    ) -> DbResult<()> {
        let bands_json = serde_json::to_string(bands)?;

        match new_name.filter(|target| *target != name) {
            Some(target) => self.with_transaction(|tx| {
                let taken: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM reference_guides WHERE name = ?)",
                    [target],
                    |row| row.get(0),
                )?;
                if taken {
                    return Err(DbError::Constraint(format!("guide name already in use: {target}")));
                }

                let rows_affected = tx.execute(
                    r#"
                    UPDATE reference_guides SET
                        name = ?2,
                        bands = ?3,
                        updated_at = datetime('now')
                    WHERE name = ?1
                    "#,
                    params![name, target, bands_json],
                )?;
                if rows_affected == 0 {
                    return Err(DbError::NotFound(name.to_string()));
                }
                Ok(())
            }),
            None => self.with_conn(|conn| {
                conn.execute(
                    r#"
                    INSERT INTO reference_guides (name, bands) VALUES (?1, ?2)
                    ON CONFLICT(name) DO UPDATE SET
                        bands = excluded.bands,
                        updated_at = datetime('now')
                    "#,
                    params![name, bands_json],
                )?;
                Ok(())
            }),
        }
    }

    /// Delete a guide.
    pub fn delete_guide(&self, name: &str) -> DbResult<bool> {
        let rows_affected = self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM reference_guides WHERE name = ?", [name])?)
        })?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct GuideRow {
    name: String,
    bands: String,
}

impl TryFrom<GuideRow> for Guide {
    type Error = DbError;

    fn try_from(row: GuideRow) -> Result<Self, Self::Error> {
        let bands: Vec<GuideBand> = serde_json::from_str(&row.bands)?;
        Ok(Guide {
            name: row.name,
            bands,
        })
    }
}
