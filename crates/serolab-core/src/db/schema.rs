//! SQLite schema definition.

/// Complete database schema for serolab.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Lab Reports (schemaless payloads, one row per report)
-- ============================================================================

CREATE TABLE IF NOT EXISTS lab_reports (
    id TEXT PRIMARY KEY,                         -- UUID assigned on insert
    patient_id TEXT NOT NULL CHECK (length(patient_id) > 0),
    payload TEXT NOT NULL,                       -- JSON object, camelCase keys
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_reports_patient ON lab_reports(patient_id);

-- ============================================================================
-- Reference Guides
-- ============================================================================

CREATE TABLE IF NOT EXISTS reference_guides (
    name TEXT PRIMARY KEY,
    bands TEXT NOT NULL DEFAULT '[]',            -- JSON array of GuideBand
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        assert!(conn.execute_batch(SCHEMA).is_ok());
    }

    #[test]
    fn test_report_requires_patient_id() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let result = conn.execute(
            "INSERT INTO lab_reports (id, patient_id, payload) VALUES ('r1', '', '{}')",
            [],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "INSERT INTO lab_reports (id, patient_id, payload) VALUES ('r1', 'p1', '{}')",
            [],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_guide_name_unique() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute("INSERT INTO reference_guides (name) VALUES ('Adult')", [])
            .unwrap();
        let result = conn.execute("INSERT INTO reference_guides (name) VALUES ('Adult')", []);
        assert!(result.is_err());
    }
}
