//! Database migrations.
//!
//! Migrations are ordered SQL batches, applied once and recorded in the
//! `_migrations` table by name.

use rusqlite::{params, Connection};

use super::DatabaseError;

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "m20260815_000001_create_jobs_table",
        "CREATE TABLE jobs (
            id               TEXT PRIMARY KEY,
            filename         TEXT NOT NULL,
            source_path      TEXT NOT NULL,
            file_size        INTEGER NOT NULL DEFAULT 0,
            mime_type        TEXT,
            status           TEXT NOT NULL DEFAULT 'PENDING',
            frame_count      INTEGER NOT NULL DEFAULT 0,
            processed_frames INTEGER NOT NULL DEFAULT 0,
            error_message    TEXT,
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL
        );
        CREATE INDEX idx_jobs_status ON jobs (status);
        CREATE INDEX idx_jobs_created_at ON jobs (created_at);",
    ),
    (
        "m20260815_000002_create_ocr_results_table",
        "CREATE TABLE ocr_results (
            id               TEXT PRIMARY KEY,
            job_id           TEXT NOT NULL REFERENCES jobs (id) ON DELETE CASCADE,
            frame_number     INTEGER NOT NULL,
            recognized_text  TEXT NOT NULL,
            confidence_score REAL NOT NULL DEFAULT 0,
            bounding_box     TEXT,
            language         TEXT NOT NULL DEFAULT 'unknown',
            is_book_title    INTEGER NOT NULL DEFAULT 0,
            created_at       TEXT NOT NULL
        );
        CREATE INDEX idx_ocr_results_job_id ON ocr_results (job_id);
        CREATE INDEX idx_ocr_results_job_confidence
            ON ocr_results (job_id, confidence_score);",
    ),
];

/// Applies all pending migrations in order.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name       TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let applied: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM _migrations WHERE name = ?1)",
            params![name],
            |r| r.get(0),
        )?;
        if applied {
            continue;
        }

        conn.execute_batch(sql)?;
        conn.execute(
            "INSERT INTO _migrations (name, applied_at) VALUES (?1, ?2)",
            params![name, super::now_rfc3339()],
        )?;
        log::info!("Applied migration {}", name);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_all_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count as usize, MIGRATIONS.len());
    }

    #[test]
    fn test_tables_exist_after_migration() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        for table in ["jobs", "ocr_results"] {
            let found: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
                    params![table],
                    |r| r.get(0),
                )
                .unwrap();
            assert!(found, "missing table {}", table);
        }
    }
}
