//! Job repository — CRUD operations for the `jobs` table.
//!
//! Partial updates report `DatabaseError::RecordNotFound` when the id matches
//! no row; lookups return `Option` and never treat absence as an error.

use rusqlite::{params, Row};

use crate::job::JobStatus;

use super::{Database, DatabaseError};

/// A job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub filename: String,
    pub source_path: String,
    pub file_size: u64,
    pub mime_type: Option<String>,
    pub status: JobStatus,
    pub frame_count: u32,
    pub processed_frames: u32,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let status_str: String = row.get("status")?;
        let status = JobStatus::parse(&status_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                format!("unknown job status '{}'", status_str).into(),
            )
        })?;

        Ok(Self {
            id: row.get("id")?,
            filename: row.get("filename")?,
            source_path: row.get("source_path")?,
            file_size: row.get("file_size")?,
            mime_type: row.get("mime_type")?,
            status,
            frame_count: row.get("frame_count")?,
            processed_frames: row.get("processed_frames")?,
            error_message: row.get("error_message")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, filename, source_path, file_size, mime_type, status,
             frame_count, processed_frames, error_message, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                job.id,
                job.filename,
                job.source_path,
                job.file_size,
                job.mime_type,
                job.status.as_str(),
                job.frame_count,
                job.processed_frames,
                job.error_message,
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

fn expect_one_row(changed: usize, id: &str) -> Result<(), DatabaseError> {
    if changed == 0 {
        return Err(DatabaseError::RecordNotFound { id: id.to_string() });
    }
    Ok(())
}

/// Moves a job into PROCESSING and resets its progress counter.
pub fn mark_processing(db: &Database, id: &str, updated_at: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = ?2, processed_frames = 0, updated_at = ?3 WHERE id = ?1",
            params![id, JobStatus::Processing.as_str(), updated_at],
        )?;
        expect_one_row(changed, id)
    })
}

/// Records the total number of frames discovered for a job.
pub fn set_frame_count(
    db: &Database,
    id: &str,
    frame_count: u32,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET frame_count = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, frame_count, updated_at],
        )?;
        expect_one_row(changed, id)
    })
}

/// Updates the number of processed frames. Called once per frame so that
/// concurrent status polls observe live progress.
pub fn set_processed_frames(
    db: &Database,
    id: &str,
    processed_frames: u32,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET processed_frames = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, processed_frames, updated_at],
        )?;
        expect_one_row(changed, id)
    })
}

/// Moves a job into COMPLETED. Forces `processed_frames` to equal the frame
/// count so the terminal record is exact regardless of intermediate updates.
pub fn mark_completed(
    db: &Database,
    id: &str,
    frame_count: u32,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = ?2, frame_count = ?3, processed_frames = ?3,
             updated_at = ?4 WHERE id = ?1",
            params![id, JobStatus::Completed.as_str(), frame_count, updated_at],
        )?;
        expect_one_row(changed, id)
    })
}

/// Moves a job into FAILED with a human-readable error message.
pub fn mark_failed(
    db: &Database,
    id: &str,
    error_message: &str,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = ?2, error_message = ?3, updated_at = ?4 WHERE id = ?1",
            params![id, JobStatus::Failed.as_str(), error_message, updated_at],
        )?;
        expect_one_row(changed, id)
    })
}

/// Removes a job row.
pub fn delete(db: &Database, id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
        expect_one_row(changed, id)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_job(id: &str) -> JobRow {
        JobRow {
            id: id.to_string(),
            filename: "shelf.mp4".to_string(),
            source_path: "/tmp/uploads/shelf.mp4".to_string(),
            file_size: 2_048_000,
            mime_type: Some("video/mp4".to_string()),
            status: JobStatus::Pending,
            frame_count: 0,
            processed_frames: 0,
            error_message: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        insert(&db, &sample_job("job-1")).unwrap();

        let found = find_by_id(&db, "job-1").unwrap().unwrap();
        assert_eq!(found.filename, "shelf.mp4");
        assert_eq!(found.status, JobStatus::Pending);
        assert_eq!(found.file_size, 2_048_000);
        assert_eq!(found.mime_type.as_deref(), Some("video/mp4"));
        assert_eq!(found.frame_count, 0);
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_id(&db, "nonexistent").unwrap().is_none());
    }

    #[test]
    fn test_processing_run_updates() {
        let db = test_db();
        insert(&db, &sample_job("job-2")).unwrap();

        mark_processing(&db, "job-2", "2026-01-01T00:00:01Z").unwrap();
        set_frame_count(&db, "job-2", 3, "2026-01-01T00:00:02Z").unwrap();
        set_processed_frames(&db, "job-2", 2, "2026-01-01T00:00:03Z").unwrap();

        let found = find_by_id(&db, "job-2").unwrap().unwrap();
        assert_eq!(found.status, JobStatus::Processing);
        assert_eq!(found.frame_count, 3);
        assert_eq!(found.processed_frames, 2);
        assert_eq!(found.updated_at, "2026-01-01T00:00:03Z");

        mark_completed(&db, "job-2", 3, "2026-01-01T00:00:04Z").unwrap();
        let found = find_by_id(&db, "job-2").unwrap().unwrap();
        assert_eq!(found.status, JobStatus::Completed);
        assert_eq!(found.processed_frames, found.frame_count);
    }

    #[test]
    fn test_mark_failed_records_message() {
        let db = test_db();
        insert(&db, &sample_job("job-3")).unwrap();

        mark_failed(&db, "job-3", "ffmpeg exited with code 1", "2026-01-01T00:00:05Z").unwrap();

        let found = find_by_id(&db, "job-3").unwrap().unwrap();
        assert_eq!(found.status, JobStatus::Failed);
        assert_eq!(
            found.error_message.as_deref(),
            Some("ffmpeg exited with code 1")
        );
    }

    #[test]
    fn test_updates_fail_for_unknown_id() {
        let db = test_db();

        let err = mark_processing(&db, "ghost", "2026-01-01T00:00:00Z").unwrap_err();
        assert!(matches!(err, DatabaseError::RecordNotFound { .. }));

        let err = set_processed_frames(&db, "ghost", 1, "2026-01-01T00:00:00Z").unwrap_err();
        assert!(matches!(err, DatabaseError::RecordNotFound { .. }));

        let err = delete(&db, "ghost").unwrap_err();
        assert!(matches!(err, DatabaseError::RecordNotFound { .. }));
    }

    #[test]
    fn test_delete() {
        let db = test_db();
        insert(&db, &sample_job("job-4")).unwrap();
        delete(&db, "job-4").unwrap();
        assert!(find_by_id(&db, "job-4").unwrap().is_none());
    }
}
