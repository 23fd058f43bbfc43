//! Result repository — per-frame OCR results owned by a job.
//!
//! Results are written once per job in a single bulk insert after the frame
//! loop finishes, and deleted en masse before their owning job is deleted.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A persisted per-frame recognition result.
#[derive(Debug, Clone)]
pub struct ResultRow {
    pub id: String,
    pub job_id: String,
    pub frame_number: u32,
    pub recognized_text: String,
    /// Normalized to [0, 1] regardless of the recognizer's native scale.
    pub confidence_score: f64,
    /// Opaque JSON geometry of the best candidate, if any.
    pub bounding_box: Option<String>,
    pub language: String,
    pub is_book_title: bool,
    pub created_at: String,
}

impl ResultRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            frame_number: row.get("frame_number")?,
            recognized_text: row.get("recognized_text")?,
            confidence_score: row.get("confidence_score")?,
            bounding_box: row.get("bounding_box")?,
            language: row.get("language")?,
            is_book_title: row.get("is_book_title")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Bulk-inserts all given results in one transaction. Returns the count.
pub fn insert_many(db: &Database, results: &[ResultRow]) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO ocr_results (id, job_id, frame_number, recognized_text,
                 confidence_score, bounding_box, language, is_book_title, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for result in results {
                stmt.execute(params![
                    result.id,
                    result.job_id,
                    result.frame_number,
                    result.recognized_text,
                    result.confidence_score,
                    result.bounding_box,
                    result.language,
                    result.is_book_title,
                    result.created_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(results.len())
    })
}

/// Fetches results for a job with confidence at or above `min_confidence`,
/// ordered by creation time ascending, truncated to `limit`.
///
/// Rows of one bulk write can share a timestamp; `frame_number` is the
/// tiebreak that keeps the order deterministic.
pub fn find_by_job(
    db: &Database,
    job_id: &str,
    min_confidence: f64,
    limit: u32,
) -> Result<Vec<ResultRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM ocr_results
             WHERE job_id = ?1 AND confidence_score >= ?2
             ORDER BY created_at ASC, frame_number ASC
             LIMIT ?3",
        )?;
        let rows: Vec<ResultRow> = stmt
            .query_map(params![job_id, min_confidence, limit], ResultRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Removes all results belonging to a job. Returns the count removed.
pub fn delete_by_job(db: &Database, job_id: &str) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM ocr_results WHERE job_id = ?1", params![job_id])?;
        Ok(changed)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::job_repo::{self, JobRow};
    use crate::job::JobStatus;

    fn test_db_with_job(job_id: &str) -> Database {
        let db = Database::open_in_memory().unwrap();
        job_repo::insert(
            &db,
            &JobRow {
                id: job_id.to_string(),
                filename: "shelf.mp4".to_string(),
                source_path: "/tmp/shelf.mp4".to_string(),
                file_size: 1024,
                mime_type: Some("video/mp4".to_string()),
                status: JobStatus::Processing,
                frame_count: 3,
                processed_frames: 0,
                error_message: None,
                created_at: "2026-01-01T00:00:00Z".to_string(),
                updated_at: "2026-01-01T00:00:00Z".to_string(),
            },
        )
        .unwrap();
        db
    }

    fn sample_result(job_id: &str, frame: u32, confidence: f64) -> ResultRow {
        ResultRow {
            id: format!("{}-r{}", job_id, frame),
            job_id: job_id.to_string(),
            frame_number: frame,
            recognized_text: format!("Book Title {}", frame),
            confidence_score: confidence,
            bounding_box: None,
            language: "en".to_string(),
            is_book_title: true,
            created_at: "2026-01-01T00:00:10Z".to_string(),
        }
    }

    #[test]
    fn test_insert_many_and_find() {
        let db = test_db_with_job("v1");
        let count = insert_many(
            &db,
            &[
                sample_result("v1", 0, 0.5),
                sample_result("v1", 1, 0.9),
                sample_result("v1", 2, 0.97),
            ],
        )
        .unwrap();
        assert_eq!(count, 3);

        let all = find_by_job(&db, "v1", 0.0, 50).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(
            all.iter().map(|r| r.frame_number).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_find_applies_confidence_threshold() {
        let db = test_db_with_job("v2");
        insert_many(
            &db,
            &[
                sample_result("v2", 0, 0.5),
                sample_result("v2", 1, 0.9),
                sample_result("v2", 2, 0.97),
            ],
        )
        .unwrap();

        let filtered = find_by_job(&db, "v2", 0.95, 50).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].frame_number, 2);
    }

    #[test]
    fn test_find_applies_limit() {
        let db = test_db_with_job("v3");
        let rows: Vec<ResultRow> = (0..10).map(|i| sample_result("v3", i, 0.8)).collect();
        insert_many(&db, &rows).unwrap();

        let limited = find_by_job(&db, "v3", 0.0, 4).unwrap();
        assert_eq!(limited.len(), 4);
        assert_eq!(limited[0].frame_number, 0);
    }

    #[test]
    fn test_find_only_returns_own_job() {
        let db = test_db_with_job("v4");
        job_repo::insert(
            &db,
            &JobRow {
                id: "other".to_string(),
                filename: "other.mp4".to_string(),
                source_path: "/tmp/other.mp4".to_string(),
                file_size: 1,
                mime_type: None,
                status: JobStatus::Processing,
                frame_count: 1,
                processed_frames: 0,
                error_message: None,
                created_at: "2026-01-01T00:00:00Z".to_string(),
                updated_at: "2026-01-01T00:00:00Z".to_string(),
            },
        )
        .unwrap();
        insert_many(
            &db,
            &[sample_result("v4", 0, 0.8), sample_result("other", 0, 0.8)],
        )
        .unwrap();

        let rows = find_by_job(&db, "v4", 0.0, 50).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].job_id, "v4");
    }

    #[test]
    fn test_delete_by_job_returns_count() {
        let db = test_db_with_job("v5");
        insert_many(&db, &[sample_result("v5", 0, 0.8), sample_result("v5", 1, 0.9)]).unwrap();

        assert_eq!(delete_by_job(&db, "v5").unwrap(), 2);
        assert_eq!(delete_by_job(&db, "v5").unwrap(), 0);
        assert!(find_by_job(&db, "v5", 0.0, 50).unwrap().is_empty());
    }

    #[test]
    fn test_results_cascade_on_job_delete() {
        let db = test_db_with_job("v6");
        insert_many(&db, &[sample_result("v6", 0, 0.8)]).unwrap();

        job_repo::delete(&db, "v6").unwrap();
        // foreign_keys=ON plus ON DELETE CASCADE removes the orphans.
        db.with_conn(|conn| {
            let count: u32 =
                conn.query_row("SELECT COUNT(*) FROM ocr_results", [], |r| r.get(0))?;
            assert_eq!(count, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_bounding_box_round_trip() {
        let db = test_db_with_job("v7");
        let mut row = sample_result("v7", 0, 0.8);
        row.bounding_box = Some(r#"{"x0":10,"y0":20,"x1":110,"y1":40}"#.to_string());
        insert_many(&db, &[row]).unwrap();

        let rows = find_by_job(&db, "v7", 0.0, 50).unwrap();
        assert_eq!(
            rows[0].bounding_box.as_deref(),
            Some(r#"{"x0":10,"y0":20,"x1":110,"y1":40}"#)
        );
    }
}
