use crate::sink::Submission;
use crate::{ItemStatus, StatusEntry};
use rusqlite::{Connection, params};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during journal operations.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("invalid item status: {0}")]
    InvalidStatus(String),
}

pub type Result<T> = std::result::Result<T, JournalError>;

/// One row of the submissions table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionSummary {
    pub id: i64,
    pub resume_token: Option<String>,
    pub approved: usize,
    pub rejected: usize,
    pub total: usize,
    pub delivered: usize,
    pub submitted_at: String,
}

/// SQLite-backed record of delivered review results.
///
/// Only finished submissions are stored; an in-progress review is never
/// written here.
pub struct SubmissionJournal {
    conn: Connection,
}

impl SubmissionJournal {
    /// Open or create the journal at the given path.
    ///
    /// Creates the necessary tables if they don't exist.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS submissions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                resume_token TEXT,
                approved INTEGER NOT NULL,
                rejected INTEGER NOT NULL,
                total INTEGER NOT NULL,
                submitted_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE TABLE IF NOT EXISTS submission_items (
                submission_id INTEGER NOT NULL REFERENCES submissions(id),
                position INTEGER NOT NULL,
                file_id TEXT NOT NULL,
                status TEXT NOT NULL,
                PRIMARY KEY (submission_id, position)
            );",
        )?;
        Ok(Self { conn })
    }

    /// Store a submission and its items atomically.
    ///
    /// Returns the new submission id.
    pub fn record(&mut self, submission: &Submission) -> Result<i64> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO submissions (resume_token, approved, rejected, total)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                submission.resume_token,
                submission.summary.approved as i64,
                submission.summary.rejected as i64,
                submission.summary.total as i64
            ],
        )?;
        let id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO submission_items (submission_id, position, file_id, status)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (position, entry) in submission.items.iter().enumerate() {
                stmt.execute(params![
                    id,
                    position as i64,
                    entry.file_id,
                    entry.status.as_str()
                ])?;
            }
        }

        tx.commit()?;
        Ok(id)
    }

    /// List submissions, newest first.
    pub fn list_submissions(&self) -> Result<Vec<SubmissionSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, s.resume_token, s.approved, s.rejected, s.total, s.submitted_at,
                    (SELECT COUNT(*) FROM submission_items i WHERE i.submission_id = s.id)
             FROM submissions s
             ORDER BY s.id DESC",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(SubmissionSummary {
                    id: row.get(0)?,
                    resume_token: row.get(1)?,
                    approved: row.get::<_, i64>(2)? as usize,
                    rejected: row.get::<_, i64>(3)? as usize,
                    total: row.get::<_, i64>(4)? as usize,
                    submitted_at: row.get(5)?,
                    delivered: row.get::<_, i64>(6)? as usize,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Items delivered with a submission, in submission order.
    pub fn submission_items(&self, submission_id: i64) -> Result<Vec<StatusEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT file_id, status FROM submission_items
             WHERE submission_id = ?1 ORDER BY position",
        )?;

        let raw: Vec<(String, String)> = stmt
            .query_map(params![submission_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(file_id, status)| {
                let status = status
                    .parse::<ItemStatus>()
                    .map_err(|_| JournalError::InvalidStatus(status))?;
                Ok(StatusEntry { file_id, status })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReviewTally;

    fn submission(token: Option<&str>, entries: &[(&str, ItemStatus)]) -> Submission {
        Submission {
            resume_token: token.map(str::to_string),
            items: entries
                .iter()
                .map(|(id, status)| StatusEntry {
                    file_id: id.to_string(),
                    status: *status,
                })
                .collect(),
            summary: ReviewTally {
                approved: 1,
                rejected: entries.len(),
                total: entries.len() + 1,
            },
        }
    }

    #[test]
    fn open_creates_db() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("journal.db");
        let _journal = SubmissionJournal::open(&db_path).unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn open_creates_tables() {
        let dir = tempfile::tempdir().unwrap();
        let journal = SubmissionJournal::open(&dir.path().join("journal.db")).unwrap();

        let count: i64 = journal
            .conn
            .query_row("SELECT COUNT(*) FROM submissions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn record_and_read_back_items() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = SubmissionJournal::open(&dir.path().join("journal.db")).unwrap();

        let id = journal
            .record(&submission(
                Some("https://hooks/r/1"),
                &[("b", ItemStatus::Rejected), ("c", ItemStatus::Rejected)],
            ))
            .unwrap();

        let items = journal.submission_items(id).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].file_id, "b");
        assert_eq!(items[1].status, ItemStatus::Rejected);
    }

    #[test]
    fn list_is_newest_first_with_counts() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = SubmissionJournal::open(&dir.path().join("journal.db")).unwrap();

        journal
            .record(&submission(None, &[("a", ItemStatus::Rejected)]))
            .unwrap();
        journal
            .record(&submission(Some("tok"), &[]))
            .unwrap();

        let list = journal.list_submissions().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].resume_token.as_deref(), Some("tok"));
        assert_eq!(list[0].delivered, 0);
        assert_eq!(list[1].resume_token, None);
        assert_eq!(list[1].delivered, 1);
        assert_eq!(list[1].total, 2);
    }

    #[test]
    fn corrupt_status_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = SubmissionJournal::open(&dir.path().join("journal.db")).unwrap();
        let id = journal
            .record(&submission(None, &[("a", ItemStatus::Rejected)]))
            .unwrap();
        journal
            .conn
            .execute(
                "UPDATE submission_items SET status = 'maybe' WHERE submission_id = ?1",
                params![id],
            )
            .unwrap();

        assert!(matches!(
            journal.submission_items(id),
            Err(JournalError::InvalidStatus(s)) if s == "maybe"
        ));
    }
}
