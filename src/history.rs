use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{AnalysisRequest, Occurrence, Statistics};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS occurrences (
    id            TEXT PRIMARY KEY,
    project_id    TEXT,
    error_type    TEXT NOT NULL,
    error_message TEXT NOT NULL,
    code_context  TEXT,
    language      TEXT NOT NULL,
    occurred_at   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_occurrences_project
    ON occurrences(project_id, error_type, occurred_at);
CREATE INDEX IF NOT EXISTS idx_occurrences_time
    ON occurrences(occurred_at);
";

const OCCURRENCE_COLUMNS: &str =
    "id, project_id, error_type, error_message, code_context, language, occurred_at";

/// Append-only record of analyzed errors.
/// Per-project statistics and dashboard counts are derived from it.
pub struct HistoryStore {
    conn: Mutex<Connection>,
}

impl HistoryStore {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        Self::init(Connection::open(path)?)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self, AppError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, AppError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run store work on the blocking pool
    pub async fn run<T, F>(self: &Arc<Self>, work: F) -> Result<T, AppError>
    where
        F: FnOnce(&HistoryStore) -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(self);
        blocking(move || work(&store)).await
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("history store lock poisoned".to_string()))
    }

    pub fn record(&self, request: &AnalysisRequest, error_type: &str) -> Result<Occurrence, AppError> {
        self.record_at(request, error_type, Utc::now())
    }

    pub fn record_at(
        &self,
        request: &AnalysisRequest,
        error_type: &str,
        occurred_at: DateTime<Utc>,
    ) -> Result<Occurrence, AppError> {
        let occurrence = Occurrence {
            id: Uuid::new_v4().to_string(),
            project_id: request.project().map(str::to_string),
            error_type: error_type.to_string(),
            error_message: request.error_message.clone(),
            code_context: request.context().map(str::to_string),
            language: request.language.as_str().to_string(),
            occurred_at,
        };

        self.conn()?.execute(
            "INSERT INTO occurrences (id, project_id, error_type, error_message, code_context, language, occurred_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                occurrence.id,
                occurrence.project_id,
                occurrence.error_type,
                occurrence.error_message,
                occurrence.code_context,
                occurrence.language,
                occurrence.occurred_at,
            ],
        )?;

        tracing::debug!(
            error_type,
            project_id = ?occurrence.project_id,
            "recorded occurrence {}",
            occurrence.id
        );
        Ok(occurrence)
    }

    /// Frequency of an error type in a project and the time of the previous occurrence
    pub fn project_stats(&self, project_id: &str, error_type: &str) -> Result<Statistics, AppError> {
        let conn = self.conn()?;

        let frequency: i64 = conn.query_row(
            "SELECT COUNT(*) FROM occurrences WHERE project_id = ?1 AND error_type = ?2",
            params![project_id, error_type],
            |row| row.get(0),
        )?;

        let last_occurrence: Option<DateTime<Utc>> = conn
            .query_row(
                "SELECT occurred_at FROM occurrences
                 WHERE project_id = ?1 AND error_type = ?2
                 ORDER BY occurred_at DESC, rowid DESC
                 LIMIT 1 OFFSET 1",
                params![project_id, error_type],
                |row| row.get(0),
            )
            .optional()?;

        Ok(Statistics {
            frequency: Some(frequency.max(0) as u64),
            last_occurrence,
            ..Statistics::default()
        })
    }

    /// Newest `limit` occurrences of an error type, oldest first
    pub fn recent(
        &self,
        project_id: &str,
        error_type: &str,
        limit: usize,
    ) -> Result<Vec<Occurrence>, AppError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {OCCURRENCE_COLUMNS} FROM occurrences
             WHERE project_id = ?1 AND error_type = ?2
             ORDER BY occurred_at DESC, rowid DESC
             LIMIT ?3"
        ))?;

        let mut occurrences = stmt
            .query_map(params![project_id, error_type, limit as i64], read_occurrence)?
            .collect::<Result<Vec<_>, _>>()?;
        occurrences.reverse();
        Ok(occurrences)
    }

    /// Newest first
    pub fn project_history(&self, project_id: &str, limit: usize) -> Result<Vec<Occurrence>, AppError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {OCCURRENCE_COLUMNS} FROM occurrences
             WHERE project_id = ?1
             ORDER BY occurred_at DESC, rowid DESC
             LIMIT ?2"
        ))?;

        let occurrences = stmt
            .query_map(params![project_id, limit as i64], read_occurrence)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(occurrences)
    }

    /// Occurrence counts per error type, most frequent first
    pub fn counts_since(
        &self,
        since: Option<DateTime<Utc>>,
        project_id: Option<&str>,
    ) -> Result<Vec<(String, u64)>, AppError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT error_type, COUNT(*) AS n FROM occurrences
             WHERE (?1 IS NULL OR occurred_at >= ?1)
               AND (?2 IS NULL OR project_id = ?2)
             GROUP BY error_type
             ORDER BY n DESC, error_type ASC",
        )?;

        let counts = stmt
            .query_map(params![since, project_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?.max(0) as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    }
}

/// SQLite calls hold a std mutex and must stay off the async workers
pub async fn blocking<T, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("history task failed: {e}")))?
}

fn read_occurrence(row: &Row<'_>) -> rusqlite::Result<Occurrence> {
    Ok(Occurrence {
        id: row.get(0)?,
        project_id: row.get(1)?,
        error_type: row.get(2)?,
        error_message: row.get(3)?,
        code_context: row.get(4)?,
        language: row.get(5)?,
        occurred_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Language;
    use chrono::Duration;
    use tempfile::NamedTempFile;

    fn request(message: &str, project: Option<&str>) -> AnalysisRequest {
        AnalysisRequest {
            error_message: message.to_string(),
            code_context: None,
            language: Language::Python,
            project_id: project.map(str::to_string),
        }
    }

    #[test]
    fn test_first_occurrence_has_no_previous() {
        let store = HistoryStore::in_memory().unwrap();
        store.record(&request("KeyError: 'a'", Some("proj")), "KeyError").unwrap();

        let stats = store.project_stats("proj", "KeyError").unwrap();
        assert_eq!(stats.frequency, Some(1));
        assert_eq!(stats.last_occurrence, None);
    }

    #[test]
    fn test_last_occurrence_is_previous_one() {
        let store = HistoryStore::in_memory().unwrap();
        let t0 = Utc::now() - Duration::hours(2);
        let t1 = t0 + Duration::hours(1);
        let t2 = t1 + Duration::hours(1);

        let req = request("KeyError: 'a'", Some("proj"));
        store.record_at(&req, "KeyError", t0).unwrap();
        store.record_at(&req, "KeyError", t1).unwrap();
        store.record_at(&req, "KeyError", t2).unwrap();
        // Other projects and types do not count
        store.record_at(&request("KeyError: 'a'", Some("other")), "KeyError", t2).unwrap();
        store.record_at(&req, "NameError", t2).unwrap();

        let stats = store.project_stats("proj", "KeyError").unwrap();
        assert_eq!(stats.frequency, Some(3));
        assert_eq!(stats.last_occurrence, Some(t1));
    }

    #[test]
    fn test_recent_is_chronological() {
        let store = HistoryStore::in_memory().unwrap();
        let start = Utc::now() - Duration::minutes(10);
        for i in 0..4 {
            let req = request(&format!("KeyError: 'k{}'", i), Some("proj"));
            store.record_at(&req, "KeyError", start + Duration::minutes(i)).unwrap();
        }

        let recent = store.recent("proj", "KeyError", 3).unwrap();
        let messages: Vec<_> = recent.iter().map(|o| o.error_message.as_str()).collect();
        assert_eq!(messages, vec!["KeyError: 'k1'", "KeyError: 'k2'", "KeyError: 'k3'"]);
    }

    #[test]
    fn test_counts_since_window_and_project() {
        let store = HistoryStore::in_memory().unwrap();
        let now = Utc::now();
        let old = now - Duration::days(10);

        store.record_at(&request("a", Some("p1")), "KeyError", now).unwrap();
        store.record_at(&request("b", Some("p1")), "KeyError", now).unwrap();
        store.record_at(&request("c", None), "NameError", now).unwrap();
        store.record_at(&request("d", Some("p2")), "IndexError", old).unwrap();

        let all = store.counts_since(None, None).unwrap();
        assert_eq!(
            all,
            vec![
                ("KeyError".to_string(), 2),
                ("IndexError".to_string(), 1),
                ("NameError".to_string(), 1),
            ]
        );

        let week = store.counts_since(Some(now - Duration::days(7)), None).unwrap();
        assert_eq!(week.len(), 2);

        let p1 = store.counts_since(None, Some("p1")).unwrap();
        assert_eq!(p1, vec![("KeyError".to_string(), 2)]);
    }

    #[test]
    fn test_blank_project_not_attributed() {
        let store = HistoryStore::in_memory().unwrap();
        let occurrence = store.record(&request("a", Some("  ")), "KeyError").unwrap();
        assert_eq!(occurrence.project_id, None);
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp_file = NamedTempFile::new().unwrap();
        {
            let store = HistoryStore::open(temp_file.path()).unwrap();
            store.record(&request("a", Some("proj")), "KeyError").unwrap();
        }

        let store = HistoryStore::open(temp_file.path()).unwrap();
        let history = store.project_history("proj", 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].error_type, "KeyError");
    }

    #[tokio::test]
    async fn test_run_on_blocking_pool() {
        let store = Arc::new(HistoryStore::in_memory().unwrap());
        let stats = store
            .run(|store| {
                store.record(&request("KeyError: 'a'", Some("proj")), "KeyError")?;
                store.project_stats("proj", "KeyError")
            })
            .await
            .unwrap();

        assert_eq!(stats.frequency, Some(1));
    }
}
