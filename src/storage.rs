use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::features::FeatureMap;

/// One persisted URL check.
#[derive(Debug, Clone, Serialize)]
pub struct UrlCheckRecord {
    pub id: i64,
    pub url: String,
    pub is_phishing: bool,
    pub confidence: f64,
    pub features: Option<FeatureMap>,
    pub checked_at: DateTime<Utc>,
}

/// One persisted email check. The raw body is never stored, only its hash.
#[derive(Debug, Clone, Serialize)]
pub struct EmailCheckRecord {
    pub id: i64,
    pub subject: String,
    pub sender: String,
    pub content_hash: String,
    pub is_phishing: bool,
    pub confidence: f64,
    pub features: Option<FeatureMap>,
    pub checked_at: DateTime<Utc>,
}

/// Aggregate counters for one check kind.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CheckStats {
    pub total: u64,
    pub phishing: u64,
    pub legitimate: u64,
    pub phishing_percentage: f64,
}

/// Storage contract for check results, history and aggregate stats.
pub trait PersistenceSink: Send + Sync {
    fn save_url_check(
        &self,
        url: &str,
        is_phishing: bool,
        confidence: f64,
        features: &FeatureMap,
    ) -> Result<UrlCheckRecord>;

    /// Deduplicates on a content hash of the raw body: a body seen before
    /// returns the existing record regardless of subject or sender.
    fn save_email_check(
        &self,
        subject: &str,
        sender: &str,
        body: &str,
        is_phishing: bool,
        confidence: f64,
        features: &FeatureMap,
    ) -> Result<EmailCheckRecord>;

    fn url_history(&self, limit: u32) -> Result<Vec<UrlCheckRecord>>;
    fn email_history(&self, limit: u32) -> Result<Vec<EmailCheckRecord>>;
    fn url_stats(&self) -> Result<CheckStats>;
    fn email_stats(&self) -> Result<CheckStats>;
}

/// SQLite-backed sink. One connection behind a mutex is plenty for the
/// synchronous, single-request serving model.
pub struct SqliteSink {
    conn: Mutex<Connection>,
}

impl SqliteSink {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// In-memory sink, used by tests and throwaway runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS url_checks (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 url TEXT NOT NULL,
                 is_phishing INTEGER NOT NULL,
                 confidence REAL NOT NULL,
                 features TEXT,
                 checked_at TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS email_checks (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 subject TEXT NOT NULL,
                 sender TEXT NOT NULL,
                 content_hash TEXT NOT NULL UNIQUE,
                 is_phishing INTEGER NOT NULL,
                 confidence REAL NOT NULL,
                 features TEXT,
                 checked_at TEXT NOT NULL
             );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn content_hash(body: &str) -> String {
        hex::encode(Sha256::digest(body.as_bytes()))
    }
}

fn url_record_from_row(row: &Row<'_>) -> rusqlite::Result<UrlCheckRecord> {
    let features: Option<String> = row.get(4)?;
    let checked_at: String = row.get(5)?;
    Ok(UrlCheckRecord {
        id: row.get(0)?,
        url: row.get(1)?,
        is_phishing: row.get::<_, i64>(2)? != 0,
        confidence: row.get(3)?,
        features: features.and_then(|f| serde_json::from_str(&f).ok()),
        checked_at: checked_at
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
    })
}

fn email_record_from_row(row: &Row<'_>) -> rusqlite::Result<EmailCheckRecord> {
    let features: Option<String> = row.get(6)?;
    let checked_at: String = row.get(7)?;
    Ok(EmailCheckRecord {
        id: row.get(0)?,
        subject: row.get(1)?,
        sender: row.get(2)?,
        content_hash: row.get(3)?,
        is_phishing: row.get::<_, i64>(4)? != 0,
        confidence: row.get(5)?,
        features: features.and_then(|f| serde_json::from_str(&f).ok()),
        checked_at: checked_at
            .parse::<DateTime<Utc>>()
            .unwrap_or_else(|_| Utc::now()),
    })
}

fn stats_for(conn: &Connection, table: &str) -> Result<CheckStats> {
    let total: u64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
        r.get(0)
    })?;
    let phishing: u64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE is_phishing = 1", table),
        [],
        |r| r.get(0),
    )?;
    let legitimate = total - phishing;
    let phishing_percentage = if total == 0 {
        0.0
    } else {
        phishing as f64 / total as f64 * 100.0
    };
    Ok(CheckStats {
        total,
        phishing,
        legitimate,
        phishing_percentage,
    })
}

impl PersistenceSink for SqliteSink {
    fn save_url_check(
        &self,
        url: &str,
        is_phishing: bool,
        confidence: f64,
        features: &FeatureMap,
    ) -> Result<UrlCheckRecord> {
        let conn = self.conn.lock().unwrap();
        let checked_at = Utc::now();
        let features_json = serde_json::to_string(features)?;
        conn.execute(
            "INSERT INTO url_checks (url, is_phishing, confidence, features, checked_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                url,
                is_phishing as i64,
                confidence,
                features_json,
                checked_at.to_rfc3339()
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(UrlCheckRecord {
            id,
            url: url.to_string(),
            is_phishing,
            confidence,
            features: Some(features.clone()),
            checked_at,
        })
    }

    fn save_email_check(
        &self,
        subject: &str,
        sender: &str,
        body: &str,
        is_phishing: bool,
        confidence: f64,
        features: &FeatureMap,
    ) -> Result<EmailCheckRecord> {
        let conn = self.conn.lock().unwrap();
        let content_hash = Self::content_hash(body);

        let existing = conn
            .query_row(
                "SELECT id, subject, sender, content_hash, is_phishing, confidence, features,
                        checked_at
                 FROM email_checks WHERE content_hash = ?1",
                params![content_hash],
                email_record_from_row,
            )
            .optional()?;
        if let Some(record) = existing {
            log::debug!("duplicate email body, returning existing check {}", record.id);
            return Ok(record);
        }

        let checked_at = Utc::now();
        let features_json = serde_json::to_string(features)?;
        conn.execute(
            "INSERT INTO email_checks
                 (subject, sender, content_hash, is_phishing, confidence, features, checked_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                subject,
                sender,
                content_hash,
                is_phishing as i64,
                confidence,
                features_json,
                checked_at.to_rfc3339()
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(EmailCheckRecord {
            id,
            subject: subject.to_string(),
            sender: sender.to_string(),
            content_hash,
            is_phishing,
            confidence,
            features: Some(features.clone()),
            checked_at,
        })
    }

    fn url_history(&self, limit: u32) -> Result<Vec<UrlCheckRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, url, is_phishing, confidence, features, checked_at
             FROM url_checks ORDER BY id DESC LIMIT ?1",
        )?;
        let records = stmt
            .query_map(params![limit], url_record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn email_history(&self, limit: u32) -> Result<Vec<EmailCheckRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, subject, sender, content_hash, is_phishing, confidence, features,
                    checked_at
             FROM email_checks ORDER BY id DESC LIMIT ?1",
        )?;
        let records = stmt
            .query_map(params![limit], email_record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn url_stats(&self) -> Result<CheckStats> {
        let conn = self.conn.lock().unwrap();
        stats_for(&conn, "url_checks")
    }

    fn email_stats(&self) -> Result<CheckStats> {
        let conn = self.conn.lock().unwrap();
        stats_for(&conn, "email_checks")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink() -> SqliteSink {
        SqliteSink::open_in_memory().unwrap()
    }

    fn some_features() -> FeatureMap {
        let mut map = FeatureMap::new();
        map.insert("url_length".to_string(), 22.0);
        map
    }

    #[test]
    fn test_url_history_most_recent_first() {
        let sink = sink();
        sink.save_url_check("https://first.com", false, 0.9, &some_features())
            .unwrap();
        sink.save_url_check("http://second.com", true, 0.8, &some_features())
            .unwrap();

        let history = sink.url_history(10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].url, "http://second.com");
        assert_eq!(history[1].url, "https://first.com");

        let limited = sink.url_history(1).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_email_dedup_by_body_hash() {
        let sink = sink();
        let first = sink
            .save_email_check("subject a", "a@x.com", "same body", true, 0.7, &some_features())
            .unwrap();
        // Different subject and sender, identical body: no new row.
        let second = sink
            .save_email_check("subject b", "b@y.com", "same body", false, 0.2, &some_features())
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.subject, "subject a");
        assert_eq!(sink.email_stats().unwrap().total, 1);
    }

    #[test]
    fn test_distinct_bodies_are_separate_records() {
        let sink = sink();
        sink.save_email_check("s", "a@x.com", "body one", true, 0.7, &some_features())
            .unwrap();
        sink.save_email_check("s", "a@x.com", "body two", true, 0.7, &some_features())
            .unwrap();
        assert_eq!(sink.email_stats().unwrap().total, 2);
    }

    #[test]
    fn test_stats_percentages() {
        let sink = sink();
        assert_eq!(sink.url_stats().unwrap().total, 0);
        assert_eq!(sink.url_stats().unwrap().phishing_percentage, 0.0);

        sink.save_url_check("http://bad.com", true, 0.9, &some_features())
            .unwrap();
        sink.save_url_check("https://good.com", false, 0.9, &some_features())
            .unwrap();
        sink.save_url_check("https://fine.com", false, 0.8, &some_features())
            .unwrap();

        let stats = sink.url_stats().unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.phishing, 1);
        assert_eq!(stats.legitimate, 2);
        assert!((stats.phishing_percentage - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_features_round_trip_through_storage() {
        let sink = sink();
        sink.save_url_check("https://a.com", false, 0.9, &some_features())
            .unwrap();
        let history = sink.url_history(1).unwrap();
        let features = history[0].features.as_ref().unwrap();
        assert_eq!(features["url_length"], 22.0);
    }
}
