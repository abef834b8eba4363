//! Listening history storage with SQLite
//!
//! Writes go through [`RecordTx`], one transaction per synced record. Reads
//! back the aggregates the timeline report needs.

mod schema;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;

use crate::error::StoreError;
use crate::normalize::{Device, LibraryItem, ListeningSessionRow, User};

pub use schema::SCHEMA;

pub struct SessionStore {
    conn: Connection,
}

impl SessionStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        // Bundled SQLite enforces foreign keys by default; references stay best-effort
        self.conn.pragma_update(None, "foreign_keys", false)?;
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ============================================
    // SYNC WRITES
    // ============================================

    /// Start the transaction for one record. Dropping it without
    /// [`RecordTx::commit`] rolls every write back.
    pub fn begin_record(&mut self) -> Result<RecordTx<'_>, StoreError> {
        Ok(RecordTx {
            tx: self.conn.transaction()?,
        })
    }

    pub fn session_exists(&self, session_id: &str) -> Result<bool, StoreError> {
        session_exists(&self.conn, session_id)
    }

    /// Delete all session history. Reference data is left in place.
    pub fn truncate_sessions(&self) -> Result<usize, StoreError> {
        Ok(self.conn.execute("DELETE FROM listening_sessions", [])?)
    }

    // ============================================
    // QUERIES
    // ============================================

    pub fn session_count(&self) -> Result<i64, StoreError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM listening_sessions", [], |row| {
                row.get(0)
            })?)
    }

    /// Earliest and latest session start, with the total count
    pub fn history_bounds(&self) -> Result<HistoryBounds, StoreError> {
        Ok(self.conn.query_row(
            "SELECT MIN(started_at), MAX(started_at), COUNT(*) FROM listening_sessions",
            [],
            |row| {
                Ok(HistoryBounds {
                    first_listen: row.get(0)?,
                    last_listen: row.get(1)?,
                    session_count: row.get(2)?,
                })
            },
        )?)
    }

    /// Per-title listening span, most recently listened first
    pub fn timeline(&self) -> Result<Vec<TimelineRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"SELECT li.title,
                      MIN(ls.started_at) AS first_listen,
                      MAX(ls.started_at) AS last_listen,
                      COUNT(ls.id) AS session_count,
                      li.image_url
               FROM listening_sessions ls
               JOIN library_items li ON ls.library_item_id = li.id
               GROUP BY li.title, li.image_url
               HAVING MIN(ls.started_at) IS NOT NULL
               ORDER BY MAX(ls.started_at) DESC"#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(TimelineRow {
                title: row.get(0)?,
                first_listen: row.get(1)?,
                last_listen: row.get(2)?,
                session_count: row.get(3)?,
                image_url: row.get(4)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn session_exists(conn: &Connection, session_id: &str) -> Result<bool, StoreError> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM listening_sessions WHERE id = ?",
            params![session_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

fn timestamp(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn json_list(column: &'static str, values: &[String]) -> Result<String, StoreError> {
    serde_json::to_string(values).map_err(|source| StoreError::Encode { column, source })
}

/// Writes belonging to a single synced record
pub struct RecordTx<'a> {
    tx: Transaction<'a>,
}

impl RecordTx<'_> {
    pub fn session_exists(&self, session_id: &str) -> Result<bool, StoreError> {
        session_exists(&self.tx, session_id)
    }

    pub fn upsert_user(&self, user: &User) -> Result<(), StoreError> {
        self.tx.execute(
            "INSERT INTO users (id, username) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET username = excluded.username",
            params![user.id, user.username],
        )?;
        Ok(())
    }

    pub fn upsert_device(&self, device: &Device) -> Result<(), StoreError> {
        self.tx.execute(
            r#"INSERT INTO devices
               (id, client_name, device_name, model, manufacturer, client_version)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   client_name = excluded.client_name,
                   device_name = excluded.device_name,
                   model = excluded.model,
                   manufacturer = excluded.manufacturer,
                   client_version = excluded.client_version"#,
            params![
                device.id,
                device.client_name,
                device.device_name,
                device.model,
                device.manufacturer,
                device.client_version,
            ],
        )?;
        Ok(())
    }

    pub fn upsert_library_item(&self, item: &LibraryItem) -> Result<(), StoreError> {
        let narrators = json_list("narrators", &item.narrators)?;
        let genres = json_list("genres", &item.genres)?;

        self.tx.execute(
            r#"INSERT INTO library_items
               (id, library_id, media_type, title, subtitle, author, narrators,
                description, genres, release_date, published_year, feed_url,
                image_url, explicit, language, publisher, isbn, asin)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   library_id = excluded.library_id,
                   media_type = excluded.media_type,
                   title = excluded.title,
                   subtitle = excluded.subtitle,
                   author = excluded.author,
                   narrators = excluded.narrators,
                   description = excluded.description,
                   genres = excluded.genres,
                   release_date = excluded.release_date,
                   published_year = excluded.published_year,
                   feed_url = excluded.feed_url,
                   image_url = excluded.image_url,
                   explicit = excluded.explicit,
                   language = excluded.language,
                   publisher = excluded.publisher,
                   isbn = excluded.isbn,
                   asin = excluded.asin"#,
            params![
                item.id,
                item.library_id,
                item.media_type,
                item.title,
                item.subtitle,
                item.author,
                narrators,
                item.description,
                genres,
                item.release_date,
                item.published_year,
                item.feed_url,
                item.image_url,
                item.explicit,
                item.language,
                item.publisher,
                item.isbn,
                item.asin,
            ],
        )?;
        Ok(())
    }

    /// Plain insert: an id that already exists is a constraint error
    pub fn insert_session(&self, session: &ListeningSessionRow) -> Result<(), StoreError> {
        self.tx.execute(
            r#"INSERT INTO listening_sessions
               (id, user_id, library_item_id, episode_id, device_id,
                display_title, display_author, duration, time_listening,
                start_offset, media_progress, started_at, updated_at,
                date_log, day_of_week)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                session.id,
                session.user_id,
                session.library_item_id,
                session.episode_id,
                session.device_id,
                session.display_title,
                session.display_author,
                session.duration,
                session.time_listening,
                session.start_offset,
                session.media_progress,
                timestamp(session.started_at),
                timestamp(session.updated_at),
                session.date_log,
                session.day_of_week,
            ],
        )?;
        Ok(())
    }

    pub fn commit(self) -> Result<(), StoreError> {
        self.tx.commit()?;
        Ok(())
    }
}

// ============================================
// ROW TYPES
// ============================================

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryBounds {
    pub first_listen: Option<String>,
    pub last_listen: Option<String>,
    pub session_count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineRow {
    pub title: Option<String>,
    pub first_listen: String,
    pub last_listen: String,
    pub session_count: i64,
    pub image_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session(id: &str, item: Option<&str>, started_secs: Option<i64>) -> ListeningSessionRow {
        ListeningSessionRow {
            id: id.to_string(),
            user_id: Some("u1".to_string()),
            library_item_id: item.map(String::from),
            episode_id: None,
            device_id: None,
            display_title: Some(format!("title {}", id)),
            display_author: None,
            duration: Some(3600.0),
            time_listening: Some(60.0),
            start_offset: Some(0.0),
            media_progress: Some(60.0),
            started_at: started_secs.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
            updated_at: None,
            date_log: None,
            day_of_week: None,
        }
    }

    fn item(id: &str, title: &str) -> LibraryItem {
        LibraryItem {
            id: id.to_string(),
            library_id: Some("lib".to_string()),
            media_type: Some("book".to_string()),
            title: Some(title.to_string()),
            subtitle: None,
            author: Some("A, B".to_string()),
            narrators: vec!["N".to_string()],
            description: None,
            genres: vec![],
            release_date: None,
            published_year: Some("2016".to_string()),
            feed_url: None,
            image_url: Some(format!("http://img/{}", id)),
            explicit: Some(false),
            language: None,
            publisher: None,
            isbn: None,
            asin: None,
        }
    }

    fn write(store: &mut SessionStore, row: &ListeningSessionRow, li: Option<&LibraryItem>) {
        let tx = store.begin_record().unwrap();
        if let Some(li) = li {
            tx.upsert_library_item(li).unwrap();
        }
        tx.insert_session(row).unwrap();
        tx.commit().unwrap();
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/history.db");
        let store = SessionStore::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.session_count().unwrap(), 0);

        // reopening keeps the schema idempotent
        drop(store);
        SessionStore::open(&path).unwrap();
    }

    #[test]
    fn test_upserts_are_last_write_wins() {
        let mut store = SessionStore::open_in_memory().unwrap();

        let tx = store.begin_record().unwrap();
        tx.upsert_device(&Device {
            id: "d1".to_string(),
            client_name: Some("Web".to_string()),
            device_name: Some("Firefox".to_string()),
            model: None,
            manufacturer: Some("Mozilla".to_string()),
            client_version: Some("2.6".to_string()),
        })
        .unwrap();
        tx.upsert_user(&User {
            id: "u1".to_string(),
            username: Some("old".to_string()),
        })
        .unwrap();
        tx.commit().unwrap();

        let tx = store.begin_record().unwrap();
        tx.upsert_device(&Device {
            id: "d1".to_string(),
            client_name: Some("App".to_string()),
            device_name: None,
            model: Some("Pixel".to_string()),
            manufacturer: None,
            client_version: Some("2.7".to_string()),
        })
        .unwrap();
        tx.upsert_user(&User {
            id: "u1".to_string(),
            username: Some("new".to_string()),
        })
        .unwrap();
        tx.commit().unwrap();

        let (client, device_name, manufacturer): (String, Option<String>, Option<String>) = store
            .conn
            .query_row(
                "SELECT client_name, device_name, manufacturer FROM devices WHERE id = 'd1'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(client, "App");
        assert_eq!(device_name, None, "full replace, not a merge");
        assert_eq!(manufacturer, None);

        let username: String = store
            .conn
            .query_row("SELECT username FROM users WHERE id = 'u1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(username, "new");
    }

    #[test]
    fn test_library_item_lists_are_json() {
        let mut store = SessionStore::open_in_memory().unwrap();
        let tx = store.begin_record().unwrap();
        tx.upsert_library_item(&item("li1", "Book")).unwrap();
        tx.commit().unwrap();

        let (narrators, genres): (String, String) = store
            .conn
            .query_row(
                "SELECT narrators, genres FROM library_items WHERE id = 'li1'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(narrators, r#"["N"]"#);
        assert_eq!(genres, "[]");
    }

    #[test]
    fn test_duplicate_session_insert_fails() {
        let mut store = SessionStore::open_in_memory().unwrap();
        write(&mut store, &session("s1", None, Some(10)), None);

        let tx = store.begin_record().unwrap();
        assert!(tx.session_exists("s1").unwrap());
        assert!(tx.insert_session(&session("s1", None, Some(20))).is_err());
    }

    #[test]
    fn test_dropped_record_rolls_back() {
        let mut store = SessionStore::open_in_memory().unwrap();
        {
            let tx = store.begin_record().unwrap();
            tx.upsert_library_item(&item("li1", "Book")).unwrap();
            tx.insert_session(&session("s1", Some("li1"), Some(10))).unwrap();
        }
        assert!(!store.session_exists("s1").unwrap());
        let items: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM library_items", [], |r| r.get(0))
            .unwrap();
        assert_eq!(items, 0);
    }

    #[test]
    fn test_session_may_reference_unknown_rows() {
        let mut store = SessionStore::open_in_memory().unwrap();
        let mut row = session("s1", Some("li_unseen"), Some(10));
        row.device_id = Some("dev_unseen".to_string());

        let tx = store.begin_record().unwrap();
        tx.insert_session(&row).unwrap();
        tx.commit().unwrap();

        assert!(store.session_exists("s1").unwrap());
        let users: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
            .unwrap();
        assert_eq!(users, 0);
    }

    #[test]
    fn test_oversized_title_is_rejected() {
        let mut store = SessionStore::open_in_memory().unwrap();
        let mut row = session("s1", None, None);
        row.display_title = Some("x".repeat(2000));

        let tx = store.begin_record().unwrap();
        assert!(matches!(
            tx.insert_session(&row),
            Err(StoreError::Sqlite(_))
        ));
    }

    #[test]
    fn test_truncate_clears_history_only() {
        let mut store = SessionStore::open_in_memory().unwrap();
        let li = item("li1", "Book");
        write(&mut store, &session("s1", Some("li1"), Some(10)), Some(&li));
        write(&mut store, &session("s2", Some("li1"), Some(20)), Some(&li));

        assert_eq!(store.truncate_sessions().unwrap(), 2);
        assert_eq!(store.session_count().unwrap(), 0);
        let items: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM library_items", [], |r| r.get(0))
            .unwrap();
        assert_eq!(items, 1);
    }

    #[test]
    fn test_timeline_groups_by_title() {
        let mut store = SessionStore::open_in_memory().unwrap();
        let a = item("li_a", "Alpha");
        let b = item("li_b", "Beta");
        write(&mut store, &session("s1", Some("li_a"), Some(1_000)), Some(&a));
        write(&mut store, &session("s2", Some("li_a"), Some(3_000)), Some(&a));
        write(&mut store, &session("s3", Some("li_b"), Some(2_000)), Some(&b));
        // no start time: counted nowhere in the timeline bounds
        write(&mut store, &session("s4", Some("li_b"), None), Some(&b));
        // no library item: excluded by the join
        write(&mut store, &session("s5", None, Some(5_000)), None);

        let timeline = store.timeline().unwrap();
        assert_eq!(timeline.len(), 2);

        assert_eq!(timeline[0].title.as_deref(), Some("Alpha"));
        assert_eq!(timeline[0].session_count, 2);
        assert_eq!(timeline[0].first_listen, "1970-01-01T00:16:40.000Z");
        assert_eq!(timeline[0].last_listen, "1970-01-01T00:50:00.000Z");

        assert_eq!(timeline[1].title.as_deref(), Some("Beta"));
        assert_eq!(timeline[1].session_count, 2);
        assert_eq!(timeline[1].image_url.as_deref(), Some("http://img/li_b"));

        let bounds = store.history_bounds().unwrap();
        assert_eq!(bounds.session_count, 5);
        assert_eq!(bounds.first_listen.as_deref(), Some("1970-01-01T00:16:40.000Z"));
        assert_eq!(bounds.last_listen.as_deref(), Some("1970-01-01T01:23:20.000Z"));
    }
}
