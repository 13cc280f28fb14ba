//! Normalized SQLite metadata store.
//!
//! One `series` row per title; genres, tags and characters live in shared
//! lookup tables joined through link tables, while staff, synonyms and URLs
//! are plain child rows. Every child carries a `position` so list order
//! survives a round trip.

use super::MetadataStore;
use crate::catalog::{CoverImage, FuzzyDate, PublicationFormat, SeriesStatus};
use crate::error::{Result, TankobonError};
use crate::metadata::{SeriesMetadata, SeriesRecord, StaffBuckets};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS series (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    local_id TEXT NOT NULL,
    title TEXT NOT NULL UNIQUE,
    url TEXT NOT NULL DEFAULT '',
    source_id TEXT NOT NULL DEFAULT '',
    source_name TEXT NOT NULL DEFAULT '',
    summary TEXT NOT NULL DEFAULT '',
    banner_image TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'UNKNOWN',
    start_year INTEGER NOT NULL DEFAULT 0,
    start_month INTEGER NOT NULL DEFAULT 0,
    start_day INTEGER NOT NULL DEFAULT 0,
    end_year INTEGER NOT NULL DEFAULT 0,
    end_month INTEGER NOT NULL DEFAULT 0,
    end_day INTEGER NOT NULL DEFAULT 0,
    chapters INTEGER NOT NULL DEFAULT 0,
    volumes INTEGER NOT NULL DEFAULT 0,
    publisher TEXT NOT NULL DEFAULT '',
    format TEXT NOT NULL DEFAULT 'UNKNOWN',
    average_score INTEGER NOT NULL DEFAULT 0,
    mean_score INTEGER NOT NULL DEFAULT 0,
    popularity INTEGER NOT NULL DEFAULT 0,
    is_licensed INTEGER NOT NULL DEFAULT 0,
    upstream_updated_at INTEGER NOT NULL DEFAULT 0,
    country TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_series_local_id ON series(local_id);

CREATE TABLE IF NOT EXISTS covers (
    series_id INTEGER PRIMARY KEY REFERENCES series(id) ON DELETE CASCADE,
    extra_large TEXT NOT NULL DEFAULT '',
    large TEXT NOT NULL DEFAULT '',
    medium TEXT NOT NULL DEFAULT '',
    color TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS genres (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS series_genres (
    series_id INTEGER NOT NULL REFERENCES series(id) ON DELETE CASCADE,
    genre_id INTEGER NOT NULL REFERENCES genres(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    PRIMARY KEY (series_id, genre_id)
);

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS series_tags (
    series_id INTEGER NOT NULL REFERENCES series(id) ON DELETE CASCADE,
    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    PRIMARY KEY (series_id, tag_id)
);

CREATE TABLE IF NOT EXISTS characters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS series_characters (
    series_id INTEGER NOT NULL REFERENCES series(id) ON DELETE CASCADE,
    character_id INTEGER NOT NULL REFERENCES characters(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    PRIMARY KEY (series_id, character_id)
);

CREATE TABLE IF NOT EXISTS staff (
    series_id INTEGER NOT NULL REFERENCES series(id) ON DELETE CASCADE,
    role TEXT NOT NULL,
    name TEXT NOT NULL,
    position INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_staff_series ON staff(series_id);

CREATE TABLE IF NOT EXISTS synonyms (
    series_id INTEGER NOT NULL REFERENCES series(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    position INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_synonyms_series ON synonyms(series_id);

CREATE TABLE IF NOT EXISTS urls (
    series_id INTEGER NOT NULL REFERENCES series(id) ON DELETE CASCADE,
    url TEXT NOT NULL,
    position INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_urls_series ON urls(series_id);
"#;

/// Lookup table + link table pairs for list fields shared across series.
struct NamedList {
    table: &'static str,
    link_table: &'static str,
    link_column: &'static str,
}

const GENRES: NamedList = NamedList {
    table: "genres",
    link_table: "series_genres",
    link_column: "genre_id",
};
const TAGS: NamedList = NamedList {
    table: "tags",
    link_table: "series_tags",
    link_column: "tag_id",
};
const CHARACTERS: NamedList = NamedList {
    table: "characters",
    link_table: "series_characters",
    link_column: "character_id",
};

/// Child tables holding one value per row.
const PLAIN_CHILDREN: [(&str, &str); 2] = [("synonyms", "name"), ("urls", "url")];

const STAFF_ROLES: [&str; 4] = ["story", "art", "translation", "lettering"];

/// SQLite-backed [`MetadataStore`].
pub struct SqliteMetadataStore {
    db_path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMetadataStore {
    /// Open or create the store at `db_path`.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| TankobonError::Io {
                    message: format!("Failed to create directory {}", parent.display()),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let conn = Connection::open(&db_path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA busy_timeout=30000;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
            ",
        )?;
        conn.execute_batch(SCHEMA).map_err(|e| TankobonError::Database {
            message: format!("Failed to initialize metadata schema: {}", e),
            source: Some(e),
        })?;

        Ok(Self {
            db_path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| TankobonError::Database {
            message: "Failed to acquire connection lock".to_string(),
            source: None,
        })
    }

    /// Upsert a series and replace all of its child rows in one transaction.
    /// Returns the series row id.
    pub fn upsert(&self, record: &SeriesRecord) -> Result<i64> {
        if record.title.trim().is_empty() {
            return Err(TankobonError::Validation {
                field: "title".to_string(),
                message: "Series title is empty".to_string(),
            });
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let row_id = upsert_series_row(&tx, record)?;
        replace_children(&tx, row_id, &record.metadata)?;
        tx.commit()?;

        debug!("Saved series '{}' as row {}", record.title, row_id);
        Ok(row_id)
    }

    fn load_where(&self, clause: &str, arg: &str) -> Result<Option<SeriesRecord>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT s.id FROM series s WHERE {} ORDER BY s.updated_at DESC, s.id DESC LIMIT 1",
            clause
        );
        let row_id: Option<i64> = conn
            .query_row(&sql, params![arg], |row| row.get(0))
            .optional()?;

        match row_id {
            Some(row_id) => load_series(&conn, row_id).map(Some),
            None => Ok(None),
        }
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn save_series(&self, record: &SeriesRecord) -> Result<()> {
        self.upsert(record).map(|_| ())
    }

    fn find_series_by_name(&self, name: &str) -> Result<Option<SeriesRecord>> {
        let needle = name.trim();
        if needle.is_empty() {
            return Ok(None);
        }
        self.load_where(
            "instr(lower(s.title), lower(?1)) > 0
             OR EXISTS (SELECT 1 FROM synonyms y
                        WHERE y.series_id = s.id AND instr(lower(y.name), lower(?1)) > 0)",
            needle,
        )
    }

    fn get_series_by_id(&self, id: &str) -> Result<Option<SeriesRecord>> {
        self.load_where("s.local_id = ?1", id)
    }

    fn delete_series(&self, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let rows = conn.execute("DELETE FROM series WHERE local_id = ?1", params![id])?;
        if rows > 0 {
            debug!("Deleted series {}", id);
        }
        Ok(rows > 0)
    }

    fn list_series(&self) -> Result<Vec<SeriesRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id FROM series ORDER BY title COLLATE NOCASE")?;
        let ids: Vec<i64> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        drop(stmt);

        ids.into_iter().map(|id| load_series(&conn, id)).collect()
    }
}

fn upsert_series_row(tx: &Transaction<'_>, record: &SeriesRecord) -> Result<i64> {
    let m = &record.metadata;
    let now = Utc::now().timestamp_millis();

    let row_id = tx.query_row(
        "INSERT INTO series (
            local_id, title, url, source_id, source_name, summary, banner_image, status,
            start_year, start_month, start_day, end_year, end_month, end_day,
            chapters, volumes, publisher, format, average_score, mean_score, popularity,
            is_licensed, upstream_updated_at, country, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                   ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?25)
         ON CONFLICT(title) DO UPDATE SET
            local_id=excluded.local_id,
            url=excluded.url,
            source_id=excluded.source_id,
            source_name=excluded.source_name,
            summary=excluded.summary,
            banner_image=excluded.banner_image,
            status=excluded.status,
            start_year=excluded.start_year,
            start_month=excluded.start_month,
            start_day=excluded.start_day,
            end_year=excluded.end_year,
            end_month=excluded.end_month,
            end_day=excluded.end_day,
            chapters=excluded.chapters,
            volumes=excluded.volumes,
            publisher=excluded.publisher,
            format=excluded.format,
            average_score=excluded.average_score,
            mean_score=excluded.mean_score,
            popularity=excluded.popularity,
            is_licensed=excluded.is_licensed,
            upstream_updated_at=excluded.upstream_updated_at,
            country=excluded.country,
            updated_at=excluded.updated_at
         RETURNING id",
        params![
            record.id,
            record.title,
            record.url,
            record.source_id,
            record.source_name,
            m.summary,
            m.banner_image,
            m.status.as_str(),
            m.start_date.year,
            m.start_date.month,
            m.start_date.day,
            m.end_date.year,
            m.end_date.month,
            m.end_date.day,
            m.chapters,
            m.volumes,
            m.publisher,
            m.format.as_str(),
            m.average_score,
            m.mean_score,
            m.popularity,
            m.is_licensed,
            m.updated_at,
            m.country,
            now,
        ],
        |row| row.get(0),
    )?;

    Ok(row_id)
}

fn replace_children(tx: &Transaction<'_>, row_id: i64, m: &SeriesMetadata) -> Result<()> {
    for table in [
        "covers",
        GENRES.link_table,
        TAGS.link_table,
        CHARACTERS.link_table,
        "staff",
        "synonyms",
        "urls",
    ] {
        tx.execute(
            &format!("DELETE FROM {} WHERE series_id = ?1", table),
            params![row_id],
        )?;
    }

    if !m.cover.is_empty() {
        tx.execute(
            "INSERT INTO covers (series_id, extra_large, large, medium, color)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                row_id,
                m.cover.extra_large,
                m.cover.large,
                m.cover.medium,
                m.cover.color
            ],
        )?;
    }

    insert_named(tx, &GENRES, row_id, &m.genres)?;
    insert_named(tx, &TAGS, row_id, &m.tags)?;
    insert_named(tx, &CHARACTERS, row_id, &m.characters)?;

    let staff = &m.staff;
    for (role, names) in STAFF_ROLES.iter().zip([
        &staff.story,
        &staff.art,
        &staff.translation,
        &staff.lettering,
    ]) {
        for (position, name) in names.iter().enumerate() {
            tx.execute(
                "INSERT INTO staff (series_id, role, name, position) VALUES (?1, ?2, ?3, ?4)",
                params![row_id, role, name, position as i64],
            )?;
        }
    }

    for ((table, column), values) in PLAIN_CHILDREN.iter().zip([&m.synonyms, &m.urls]) {
        let sql = format!(
            "INSERT INTO {} (series_id, {}, position) VALUES (?1, ?2, ?3)",
            table, column
        );
        for (position, value) in values.iter().enumerate() {
            tx.execute(&sql, params![row_id, value, position as i64])?;
        }
    }

    Ok(())
}

fn insert_named(tx: &Transaction<'_>, list: &NamedList, row_id: i64, names: &[String]) -> Result<()> {
    let upsert_name = format!(
        "INSERT INTO {} (name) VALUES (?1)
         ON CONFLICT(name) DO UPDATE SET name = excluded.name
         RETURNING id",
        list.table
    );
    let link = format!(
        "INSERT OR IGNORE INTO {} (series_id, {}, position) VALUES (?1, ?2, ?3)",
        list.link_table, list.link_column
    );

    for (position, name) in names.iter().enumerate() {
        let name_id: i64 = tx.query_row(&upsert_name, params![name], |row| row.get(0))?;
        tx.execute(&link, params![row_id, name_id, position as i64])?;
    }
    Ok(())
}

fn load_named(conn: &Connection, list: &NamedList, row_id: i64) -> Result<Vec<String>> {
    let sql = format!(
        "SELECT n.name FROM {link} l JOIN {table} n ON n.id = l.{column}
         WHERE l.series_id = ?1 ORDER BY l.position",
        link = list.link_table,
        table = list.table,
        column = list.link_column
    );
    load_strings(conn, &sql, row_id)
}

fn load_strings(conn: &Connection, sql: &str, row_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let values = stmt
        .query_map(params![row_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(values)
}

fn load_series(conn: &Connection, row_id: i64) -> Result<SeriesRecord> {
    let mut record = conn.query_row(
        "SELECT local_id, title, url, source_id, source_name, summary, banner_image, status,
                start_year, start_month, start_day, end_year, end_month, end_day,
                chapters, volumes, publisher, format, average_score, mean_score, popularity,
                is_licensed, upstream_updated_at, country
         FROM series WHERE id = ?1",
        params![row_id],
        |row| {
            let status: String = row.get(7)?;
            let format: String = row.get(17)?;
            Ok(SeriesRecord {
                id: row.get(0)?,
                title: row.get(1)?,
                url: row.get(2)?,
                source_id: row.get(3)?,
                source_name: row.get(4)?,
                metadata: SeriesMetadata {
                    summary: row.get(5)?,
                    banner_image: row.get(6)?,
                    status: SeriesStatus::from_str(&status),
                    start_date: FuzzyDate {
                        year: row.get(8)?,
                        month: row.get(9)?,
                        day: row.get(10)?,
                    },
                    end_date: FuzzyDate {
                        year: row.get(11)?,
                        month: row.get(12)?,
                        day: row.get(13)?,
                    },
                    chapters: row.get(14)?,
                    volumes: row.get(15)?,
                    publisher: row.get(16)?,
                    format: PublicationFormat::from_str(&format),
                    average_score: row.get(18)?,
                    mean_score: row.get(19)?,
                    popularity: row.get(20)?,
                    is_licensed: row.get(21)?,
                    updated_at: row.get(22)?,
                    country: row.get(23)?,
                    ..Default::default()
                },
            })
        },
    )?;

    let m = &mut record.metadata;
    m.cover = conn
        .query_row(
            "SELECT extra_large, large, medium, color FROM covers WHERE series_id = ?1",
            params![row_id],
            |row| {
                Ok(CoverImage {
                    extra_large: row.get(0)?,
                    large: row.get(1)?,
                    medium: row.get(2)?,
                    color: row.get(3)?,
                })
            },
        )
        .optional()?
        .unwrap_or_default();

    m.genres = load_named(conn, &GENRES, row_id)?;
    m.tags = load_named(conn, &TAGS, row_id)?;
    m.characters = load_named(conn, &CHARACTERS, row_id)?;

    let mut staff = StaffBuckets::default();
    let mut stmt =
        conn.prepare("SELECT role, name FROM staff WHERE series_id = ?1 ORDER BY role, position")?;
    let rows = stmt.query_map(params![row_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (role, name) = row?;
        match role.as_str() {
            "story" => staff.story.push(name),
            "art" => staff.art.push(name),
            "translation" => staff.translation.push(name),
            "lettering" => staff.lettering.push(name),
            _ => {}
        }
    }
    m.staff = staff;

    m.synonyms = load_strings(
        conn,
        "SELECT name FROM synonyms WHERE series_id = ?1 ORDER BY position",
        row_id,
    )?;
    m.urls = load_strings(
        conn,
        "SELECT url FROM urls WHERE series_id = ?1 ORDER BY position",
        row_id,
    )?;

    Ok(record)
}
