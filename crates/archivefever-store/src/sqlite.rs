//! SQLite backend
//!
//! ## Tables
//!
//! - `thoughts` - content, type, metadata JSON, connections JSON
//! - `identity_history` - append-only identity log
//! - `crystallized_works` - long-form works and their publication URL
//! - `discovered_texts` - ingested source texts awaiting analysis
//! - `research_requests` - escalations, with `research_comments` and
//!   `research_uploads` keyed by request id
//!
//! Rows are ordered by an integer `seq` so newest-first reads do not depend
//! on timestamp resolution.

use crate::error::{StoreError, StoreResult};
use crate::store::{new_id, next_timestamp, non_blank, NewCrystallizedWork, NewUpload, Store, DEFAULT_COMMENT_AUTHOR};
use archivefever_core::{
    AnalysisStatus, CrystallizedWork, DiscoveredTextSummary, Identity, NewThought, RequestKind,
    RequestStatus, ResearchRequest, ResearchRequestRow, TextCandidate, Thought,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS thoughts (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    content TEXT NOT NULL,
    type TEXT NOT NULL,
    metadata TEXT NOT NULL,
    connections TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS identity_history (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    rationale TEXT NOT NULL,
    previous_name TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS crystallized_works (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    abstract TEXT NOT NULL,
    type TEXT NOT NULL,
    origin_entry_id TEXT NOT NULL,
    substack_url TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS discovered_texts (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    author TEXT NOT NULL,
    content TEXT NOT NULL,
    source TEXT NOT NULL,
    url TEXT,
    discovered_for TEXT NOT NULL,
    discovered_at TEXT NOT NULL,
    analysis_status TEXT NOT NULL DEFAULT 'pending'
);

CREATE TABLE IF NOT EXISTS research_requests (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    query TEXT NOT NULL,
    type TEXT NOT NULL,
    status TEXT NOT NULL,
    message TEXT NOT NULL,
    created TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS research_comments (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    request_id TEXT NOT NULL REFERENCES research_requests(id),
    author_name TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS research_uploads (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    request_id TEXT NOT NULL REFERENCES research_requests(id),
    title TEXT NOT NULL,
    author TEXT NOT NULL,
    content TEXT NOT NULL,
    uploaded_by TEXT NOT NULL,
    uploaded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_comments_request ON research_comments(request_id);
CREATE INDEX IF NOT EXISTS idx_uploads_request ON research_uploads(request_id);
"#;

struct Inner {
    conn: Connection,
    last_ts: DateTime<Utc>,
}

/// SQLite database holding every relation
pub struct SqliteStore {
    inner: Mutex<Inner>,
}

impl SqliteStore {
    /// Open or create the database file
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        info!("Opening SQLite database at {:?}", path);

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("Opening in-memory SQLite database");
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        init_schema(&conn)?;
        Ok(Self {
            inner: Mutex::new(Inner {
                conn,
                last_ts: DateTime::<Utc>::default(),
            }),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Internal(format!("Lock poisoned: {}", e)))
    }

    fn request_exists(conn: &Connection, request_id: &str) -> StoreResult<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT seq FROM research_requests WHERE id = ?1",
                [request_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn read_current_identity(&self) -> StoreResult<Option<Identity>> {
        let inner = self.lock()?;
        let identity = inner
            .conn
            .query_row(
                "SELECT id, name, rationale, previous_name, created_at
                 FROM identity_history ORDER BY seq DESC LIMIT 1",
                [],
                identity_from_row,
            )
            .optional()?;
        Ok(identity)
    }
}

fn init_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;
    let current: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()?;

    match current {
        None => {
            info!("Creating new database schema v{}", SCHEMA_VERSION);
            conn.execute_batch(SCHEMA)?;
            conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [SCHEMA_VERSION])?;
        }
        Some(v) if v < SCHEMA_VERSION => {
            warn!("Schema v{} is older than v{}; applying current schema", v, SCHEMA_VERSION);
            conn.execute_batch(SCHEMA)?;
            conn.execute("UPDATE schema_version SET version = ?1", [SCHEMA_VERSION])?;
        }
        Some(v) => debug!("Database schema is up to date (v{})", v),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn conversion_error(idx: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn ts_at(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn parsed_at<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = archivefever_core::Error>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn json_at<T: serde::de::DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn thought_from_row(row: &Row) -> rusqlite::Result<Thought> {
    Ok(Thought {
        id: row.get(0)?,
        content: row.get(1)?,
        kind: parsed_at(row, 2)?,
        metadata: json_at(row, 3)?,
        connections: json_at(row, 4)?,
        timestamp: ts_at(row, 5)?,
    })
}

fn identity_from_row(row: &Row) -> rusqlite::Result<Identity> {
    Ok(Identity {
        id: row.get(0)?,
        name: row.get(1)?,
        rationale: row.get(2)?,
        previous_name: row.get(3)?,
        created_at: ts_at(row, 4)?,
    })
}

fn work_from_row(row: &Row) -> rusqlite::Result<CrystallizedWork> {
    Ok(CrystallizedWork {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        summary: row.get(3)?,
        kind: parsed_at(row, 4)?,
        origin_entry_id: row.get(5)?,
        substack_url: row.get(6)?,
        timestamp: ts_at(row, 7)?,
    })
}

fn text_summary_from_row(row: &Row) -> rusqlite::Result<DiscoveredTextSummary> {
    let length: i64 = row.get(8)?;
    Ok(DiscoveredTextSummary {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        source: row.get(3)?,
        url: row.get(4)?,
        discovered_for: row.get(5)?,
        discovered_at: ts_at(row, 6)?,
        analysis_status: parsed_at::<AnalysisStatus>(row, 7)?,
        content_length: length.max(0) as usize,
    })
}

fn request_row_from_row(row: &Row) -> rusqlite::Result<ResearchRequestRow> {
    let status: String = row.get(3)?;
    let comments: i64 = row.get(6)?;
    let uploads: i64 = row.get(7)?;
    Ok(ResearchRequestRow {
        request: ResearchRequest {
            id: row.get(0)?,
            query: row.get(1)?,
            kind: RequestKind::TextRequest,
            status: if status == RequestStatus::Resolved.as_str() {
                RequestStatus::Resolved
            } else {
                RequestStatus::Pending
            },
            message: row.get(4)?,
            created: ts_at(row, 5)?,
        },
        comment_count: comments.max(0) as usize,
        upload_count: uploads.max(0) as usize,
    })
}

#[async_trait]
impl Store for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append_thought(&self, thought: NewThought) -> StoreResult<String> {
        let metadata = serde_json::to_string(&thought.metadata)?;
        let connections = serde_json::to_string(&thought.connections)?;
        let mut inner = self.lock()?;
        let id = new_id();
        let ts = next_timestamp(&mut inner.last_ts);
        inner.conn.execute(
            "INSERT INTO thoughts (id, content, type, metadata, connections, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, thought.content, thought.kind.as_str(), metadata, connections, ts.to_rfc3339()],
        )?;
        debug!("Appended thought {}", id);
        Ok(id)
    }

    async fn recent_thoughts(&self, limit: usize, offset: usize) -> StoreResult<Vec<Thought>> {
        let inner = self.lock()?;
        let mut stmt = inner.conn.prepare(
            "SELECT id, content, type, metadata, connections, timestamp
             FROM thoughts ORDER BY seq DESC LIMIT ?1 OFFSET ?2",
        )?;
        // SQLite reads a negative LIMIT as unbounded and a negative OFFSET as zero.
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![limit, offset], thought_from_row)?;
        let thoughts = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(thoughts)
    }

    async fn count_thoughts(&self) -> StoreResult<usize> {
        let inner = self.lock()?;
        let n: i64 = inner.conn.query_row("SELECT COUNT(*) FROM thoughts", [], |row| row.get(0))?;
        Ok(n.max(0) as usize)
    }

    async fn current_identity(&self) -> Identity {
        match self.read_current_identity() {
            Ok(Some(identity)) => identity,
            Ok(None) => Identity::seed(),
            Err(e) => {
                warn!("Failed to read current identity, using seed: {}", e);
                Identity::seed()
            }
        }
    }

    async fn append_identity(
        &self,
        name: &str,
        rationale: &str,
        previous_name: Option<&str>,
    ) -> StoreResult<String> {
        let mut inner = self.lock()?;
        let id = new_id();
        let ts = next_timestamp(&mut inner.last_ts);
        inner.conn.execute(
            "INSERT INTO identity_history (id, name, rationale, previous_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, name, rationale, previous_name, ts.to_rfc3339()],
        )?;
        Ok(id)
    }

    async fn identity_history(&self) -> StoreResult<Vec<Identity>> {
        let inner = self.lock()?;
        let mut stmt = inner.conn.prepare(
            "SELECT id, name, rationale, previous_name, created_at
             FROM identity_history ORDER BY seq DESC",
        )?;
        let rows = stmt.query_map([], identity_from_row)?;
        let history = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(history)
    }

    async fn append_crystallized_work(&self, work: NewCrystallizedWork) -> StoreResult<String> {
        let mut inner = self.lock()?;
        let id = new_id();
        let ts = next_timestamp(&mut inner.last_ts);
        inner.conn.execute(
            "INSERT INTO crystallized_works
             (id, title, content, abstract, type, origin_entry_id, substack_url, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                work.title,
                work.content,
                work.summary,
                work.kind.as_str(),
                work.origin_entry_id,
                work.substack_url,
                ts.to_rfc3339()
            ],
        )?;
        Ok(id)
    }

    async fn crystallized_works(&self) -> StoreResult<Vec<CrystallizedWork>> {
        let inner = self.lock()?;
        let mut stmt = inner.conn.prepare(
            "SELECT id, title, content, abstract, type, origin_entry_id, substack_url, timestamp
             FROM crystallized_works ORDER BY seq DESC",
        )?;
        let rows = stmt.query_map([], work_from_row)?;
        let works = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(works)
    }

    async fn append_discovered_text(
        &self,
        candidate: &TextCandidate,
        content: &str,
        context: &str,
    ) -> StoreResult<String> {
        let mut inner = self.lock()?;
        let id = new_id();
        let ts = next_timestamp(&mut inner.last_ts);
        inner.conn.execute(
            "INSERT INTO discovered_texts
             (id, title, author, content, source, url, discovered_for, discovered_at, analysis_status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                candidate.title,
                candidate.author,
                content,
                candidate.source,
                non_blank(Some(candidate.url.as_str())),
                context,
                ts.to_rfc3339(),
                AnalysisStatus::Pending.as_str()
            ],
        )?;
        Ok(id)
    }

    async fn list_discovered_texts(&self) -> StoreResult<Vec<DiscoveredTextSummary>> {
        let inner = self.lock()?;
        let mut stmt = inner.conn.prepare(
            "SELECT id, title, author, source, url, discovered_for, discovered_at,
                    analysis_status, length(content)
             FROM discovered_texts ORDER BY seq DESC",
        )?;
        let rows = stmt.query_map([], text_summary_from_row)?;
        let texts = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(texts)
    }

    async fn append_research_request(&self, request: &ResearchRequest) -> StoreResult<String> {
        let inner = self.lock()?;
        inner.conn.execute(
            "INSERT INTO research_requests (id, query, type, status, message, created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                request.id,
                request.query,
                "text_request",
                request.status.as_str(),
                request.message,
                request.created.to_rfc3339()
            ],
        )?;
        Ok(request.id.clone())
    }

    async fn list_research_requests_with_counts(&self) -> StoreResult<Vec<ResearchRequestRow>> {
        let inner = self.lock()?;
        let mut stmt = inner.conn.prepare(
            "SELECT r.id, r.query, r.type, r.status, r.message, r.created,
                    (SELECT COUNT(*) FROM research_comments c WHERE c.request_id = r.id),
                    (SELECT COUNT(*) FROM research_uploads u WHERE u.request_id = r.id)
             FROM research_requests r ORDER BY r.seq DESC",
        )?;
        let rows = stmt.query_map([], request_row_from_row)?;
        let requests = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(requests)
    }

    async fn append_comment(
        &self,
        request_id: &str,
        author: Option<&str>,
        content: &str,
    ) -> StoreResult<String> {
        let mut inner = self.lock()?;
        if !Self::request_exists(&inner.conn, request_id)? {
            return Err(StoreError::NotFound(format!("research request {}", request_id)));
        }
        let id = new_id();
        let ts = next_timestamp(&mut inner.last_ts);
        inner.conn.execute(
            "INSERT INTO research_comments (id, request_id, author_name, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                request_id,
                non_blank(author).unwrap_or(DEFAULT_COMMENT_AUTHOR),
                content,
                ts.to_rfc3339()
            ],
        )?;
        Ok(id)
    }

    async fn append_upload(&self, request_id: &str, upload: &NewUpload) -> StoreResult<String> {
        let mut inner = self.lock()?;
        if !Self::request_exists(&inner.conn, request_id)? {
            return Err(StoreError::NotFound(format!("research request {}", request_id)));
        }
        let id = new_id();
        let ts = next_timestamp(&mut inner.last_ts);
        inner.conn.execute(
            "INSERT INTO research_uploads
             (id, request_id, title, author, content, uploaded_by, uploaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                request_id,
                upload.title,
                upload.author(),
                upload.content,
                upload.uploader(),
                ts.to_rfc3339()
            ],
        )?;
        Ok(id)
    }
}
