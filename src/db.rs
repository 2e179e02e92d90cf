//! Raw-document cache. Every fetched page or PDF is stored once under a
//! stable document id and never re-fetched until the cache is cleared.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open cache {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            doc_id     TEXT PRIMARY KEY,
            url        TEXT NOT NULL,
            final_url  TEXT NOT NULL,
            status     INTEGER NOT NULL,
            body       BLOB NOT NULL,
            sha256     TEXT NOT NULL,
            bytes      INTEGER NOT NULL,
            fetched_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS detail_urls (
            id         INTEGER PRIMARY KEY,
            url        TEXT UNIQUE NOT NULL,
            cipid      TEXT,
            visited    BOOLEAN NOT NULL DEFAULT 0,
            visited_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_detail_urls_visited ON detail_urls(visited);
        ",
    )?;
    Ok(())
}

// ── Documents ──

/// Stable cache keys, one per logical document.
pub mod doc_id {
    pub const NCES_BROWSE: &str = "nces:browse";
    pub const DHS_PDF: &str = "dhs:pdf";

    pub fn nces_detail(cipid: &str) -> String {
        format!("nces:detail:{cipid}")
    }

    pub fn nces_search(cip: &str) -> String {
        format!("nces:search:{cip}")
    }
}

#[derive(Debug, Clone)]
pub struct CachedDoc {
    pub doc_id: String,
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub body: Vec<u8>,
    pub sha256: String,
    pub fetched_at: String,
}

impl CachedDoc {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub fn get_document(conn: &Connection, doc_id: &str) -> Result<Option<CachedDoc>> {
    let doc = conn
        .query_row(
            "SELECT doc_id, url, final_url, status, body, sha256, fetched_at
             FROM documents WHERE doc_id = ?1",
            params![doc_id],
            |row| {
                Ok(CachedDoc {
                    doc_id: row.get(0)?,
                    url: row.get(1)?,
                    final_url: row.get(2)?,
                    status: row.get(3)?,
                    body: row.get(4)?,
                    sha256: row.get(5)?,
                    fetched_at: row.get(6)?,
                })
            },
        )
        .optional()?;
    Ok(doc)
}

pub fn save_document(conn: &Connection, doc: &CachedDoc) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO documents
             (doc_id, url, final_url, status, body, sha256, bytes, fetched_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            doc.doc_id,
            doc.url,
            doc.final_url,
            doc.status,
            doc.body,
            doc.sha256,
            doc.body.len() as i64,
            doc.fetched_at,
        ],
    )?;
    Ok(())
}

/// Drop cached documents, all of them or those whose id starts with `prefix`.
/// Clearing NCES detail pages also resets the detail queue.
pub fn clear_documents(conn: &Connection, prefix: Option<&str>) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let removed = match prefix {
        Some(p) => tx.execute(
            "DELETE FROM documents WHERE substr(doc_id, 1, length(?1)) = ?1",
            params![p],
        )?,
        None => tx.execute("DELETE FROM documents", [])?,
    };
    let resets_queue = prefix.map_or(true, |p| doc_id::nces_detail("").starts_with(p));
    if resets_queue {
        tx.execute("UPDATE detail_urls SET visited = 0, visited_at = NULL", [])?;
    }
    tx.commit()?;
    Ok(removed)
}

// ── Detail URL queue ──

pub fn insert_detail_urls(conn: &Connection, urls: &[(String, Option<String>)]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare("INSERT OR IGNORE INTO detail_urls (url, cipid) VALUES (?1, ?2)")?;
        for (url, cipid) in urls {
            count += stmt.execute(params![url, cipid])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn mark_visited(conn: &Connection, url: &str) -> Result<()> {
    conn.execute(
        "UPDATE detail_urls SET visited = 1, visited_at = datetime('now') WHERE url = ?1",
        params![url],
    )?;
    Ok(())
}

// ── Stats ──

pub struct Stats {
    pub documents: usize,
    pub bytes: u64,
    pub detail_urls: usize,
    pub visited: usize,
    pub unvisited: usize,
    /// Document count per id prefix (`nces:detail`, `dhs:pdf`, ...).
    pub by_kind: Vec<(String, usize)>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let documents: usize = conn.query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))?;
    let bytes: i64 =
        conn.query_row("SELECT COALESCE(SUM(bytes), 0) FROM documents", [], |r| r.get(0))?;
    let detail_urls: usize =
        conn.query_row("SELECT COUNT(*) FROM detail_urls", [], |r| r.get(0))?;
    let visited: usize = conn.query_row(
        "SELECT COUNT(*) FROM detail_urls WHERE visited = 1",
        [],
        |r| r.get(0),
    )?;

    let mut stmt = conn.prepare("SELECT doc_id FROM documents")?;
    let mut by_kind: Vec<(String, usize)> = Vec::new();
    for id in stmt.query_map([], |r| r.get::<_, String>(0))? {
        let id = id?;
        let kind = match id.rsplit_once(':') {
            Some((kind, _)) if kind.contains(':') => kind.to_string(),
            _ => id,
        };
        match by_kind.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, n)) => *n += 1,
            None => by_kind.push((kind, 1)),
        }
    }
    by_kind.sort();

    Ok(Stats {
        documents,
        bytes: bytes.max(0) as u64,
        detail_urls,
        visited,
        unvisited: detail_urls - visited,
        by_kind,
    })
}
