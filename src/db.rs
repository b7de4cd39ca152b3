use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::parser::entry::ProvenanceFields;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS snapshots (
            id          INTEGER PRIMARY KEY,
            repo        TEXT NOT NULL,
            readme      TEXT,
            stars       INTEGER,
            forks       INTEGER,
            updated_at  TEXT,
            language    TEXT,
            error       TEXT,
            latency_ms  INTEGER,
            fetched_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_snapshots_repo ON snapshots(repo, id);

        CREATE TABLE IF NOT EXISTS builds (
            id           INTEGER PRIMARY KEY,
            generated_at TEXT NOT NULL,
            total_count  INTEGER NOT NULL,
            skipped      INTEGER NOT NULL,
            output_path  TEXT NOT NULL,
            built_at     TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

// ── Fetching ──

pub struct SnapshotRow {
    pub repo: String,
    pub readme: Option<String>,
    pub provenance: ProvenanceFields,
    pub error: Option<String>,
    pub latency_ms: Option<i64>,
}

pub fn save_snapshot(conn: &Connection, row: &SnapshotRow) -> Result<()> {
    conn.execute(
        "INSERT INTO snapshots (repo, readme, stars, forks, updated_at, language, error, latency_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            row.repo,
            row.readme,
            row.provenance.stars,
            row.provenance.forks,
            row.provenance.updated_at,
            row.provenance.language,
            row.error,
            row.latency_ms,
        ],
    )?;
    Ok(())
}

// ── Building ──

pub struct Snapshot {
    pub readme: Option<String>,
    pub provenance: ProvenanceFields,
}

/// Newest snapshot for `repo`, if it was ever fetched.
pub fn latest_snapshot(conn: &Connection, repo: &str) -> Result<Option<Snapshot>> {
    let snapshot = conn
        .query_row(
            "SELECT readme, stars, forks, updated_at, language
             FROM snapshots WHERE repo = ?1 ORDER BY id DESC LIMIT 1",
            params![repo],
            |row| {
                Ok(Snapshot {
                    readme: row.get(0)?,
                    provenance: ProvenanceFields {
                        stars: row.get(1)?,
                        forks: row.get(2)?,
                        updated_at: row.get(3)?,
                        language: row.get(4)?,
                    },
                })
            },
        )
        .optional()?;
    Ok(snapshot)
}

pub struct BuildRow {
    pub generated_at: String,
    pub total_count: usize,
    pub skipped: usize,
    pub output_path: String,
}

pub fn record_build(conn: &Connection, row: &BuildRow) -> Result<()> {
    conn.execute(
        "INSERT INTO builds (generated_at, total_count, skipped, output_path)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            row.generated_at,
            row.total_count as i64,
            row.skipped as i64,
            row.output_path,
        ],
    )?;
    Ok(())
}

// ── Stats ──

pub struct Stats {
    pub snapshots: i64,
    pub repos: i64,
    pub with_readme: i64,
    pub errors: i64,
    pub last_build: Option<BuildRow>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let (snapshots, repos, with_readme, errors): (i64, i64, i64, i64) = conn.query_row(
        "SELECT COUNT(*),
                COUNT(DISTINCT repo),
                COALESCE(SUM(readme IS NOT NULL), 0),
                COALESCE(SUM(error IS NOT NULL), 0)
         FROM snapshots",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )?;
    let last_build = conn
        .query_row(
            "SELECT generated_at, total_count, skipped, output_path
             FROM builds ORDER BY id DESC LIMIT 1",
            [],
            |row| {
                Ok(BuildRow {
                    generated_at: row.get(0)?,
                    total_count: row.get::<_, i64>(1)? as usize,
                    skipped: row.get::<_, i64>(2)? as usize,
                    output_path: row.get(3)?,
                })
            },
        )
        .optional()?;

    Ok(Stats {
        snapshots,
        repos,
        with_readme,
        errors,
        last_build,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn row(repo: &str, readme: Option<&str>, stars: Option<i64>) -> SnapshotRow {
        SnapshotRow {
            repo: repo.to_string(),
            readme: readme.map(str::to_string),
            provenance: ProvenanceFields {
                stars,
                ..Default::default()
            },
            error: if readme.is_none() { Some("404".into()) } else { None },
            latency_ms: Some(12),
        }
    }

    #[test]
    fn latest_snapshot_wins() {
        let conn = memory_db();
        save_snapshot(&conn, &row("me/a", Some("old"), Some(1))).unwrap();
        save_snapshot(&conn, &row("me/a", Some("new"), Some(2))).unwrap();
        save_snapshot(&conn, &row("me/b", Some("other"), None)).unwrap();

        let snap = latest_snapshot(&conn, "me/a").unwrap().unwrap();
        assert_eq!(snap.readme.as_deref(), Some("new"));
        assert_eq!(snap.provenance.stars, Some(2));
        assert_eq!(snap.provenance.language, None);
    }

    #[test]
    fn unknown_repo_has_no_snapshot() {
        let conn = memory_db();
        assert!(latest_snapshot(&conn, "me/none").unwrap().is_none());
    }

    #[test]
    fn failed_fetch_shadows_earlier_readme() {
        let conn = memory_db();
        save_snapshot(&conn, &row("me/a", Some("readme"), None)).unwrap();
        save_snapshot(&conn, &row("me/a", None, None)).unwrap();
        let snap = latest_snapshot(&conn, "me/a").unwrap().unwrap();
        assert!(snap.readme.is_none());
    }

    #[test]
    fn stats_and_last_build() {
        let conn = memory_db();
        let empty = get_stats(&conn).unwrap();
        assert_eq!(empty.snapshots, 0);
        assert!(empty.last_build.is_none());

        save_snapshot(&conn, &row("me/a", Some("x"), None)).unwrap();
        save_snapshot(&conn, &row("me/a", None, None)).unwrap();
        save_snapshot(&conn, &row("me/b", Some("y"), None)).unwrap();
        record_build(
            &conn,
            &BuildRow {
                generated_at: "2025-04-01T09:30:00+09:00".into(),
                total_count: 2,
                skipped: 1,
                output_path: "projects.json".into(),
            },
        )
        .unwrap();

        let s = get_stats(&conn).unwrap();
        assert_eq!((s.snapshots, s.repos, s.with_readme, s.errors), (3, 2, 2, 1));
        let build = s.last_build.unwrap();
        assert_eq!(build.total_count, 2);
        assert_eq!(build.skipped, 1);
    }
}
