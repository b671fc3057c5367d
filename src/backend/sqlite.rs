//! SQLite storage engine.

use crate::admin::StoreStatus;
use crate::backend::{Record, StoreBackend, PAGE_SIZE};
use crate::Location;
use rusqlite::backup::Backup;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension as _};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Pages copied per backup step.
const BACKUP_STEP_PAGES: std::os::raw::c_int = 64;

/// A store backed by a single SQLite database.
///
/// One connection is held for the lifetime of the store, which also keeps
/// in-memory databases alive across calls.
#[derive(Debug)]
pub struct Sqlite {
    location: Location,
    conn: Mutex<Connection>,
}

impl Sqlite {
    /// Open a connection and ensure the schema exists.
    fn open(location: &Location) -> Result<Connection, rusqlite::Error> {
        let conn = match location {
            Location::InMemory => Connection::open_in_memory()?,
            Location::OnDisk { path } => {
                let conn = Connection::open(path)?;
                conn.pragma_update(None, "journal_mode", "WAL")?;
                conn
            }
        };
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key BLOB NOT NULL PRIMARY KEY,
                data BLOB NOT NULL,
                ver INTEGER NOT NULL,
                sum INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS meta (
                name TEXT NOT NULL PRIMARY KEY,
                value INTEGER NOT NULL
            );
            INSERT OR IGNORE INTO meta (name, value) VALUES ('max_version', 0);",
        )?;
        Ok(conn)
    }

    /// Run `f` with the shared connection.
    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> rusqlite::Result<T> {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut conn)
    }
}

impl StoreBackend for Sqlite {
    type Error = rusqlite::Error;

    fn at_location(location: Location) -> Result<Self, Self::Error> {
        let conn = Self::open(&location)?;
        info!(?location, "opened sqlite store");
        Ok(Self {
            location,
            conn: Mutex::new(conn),
        })
    }

    fn location(&self) -> &Location {
        &self.location
    }

    fn get(&self, key: &[u8]) -> Result<Option<Record>, Self::Error> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT data, ver, sum FROM kv WHERE key = ?1",
                [key],
                |row| {
                    Ok(Record {
                        data: row.get(0)?,
                        ver64: row.get::<_, i64>(1)? as u64,
                        sum64: row.get::<_, i64>(2)? as u64,
                    })
                },
            )
            .optional()
        })
    }

    fn set(&self, key: &[u8], data: &[u8], sum64: u64) -> Result<u64, Self::Error> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let _rows = tx.execute(
                "UPDATE meta SET value = value + 1 WHERE name = 'max_version'",
                [],
            )?;
            let ver: i64 = tx.query_row(
                "SELECT value FROM meta WHERE name = 'max_version'",
                [],
                |row| row.get(0),
            )?;
            let _rows = tx.execute(
                "REPLACE INTO kv (key, data, ver, sum) VALUES (?1, ?2, ?3, ?4)",
                params![key, data, ver, sum64 as i64],
            )?;
            tx.commit()?;
            Ok(ver as u64)
        })
    }

    fn delete(&self, key: &[u8]) -> Result<u64, Self::Error> {
        self.with_conn(|conn| {
            let size: Option<i64> = conn
                .query_row("SELECT length(data) FROM kv WHERE key = ?1", [key], |row| {
                    row.get(0)
                })
                .optional()?;
            let _rows = conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
            Ok(size.unwrap_or(0) as u64)
        })
    }

    fn exists(&self, key: &[u8]) -> Result<Option<u64>, Self::Error> {
        self.with_conn(|conn| {
            conn.query_row("SELECT ver FROM kv WHERE key = ?1", [key], |row| {
                row.get::<_, i64>(0).map(|ver| ver as u64)
            })
            .optional()
        })
    }

    fn count(&self, prefix: &[u8]) -> Result<u64, Self::Error> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM kv WHERE substr(key, 1, length(?1)) = ?1",
                [prefix],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    fn list(&self, prefix: &str, pagenum: u32) -> Result<Vec<String>, Self::Error> {
        let offset = (pagenum.max(1) as usize - 1) * PAGE_SIZE;
        self.with_conn(|conn| {
            let mut statement = conn.prepare(
                "SELECT key FROM kv WHERE substr(key, 1, length(?1)) = ?1
                 ORDER BY key LIMIT ?2 OFFSET ?3",
            )?;
            let rows = statement.query_map(
                params![prefix.as_bytes(), PAGE_SIZE as i64, offset as i64],
                |row| row.get::<_, Vec<u8>>(0),
            )?;
            rows.map(|key| key.map(|key| String::from_utf8_lossy(&key).into_owned()))
                .collect()
        })
    }

    fn status(&self) -> Result<StoreStatus, Self::Error> {
        let started = Instant::now();
        self.with_conn(|conn| {
            let key_count: i64 = conn.query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))?;
            let max_version: i64 = conn.query_row(
                "SELECT value FROM meta WHERE name = 'max_version'",
                [],
                |row| row.get(0),
            )?;
            let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
            let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
            Ok(StoreStatus {
                key_count: key_count as u64,
                max_version: max_version as u64,
                db_size: (page_count * page_size) as u64,
                elapse_ms: started.elapsed().as_millis() as u64,
            })
        })
    }

    fn sync(&self) -> Result<(), Self::Error> {
        self.with_conn(|conn| {
            // The checkpoint pragma reports a (busy, log, checkpointed) row;
            // only the side effect matters here.
            let _row = conn
                .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
                .optional()?;
            Ok(())
        })
    }

    fn gc(&self) -> Result<(), Self::Error> {
        self.with_conn(|conn| conn.execute_batch("VACUUM"))
    }

    fn backup(&self, path: &str, since: u64) -> Result<String, Self::Error> {
        self.with_conn(|conn| {
            let mut dst = Connection::open(path)?;
            let backup = Backup::new(conn, &mut dst)?;
            backup.run_to_completion(BACKUP_STEP_PAGES, Duration::ZERO, None)?;
            // `since` only narrows engines with per-version logs; a full copy
            // always covers the requested range.
            debug!(path, since, "backup complete");
            Ok(path.to_owned())
        })
    }

    fn restore(&self, path: &str) -> Result<(), Self::Error> {
        self.with_conn(|conn| {
            let src = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
            let backup = Backup::new(&src, conn)?;
            backup.run_to_completion(BACKUP_STEP_PAGES, Duration::ZERO, None)?;
            debug!(path, "restore complete");
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::checksum::sum64;

    fn store() -> Sqlite {
        Sqlite::at_location(Location::InMemory).unwrap()
    }

    #[test]
    fn versions_are_store_wide_and_monotonic() {
        let store = store();
        assert_eq!(store.set(b"a", b"one", sum64(b"one")).unwrap(), 1);
        assert_eq!(store.set(b"b", b"two", sum64(b"two")).unwrap(), 2);
        // Overwrites also advance the counter.
        assert_eq!(store.set(b"a", b"three", sum64(b"three")).unwrap(), 3);

        let record = store.get(b"a").unwrap().unwrap();
        assert_eq!(record.data, b"three");
        assert_eq!(record.ver64, 3);
        assert_eq!(record.sum64, sum64(b"three"));
    }

    #[test]
    fn delete_reports_size_and_is_idempotent() {
        let store = store();
        let _ver = store.set(b"k", b"hello", sum64(b"hello")).unwrap();
        assert_eq!(store.delete(b"k").unwrap(), 5);
        assert_eq!(store.delete(b"k").unwrap(), 0);
        assert!(store.get(b"k").unwrap().is_none());
        assert!(store.exists(b"k").unwrap().is_none());
    }

    #[test]
    fn count_and_list_match_prefixes() {
        let store = store();
        for key in ["app/a", "app/b", "web/a"] {
            let _ver = store.set(key.as_bytes(), b"x", sum64(b"x")).unwrap();
        }

        assert_eq!(store.count(b"").unwrap(), 3);
        assert_eq!(store.count(b"app/").unwrap(), 2);
        assert_eq!(store.count(b"nothing").unwrap(), 0);

        assert_eq!(store.list("app/", 1).unwrap(), ["app/a", "app/b"]);
        assert_eq!(store.list("", 1).unwrap(), ["app/a", "app/b", "web/a"]);
        // Past the last page the results are empty, signalling the end.
        assert!(store.list("", 2).unwrap().is_empty());
    }

    #[test]
    fn status_reflects_contents() {
        let store = store();
        let _ver = store.set(b"k1", b"v", sum64(b"v")).unwrap();
        let _ver = store.set(b"k2", b"v", sum64(b"v")).unwrap();

        let status = store.status().unwrap();
        assert_eq!(status.key_count, 2);
        assert_eq!(status.max_version, 2);
        assert!(status.db_size > 0);
    }

    #[test]
    fn backup_and_restore_round_trip() {
        let dir = std::env::temp_dir();
        let backup_path = dir.join(format!("sumstore_backup_{}.db", std::process::id()));
        let backup_path = backup_path.to_str().unwrap();
        let _res = std::fs::remove_file(backup_path);

        let source = store();
        let _ver = source.set(b"k", b"payload", sum64(b"payload")).unwrap();
        assert_eq!(source.backup(backup_path, 0).unwrap(), backup_path);

        let target = store();
        target.restore(backup_path).unwrap();
        let record = target.get(b"k").unwrap().unwrap();
        assert_eq!(record.data, b"payload");

        let _res = std::fs::remove_file(backup_path);
    }

    #[test]
    fn sync_and_gc_are_safe_on_any_store() {
        let store = store();
        let _ver = store.set(b"k", b"v", sum64(b"v")).unwrap();
        store.sync().unwrap();
        store.gc().unwrap();
        assert!(store.get(b"k").unwrap().is_some());
    }
}
