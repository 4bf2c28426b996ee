//! Explicit store handle.
//!
//! # Responsibility
//! - Own the SQLite connection of one store instance from open to close.
//! - Hand out services bound to that connection.
//!
//! # Invariants
//! - No process-global store exists; independent handles never share rows
//!   unless they open the same file.

use crate::db::{open_db, open_db_in_memory, DbError, DbResult};
use crate::repo::object_repo::{RepoResult, SqliteObjectRepository};
use crate::service::object_service::ObjectService;
use log::info;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// Environment variable naming the store file.
pub const DB_PATH_ENV: &str = "VOBJGRAPH_DB_PATH";
pub const DEFAULT_DB_FILE_NAME: &str = "vobjgraph.sqlite3";

/// Store file used when nothing else is configured.
pub fn default_db_path() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_DB_FILE_NAME)
}

/// Picks the store file: `explicit` first, then a non-blank `env_value`
/// (the value of [`DB_PATH_ENV`]), then [`default_db_path`].
pub fn resolve_db_path(explicit: Option<PathBuf>, env_value: Option<String>) -> PathBuf {
    explicit
        .or_else(|| {
            env_value
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(default_db_path)
}

/// One open real object store.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (or creates) a store file.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self {
            conn: open_db(path)?,
        })
    }

    /// Opens an isolated in-memory store.
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self {
            conn: open_db_in_memory()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Returns a service bound to this store.
    pub fn service(&self) -> RepoResult<ObjectService<SqliteObjectRepository<'_>>> {
        Ok(ObjectService::new(SqliteObjectRepository::try_new(
            &self.conn,
        )?))
    }

    /// Closes the store, flushing the connection.
    pub fn close(self) -> DbResult<()> {
        self.conn.close().map_err(|(_, err)| DbError::Sqlite(err))?;
        info!("event=db_close module=db status=ok");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{default_db_path, resolve_db_path};
    use std::path::PathBuf;

    #[test]
    fn explicit_path_wins_over_environment() {
        let path = PathBuf::from("/tmp/explicit.db");
        let resolved = resolve_db_path(Some(path.clone()), Some("/tmp/env.db".to_string()));
        assert_eq!(resolved, path);
    }

    #[test]
    fn environment_value_is_trimmed() {
        let resolved = resolve_db_path(None, Some(" /tmp/env.db ".to_string()));
        assert_eq!(resolved, PathBuf::from("/tmp/env.db"));
    }

    #[test]
    fn blank_environment_value_falls_back_to_default() {
        assert_eq!(resolve_db_path(None, Some("  ".to_string())), default_db_path());
        assert_eq!(resolve_db_path(None, None), default_db_path());
    }
}
