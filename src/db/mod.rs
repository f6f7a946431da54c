//! Library database handle.
//!
//! A single SQLite database holds the whole catalog: stored files, songs,
//! albums, artists, genres and the structured event log. All mutations go
//! through [`Database::unit_of_work`], which pairs the SQLite transaction
//! with the filesystem effects that must follow its outcome: a file written
//! during the transaction is removed if the transaction rolls back, and a
//! file scheduled for deletion is only removed once the transaction has
//! committed. SQLite cannot roll the filesystem back for us, so this is the
//! one place where the two resources are kept in lockstep.

mod schema;
mod versioned_schema;

pub use versioned_schema::{Column, SqlType, Table, VersionedSchema, BASE_DB_VERSION};

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use schema::VERSIONED_SCHEMAS;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open library database at {:?}", path))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn)
    }

    /// In-memory database, used by tests and one-shot dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        migrate_if_needed(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    /// Run `f` inside a transaction. On `Ok` the transaction is committed and
    /// the registered on-commit filesystem effects are applied; on `Err` (or
    /// a failed commit) the transaction is rolled back and the on-rollback
    /// effects are applied instead.
    ///
    /// The connection mutex is held for the whole unit of work, so `f` must
    /// only touch the database through the [`UnitOfWork`] it is given.
    pub fn unit_of_work<T, E>(
        &self,
        f: impl FnOnce(&mut UnitOfWork) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<rusqlite::Error>,
    {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut uow = UnitOfWork {
            tx,
            on_commit: Vec::new(),
            on_rollback: Vec::new(),
        };
        match f(&mut uow) {
            Ok(value) => {
                uow.commit()?;
                Ok(value)
            }
            Err(e) => {
                uow.rollback();
                Err(e)
            }
        }
    }
}

fn migrate_if_needed(conn: &mut Connection) -> Result<()> {
    let table_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |r| r.get(0),
    )?;

    let latest = VERSIONED_SCHEMAS.last().unwrap();

    if table_count == 0 {
        info!("Creating library db schema at version {}", latest.version);
        latest.create(conn)?;
        return Ok(());
    }

    let raw_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    let db_version = raw_version - BASE_DB_VERSION as i64;
    if db_version < 1 {
        bail!(
            "Library database version {} is invalid (expected >= 1)",
            db_version
        );
    }

    let current = VERSIONED_SCHEMAS
        .iter()
        .find(|s| s.version == db_version as usize)
        .with_context(|| format!("Unknown library database version {}", db_version))?;
    current
        .validate(conn)
        .with_context(|| format!("Schema validation failed for version {}", db_version))?;

    if (db_version as usize) < latest.version {
        let tx = conn.transaction()?;
        let mut version = db_version as usize;
        let start_version = version;
        for schema in VERSIONED_SCHEMAS
            .iter()
            .filter(|s| s.version > start_version)
        {
            if let Some(migration_fn) = schema.migration {
                info!(
                    "Migrating library db from version {} to {}",
                    version, schema.version
                );
                migration_fn(&tx)?;
            }
            version = schema.version;
        }
        tx.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + version),
            [],
        )?;
        tx.commit()?;
    }

    Ok(())
}

/// A filesystem mutation whose application is tied to a transaction outcome.
enum FsEffect {
    RemoveFile(PathBuf),
    CleanDir(PathBuf),
}

impl FsEffect {
    fn apply(&self) {
        match self {
            FsEffect::RemoveFile(path) => {
                if !path.exists() {
                    return;
                }
                if let Err(e) = fs::remove_file(path) {
                    // Catalog consistency is primary, storage reclamation is
                    // best-effort: the row is already gone, so just warn.
                    warn!("Could not delete file {:?} from file system: {}", path, e);
                }
            }
            FsEffect::CleanDir(path) => {
                if let Err(e) = clean_dir(path) {
                    warn!("Could not clean storage folder {:?}: {}", path, e);
                }
            }
        }
    }
}

fn clean_dir(path: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

/// One transaction plus the filesystem effects registered against it.
pub struct UnitOfWork<'c> {
    tx: rusqlite::Transaction<'c>,
    on_commit: Vec<FsEffect>,
    on_rollback: Vec<FsEffect>,
}

impl UnitOfWork<'_> {
    pub fn conn(&self) -> &Connection {
        &self.tx
    }

    /// Delete `path` once this transaction has committed, never on rollback.
    pub fn remove_file_on_commit(&mut self, path: PathBuf) {
        self.on_commit.push(FsEffect::RemoveFile(path));
    }

    /// Delete `path` if this transaction does not commit. Used to discard
    /// files written during the transaction.
    pub fn remove_file_on_rollback(&mut self, path: PathBuf) {
        self.on_rollback.push(FsEffect::RemoveFile(path));
    }

    /// Recursively empty `path` (keeping the directory itself) once this
    /// transaction has committed.
    pub fn clean_dir_on_commit(&mut self, path: PathBuf) {
        self.on_commit.push(FsEffect::CleanDir(path));
    }

    fn commit(self) -> rusqlite::Result<()> {
        match self.tx.commit() {
            Ok(()) => {
                for effect in &self.on_commit {
                    effect.apply();
                }
                Ok(())
            }
            Err(e) => {
                for effect in &self.on_rollback {
                    effect.apply();
                }
                Err(e)
            }
        }
    }

    fn rollback(self) {
        // Dropping the transaction rolls it back.
        drop(self.tx);
        for effect in &self.on_rollback {
            effect.apply();
        }
    }
}
