use super::models::{StoreFileCommand, StorageError, StoredFile, TransferKind};
use crate::db::{Database, UnitOfWork};
use crate::file_types;
use crate::paging::{Page, PageRequest};
use chrono::{DateTime, Utc};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const BASE36_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn random_shard() -> String {
    let mut rng = rand::rng();
    (0..2)
        .map(|_| BASE36_ALPHABET[rng.random_range(0..BASE36_ALPHABET.len())] as char)
        .collect()
}

/// Owns the physical storage root and the `stored_files` catalog rows.
///
/// Every save produces one new row and one new physical file; there is no
/// implicit deduplication. Callers that want content dedup look up
/// [`by_tag_and_checksum`](FileStore::by_tag_and_checksum) before saving.
///
/// Filesystem mutations follow the catalog transaction: a written file is
/// discarded when its transaction rolls back, a deletion only happens once
/// its transaction has committed (see [`crate::db::UnitOfWork`]).
pub struct FileStore {
    db: Database,
    files_root: PathBuf,
    /// Serializes path selection plus transfer, so two concurrent saves can
    /// never race on the same destination between existence check and write.
    transfer_lock: Mutex<()>,
    shard_source: fn() -> String,
}

impl FileStore {
    pub fn new(db: Database, storage_root: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::with_shard_source(db, storage_root, random_shard)
    }

    /// Visible for tests: a deterministic shard source makes path collisions
    /// reproducible.
    pub fn with_shard_source(
        db: Database,
        storage_root: impl AsRef<Path>,
        shard_source: fn() -> String,
    ) -> Result<Self, StorageError> {
        let files_root = storage_root.as_ref().join("files");
        fs::create_dir_all(&files_root)?;
        Ok(Self {
            db,
            files_root,
            transfer_lock: Mutex::new(()),
            shard_source,
        })
    }

    pub fn files_root(&self) -> &Path {
        &self.files_root
    }

    /// Transfer the source file into the storage root and persist a catalog
    /// row for it, in a transaction of its own.
    pub fn save(&self, command: &StoreFileCommand) -> Result<StoredFile, StorageError> {
        self.db.unit_of_work(|uow| self.save_in(uow, command))
    }

    /// [`save`](FileStore::save) as part of an enclosing unit of work. The
    /// written file is registered for removal should the transaction roll
    /// back; on any failure here the partially written target is cleaned up
    /// best-effort before the error propagates.
    pub fn save_in(
        &self,
        uow: &mut UnitOfWork,
        command: &StoreFileCommand,
    ) -> Result<StoredFile, StorageError> {
        if !command.source.exists() {
            return Err(StorageError::InvalidInput(format!(
                "source file {:?} not found",
                command.source
            )));
        }
        if command.source.is_dir() {
            return Err(StorageError::InvalidInput(format!(
                "source {:?} is a directory",
                command.source
            )));
        }

        let relative_path;
        let target;
        {
            let _guard = self.transfer_lock.lock().unwrap();
            relative_path = self.pick_free_path(command);
            target = self.files_root.join(&relative_path);
            if let Err(e) = transfer(&command.source, &target, command.transfer) {
                let _ = fs::remove_file(&target);
                return Err(e);
            }
        }
        uow.remove_file_on_rollback(target.clone());

        let persisted = fs::metadata(&target)
            .map_err(StorageError::from)
            .and_then(|metadata| {
                insert_row(uow.conn(), command, metadata.len() as i64, &relative_path)
                    .map_err(StorageError::from)
            });
        match persisted {
            Ok(row) => Ok(row),
            Err(e) => {
                let _ = fs::remove_file(&target);
                Err(e)
            }
        }
    }

    /// Delete the row and, once the transaction commits, its physical file.
    /// Absent row is a no-op.
    pub fn delete(&self, id: i64) -> Result<bool, StorageError> {
        self.db.unit_of_work(|uow| self.delete_in(uow, id))
    }

    pub fn delete_in(&self, uow: &mut UnitOfWork, id: i64) -> Result<bool, StorageError> {
        let Some(row) = find_by_id(uow.conn(), id)? else {
            return Ok(false);
        };
        uow.conn()
            .execute("DELETE FROM stored_files WHERE id = ?1", params![id])?;
        uow.remove_file_on_commit(self.files_root.join(&row.relative_path));
        Ok(true)
    }

    /// Clear the whole catalog table and, after commit, recursively empty
    /// the storage root.
    pub fn delete_all(&self) -> Result<(), StorageError> {
        self.db.unit_of_work(|uow| {
            uow.conn().execute("DELETE FROM stored_files", [])?;
            uow.clean_dir_on_commit(self.files_root.clone());
            Ok(())
        })
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn by_id(&self, id: i64) -> Result<Option<StoredFile>, StorageError> {
        let conn = self.db.lock();
        find_by_id(&conn, id)
    }

    /// The conventional content-dedup key: callers check this before `save`
    /// to avoid storing the same content twice under one tag.
    pub fn by_tag_and_checksum(
        &self,
        tag: &str,
        checksum: &str,
    ) -> Result<Option<StoredFile>, StorageError> {
        let conn = self.db.lock();
        let row = conn
            .query_row(
                &format!("{} WHERE tag = ?1 AND checksum = ?2 ORDER BY id LIMIT 1", SELECT),
                params![tag, checksum],
                row_to_stored_file,
            )
            .optional()?;
        Ok(row)
    }

    pub fn by_checksum(&self, checksum: &str) -> Result<Vec<StoredFile>, StorageError> {
        let conn = self.db.lock();
        let mut stmt =
            conn.prepare_cached(&format!("{} WHERE checksum = ?1 ORDER BY id", SELECT))?;
        let rows = stmt
            .query_map(params![checksum], row_to_stored_file)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn page(&self, request: PageRequest) -> Result<Page<StoredFile>, StorageError> {
        self.page_filtered(None, request)
    }

    pub fn page_by_tag(
        &self,
        tag: &str,
        request: PageRequest,
    ) -> Result<Page<StoredFile>, StorageError> {
        self.page_filtered(Some(tag), request)
    }

    fn page_filtered(
        &self,
        tag: Option<&str>,
        request: PageRequest,
    ) -> Result<Page<StoredFile>, StorageError> {
        let conn = self.db.lock();
        let limit = request.size as i64;
        let offset = request.offset() as i64;
        let (total_elements, items): (i64, Vec<StoredFile>) = match tag {
            Some(tag) => {
                let total = conn.query_row(
                    "SELECT COUNT(*) FROM stored_files WHERE tag = ?1",
                    params![tag],
                    |r| r.get(0),
                )?;
                let mut stmt = conn.prepare_cached(&format!(
                    "{} WHERE tag = ?1 ORDER BY id LIMIT ?2 OFFSET ?3",
                    SELECT
                ))?;
                let items = stmt
                    .query_map(params![tag, limit, offset], row_to_stored_file)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                (total, items)
            }
            None => {
                let total =
                    conn.query_row("SELECT COUNT(*) FROM stored_files", [], |r| r.get(0))?;
                let mut stmt = conn
                    .prepare_cached(&format!("{} ORDER BY id LIMIT ?1 OFFSET ?2", SELECT))?;
                let items = stmt
                    .query_map(params![limit, offset], row_to_stored_file)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                (total, items)
            }
        };
        Ok(Page {
            items,
            number: request.number,
            total_elements: total_elements as u64,
        })
    }

    pub fn count(&self) -> Result<u64, StorageError> {
        let conn = self.db.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM stored_files", [], |r| r.get(0))?;
        Ok(count as u64)
    }

    pub fn count_by_tag(&self, tag: &str) -> Result<u64, StorageError> {
        let conn = self.db.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM stored_files WHERE tag = ?1",
            params![tag],
            |r| r.get(0),
        )?;
        Ok(count as u64)
    }

    /// Rows stored under `tag` after `min_date`, for usage/quota reporting.
    pub fn count_by_tag_since(
        &self,
        tag: &str,
        min_date: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let conn = self.db.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM stored_files WHERE tag = ?1 AND created_at > ?2",
            params![tag, min_date.to_rfc3339()],
            |r| r.get(0),
        )?;
        Ok(count as u64)
    }

    /// Total bytes stored under `tag`.
    pub fn size_by_tag(&self, tag: &str) -> Result<u64, StorageError> {
        let conn = self.db.lock();
        let size: i64 = conn.query_row(
            "SELECT COALESCE(SUM(size), 0) FROM stored_files WHERE tag = ?1",
            params![tag],
            |r| r.get(0),
        )?;
        Ok(size as u64)
    }

    /// Absolute physical path of a stored file.
    pub fn absolute_path(&self, file: &StoredFile) -> PathBuf {
        self.files_root.join(&file.relative_path)
    }

    pub fn absolute_path_by_id(&self, id: i64) -> Result<Option<PathBuf>, StorageError> {
        Ok(self.by_id(id)?.map(|file| self.absolute_path(&file)))
    }

    // =========================================================================
    // Path generation
    // =========================================================================

    /// Generate `<tag>/<xx>/<yy>/<name>[attempt].<ext>` with two short random
    /// segments so no single directory accumulates millions of entries. When
    /// the candidate exists, an attempt counter is appended to the file name
    /// and a fresh random pair is drawn, until a free path is found. Must be
    /// called under the transfer lock.
    fn pick_free_path(&self, command: &StoreFileCommand) -> String {
        let base_name = match &command.name {
            Some(name) => file_types::sanitize_file_name(name),
            None => command
                .source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "file".to_string()),
        };
        let extension = file_types::extension_for_mime(&command.mime_type);
        let tag = command.tag.trim();

        let mut attempt = 0u32;
        loop {
            let mut relative = String::new();
            if !tag.is_empty() {
                relative.push_str(tag);
                relative.push('/');
            }
            relative.push_str(&(self.shard_source)());
            relative.push('/');
            relative.push_str(&(self.shard_source)());
            relative.push('/');
            relative.push_str(&base_name);
            if attempt > 0 {
                relative.push_str(&attempt.to_string());
            }
            if let Some(extension) = extension {
                relative.push('.');
                relative.push_str(extension);
            }
            if !self.files_root.join(&relative).exists() {
                return relative;
            }
            attempt += 1;
        }
    }
}

fn transfer(source: &Path, target: &Path, kind: TransferKind) -> Result<(), StorageError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    match kind {
        TransferKind::Copy => {
            fs::copy(source, target)?;
        }
        TransferKind::Move => {
            // Rename fails across filesystems; fall back to copy + remove.
            if fs::rename(source, target).is_err() {
                fs::copy(source, target)?;
                fs::remove_file(source)?;
            }
        }
    }
    Ok(())
}

const SELECT: &str = "SELECT id, name, mime_type, checksum, size, tag, user_data, \
                      relative_path, created_at FROM stored_files";

fn row_to_stored_file(row: &rusqlite::Row) -> rusqlite::Result<StoredFile> {
    let created_at_str: String = row.get("created_at")?;
    Ok(StoredFile {
        id: row.get("id")?,
        name: row.get("name")?,
        mime_type: row.get("mime_type")?,
        checksum: row.get("checksum")?,
        size: row.get("size")?,
        tag: row.get("tag")?,
        user_data: row.get("user_data")?,
        relative_path: row.get("relative_path")?,
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

fn find_by_id(conn: &Connection, id: i64) -> Result<Option<StoredFile>, StorageError> {
    let row = conn
        .query_row(
            &format!("{} WHERE id = ?1", SELECT),
            params![id],
            row_to_stored_file,
        )
        .optional()?;
    Ok(row)
}

fn insert_row(
    conn: &Connection,
    command: &StoreFileCommand,
    size: i64,
    relative_path: &str,
) -> rusqlite::Result<StoredFile> {
    let created_at = Utc::now();
    conn.execute(
        "INSERT INTO stored_files (name, mime_type, checksum, size, tag, user_data, \
         relative_path, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            command.name,
            command.mime_type,
            command.checksum,
            size,
            command.tag,
            command.user_data,
            relative_path,
            created_at.to_rfc3339(),
        ],
    )?;
    Ok(StoredFile {
        id: conn.last_insert_rowid(),
        name: command.name.clone(),
        mime_type: command.mime_type.clone(),
        checksum: command.checksum.clone(),
        size,
        tag: command.tag.clone(),
        user_data: command.user_data.clone(),
        relative_path: relative_path.to_string(),
        created_at,
    })
}
