use super::metadata::{SongMetadataCodec, SongPatch};
use super::models::{NewSong, Song};
use super::store::LibraryStore;
use super::walker::LibraryWalker;
use crate::db::Database;
use crate::event_log::{EventSink, LogEvent, LogLevel};
use crate::file_types;
use crate::paging::process_pages;
use crate::storage::{FileStore, StoreFileCommand, TransferKind};
use anyhow::{bail, Context, Result};
use rusqlite::OptionalExtension;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Tag bucket for artwork extracted from media file tags.
pub const TAG_ARTWORK_EMBEDDED: &str = "artworkEmbedded";
/// Tag bucket for artwork picked up from image files next to the media
/// files; `user_data` holds the external source path.
pub const TAG_ARTWORK_EXTERNAL: &str = "artworkExternal";

/// Page size for maintenance scans. Keeps memory flat regardless of catalog
/// size.
const CLEANING_PAGE_SIZE: usize = 300;

/// File stems recognized as external album artwork.
const ARTWORK_STEMS: &[&str] = &["cover", "folder", "front", "album"];

#[derive(Debug, Clone)]
pub struct SongImportOutcome {
    pub song: Song,
    pub created: bool,
}

/// Orchestrates catalog-vs-filesystem reconciliation and song ingestion.
///
/// The cleaning operations are single linear passes: scan the catalog in
/// pages, collect the ids of orphaned rows, apply all deletions in one
/// transaction after the scan, then report. Acting mid-scan would shrink the
/// collection under the scan and skip items. Runs are meant to be scheduled
/// one at a time; nothing here defends against concurrent maintenance.
pub struct LibraryManager {
    db: Database,
    files: Arc<FileStore>,
    library: LibraryStore,
    events: Arc<dyn EventSink>,
    metadata: Arc<dyn SongMetadataCodec>,
}

impl LibraryManager {
    pub fn new(
        db: Database,
        files: Arc<FileStore>,
        library: LibraryStore,
        events: Arc<dyn EventSink>,
        metadata: Arc<dyn SongMetadataCodec>,
    ) -> Self {
        Self {
            db,
            files,
            library,
            events,
            metadata,
        }
    }

    /// Remove catalog rows for songs whose files are gone. A song is orphaned
    /// when its path is absent from the walker's snapshot, or when the file
    /// does not exist right now (the snapshot may be stale). Returns the
    /// number of rows removed.
    pub fn clean_songs(
        &self,
        walker: &dyn LibraryWalker,
        mut progress: impl FnMut(f64),
    ) -> Result<u64> {
        let discovered: HashSet<PathBuf> = walker.discover_songs()?.into_iter().collect();

        let mut to_delete: Vec<i64> = Vec::new();
        process_pages(
            CLEANING_PAGE_SIZE,
            |request| self.library.songs_page(request),
            |song: &Song, _index_in_page, overall, total| {
                let path = Path::new(&song.path);
                if !discovered.contains(path) || !path.exists() {
                    to_delete.push(song.id);
                    let message =
                        format!("Song file not found [{}], deleting song.", song.path);
                    debug!("{}", message);
                    self.events.record(LogEvent::new(
                        LogLevel::Debug,
                        "library.songRemoved",
                        message,
                        vec![song.path.clone()],
                    ));
                }
                if total > 0 {
                    progress(overall as f64 / total as f64);
                }
            },
        )?;

        if to_delete.is_empty() {
            return Ok(0);
        }

        self.db
            .unit_of_work(|uow| self.library.delete_songs_in(uow, &to_delete))?;

        let message = format!("Deleted [{}] songs.", to_delete.len());
        info!("{}", message);
        self.events.record(LogEvent::new(
            LogLevel::Info,
            "library.songsRemoved",
            message,
            vec![to_delete.len().to_string()],
        ));

        Ok(to_delete.len() as u64)
    }

    /// Remove externally sourced artwork rows whose source files are gone.
    ///
    /// For every orphan, inside one transaction: clear the artwork reference
    /// on songs, albums, artists and genres (in that order), then delete the
    /// stored file row, deferring the physical removal to commit. Clearing
    /// referrers before the referent is what keeps readers from ever seeing
    /// a dangling reference. Returns the number of rows removed.
    pub fn clean_artworks(&self, mut progress: impl FnMut(f64)) -> Result<u64> {
        let mut orphans: Vec<i64> = Vec::new();
        process_pages(
            CLEANING_PAGE_SIZE,
            |request| {
                self.files
                    .page_by_tag(TAG_ARTWORK_EXTERNAL, request)
                    .map_err(anyhow::Error::from)
            },
            |file, _index_in_page, overall, total| {
                let source_exists = file
                    .user_data
                    .as_deref()
                    .map(|source| Path::new(source).exists())
                    .unwrap_or(false);
                if !source_exists {
                    orphans.push(file.id);
                    let source = file.user_data.as_deref().unwrap_or("<none>");
                    let message = format!(
                        "Artwork file not found [{}], deleting stored file [{}].",
                        source, file.relative_path
                    );
                    debug!("{}", message);
                    self.events.record(LogEvent::new(
                        LogLevel::Debug,
                        "library.artworkRemoved",
                        message,
                        vec![source.to_string(), file.relative_path.clone()],
                    ));
                }
                if total > 0 {
                    progress(overall as f64 / total as f64);
                }
            },
        )?;

        if orphans.is_empty() {
            return Ok(0);
        }

        self.db.unit_of_work(|uow| {
            for id in &orphans {
                self.library.clear_artwork_refs_in(uow, *id)?;
                self.files.delete_in(uow, *id)?;
            }
            Ok::<_, anyhow::Error>(())
        })?;

        let message = format!("Deleted [{}] stored files.", orphans.len());
        info!("{}", message);
        self.events.record(LogEvent::new(
            LogLevel::Info,
            "library.artworksRemoved",
            message,
            vec![orphans.len().to_string()],
        ));

        Ok(orphans.len() as u64)
    }

    /// Import one media file: read its tags through the metadata codec,
    /// upsert genre/artist/album rows, store embedded artwork (deduplicated
    /// by tag and checksum) and insert-or-update the song row keyed by path.
    /// Everything happens in one unit of work; a failure leaves no partial
    /// catalog mutation behind.
    pub fn import_song(&self, path: &Path) -> Result<SongImportOutcome> {
        if !path.is_file() {
            bail!("song file {:?} not found", path);
        }
        let metadata = self.metadata.read(path)?;
        let checksum = sha256_hex_file(path)?;

        // Stage embedded artwork before the transaction: write the bytes to
        // a temp file so the store can move them into place, unless the same
        // content is already stored under the embedded tag.
        let staged_artwork = match &metadata.embedded_artwork {
            Some(artwork) => {
                let artwork_checksum = format!("{:x}", Sha256::digest(&artwork.bytes));
                match self
                    .files
                    .by_tag_and_checksum(TAG_ARTWORK_EMBEDDED, &artwork_checksum)?
                {
                    Some(existing) => StagedArtwork::Existing(existing.id),
                    None => {
                        let mut staged = tempfile::NamedTempFile::new()?;
                        staged.write_all(&artwork.bytes)?;
                        StagedArtwork::Staged {
                            source: staged.into_temp_path(),
                            mime_type: artwork.mime_type.clone(),
                            checksum: artwork_checksum,
                        }
                    }
                }
            }
            None => StagedArtwork::None,
        };

        let path_str = path.to_string_lossy().into_owned();
        let artwork_name = metadata
            .title
            .clone()
            .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()));

        self.db.unit_of_work(|uow| {
            let genre_id = match &metadata.genre {
                Some(name) => Some(self.library.upsert_genre_in(uow, name)?),
                None => None,
            };
            let artist_id = match &metadata.artist {
                Some(name) => Some(self.library.upsert_artist_in(uow, name)?),
                None => None,
            };
            let album_id = match &metadata.album {
                Some(name) => {
                    Some(
                        self.library
                            .upsert_album_in(uow, name, metadata.year, artist_id)?,
                    )
                }
                None => None,
            };

            let artwork_id = match &staged_artwork {
                StagedArtwork::None => None,
                StagedArtwork::Existing(id) => Some(*id),
                StagedArtwork::Staged {
                    source,
                    mime_type,
                    checksum,
                } => {
                    let mut command = StoreFileCommand::new(
                        source.to_path_buf(),
                        TransferKind::Move,
                        mime_type.clone(),
                        checksum.clone(),
                        TAG_ARTWORK_EMBEDDED,
                    );
                    if let Some(name) = &artwork_name {
                        command = command.with_name(name.clone());
                    }
                    Some(self.files.save_in(uow, &command)?.id)
                }
            };

            let (song, created) = self.library.upsert_song_in(
                uow,
                &NewSong {
                    path: path_str.clone(),
                    title: metadata.title.clone(),
                    duration_sec: metadata.duration_sec,
                    checksum: Some(checksum.clone()),
                    artist_id,
                    album_id,
                    genre_id,
                    artwork_id,
                },
            )?;

            // Give the album the song's artwork when it has none yet.
            if let (Some(album_id), Some(artwork_id)) = (album_id, artwork_id) {
                let album_artwork: Option<i64> = uow
                    .conn()
                    .query_row(
                        "SELECT artwork_id FROM albums WHERE id = ?1",
                        [album_id],
                        |r| r.get(0),
                    )
                    .optional()?
                    .flatten();
                if album_artwork.is_none() {
                    self.library
                        .set_album_artwork_in(uow, album_id, Some(artwork_id))?;
                }
            }

            Ok::<_, anyhow::Error>(SongImportOutcome { song, created })
        })
    }

    /// Write tag fields back to the song's file through the metadata codec,
    /// then re-import it so the catalog reflects the new tags.
    pub fn write_and_import_song(&self, id: i64, patch: &SongPatch) -> Result<SongImportOutcome> {
        let song = self
            .library
            .song_by_id(id)?
            .with_context(|| format!("no song with id {}", id))?;
        let path = PathBuf::from(&song.path);
        self.metadata.write(&path, patch)?;
        self.import_song(&path)
    }

    /// Pair artwork-less songs with image files found next to them
    /// (`cover.jpg` and friends). Stored under the external tag with
    /// `user_data` recording the source path, deduplicated by tag+checksum;
    /// the song's album also picks up the artwork when it has none. Returns
    /// the number of songs updated.
    pub fn import_artworks(&self, mut progress: impl FnMut(f64)) -> Result<u64> {
        let mut candidates: Vec<(i64, Option<i64>, PathBuf)> = Vec::new();
        process_pages(
            CLEANING_PAGE_SIZE,
            |request| self.library.songs_without_artwork_page(request),
            |song: &Song, _index_in_page, overall, total| {
                if let Some(artwork_path) = Path::new(&song.path)
                    .parent()
                    .and_then(find_external_artwork)
                {
                    candidates.push((song.id, song.album_id, artwork_path));
                }
                if total > 0 {
                    progress(overall as f64 / total as f64);
                }
            },
        )?;

        let mut updated = 0u64;
        for (song_id, album_id, artwork_path) in candidates {
            let mime_type = match file_types::detect_image_mime(&artwork_path) {
                Some(mime_type) => mime_type,
                None => {
                    debug!("Skipping non-image artwork candidate {:?}", artwork_path);
                    continue;
                }
            };
            let checksum = sha256_hex_file(&artwork_path)?;
            let existing = self
                .files
                .by_tag_and_checksum(TAG_ARTWORK_EXTERNAL, &checksum)?;
            let source_str = artwork_path.to_string_lossy().into_owned();

            self.db.unit_of_work(|uow| {
                let artwork_id = match &existing {
                    Some(row) => row.id,
                    None => {
                        let command = StoreFileCommand::new(
                            artwork_path.clone(),
                            TransferKind::Copy,
                            mime_type.clone(),
                            checksum.clone(),
                            TAG_ARTWORK_EXTERNAL,
                        )
                        .with_user_data(source_str.clone());
                        self.files.save_in(uow, &command)?.id
                    }
                };
                self.library
                    .set_song_artwork_in(uow, song_id, Some(artwork_id))?;
                if let Some(album_id) = album_id {
                    let album_artwork: Option<i64> = uow
                        .conn()
                        .query_row(
                            "SELECT artwork_id FROM albums WHERE id = ?1",
                            [album_id],
                            |r| r.get(0),
                        )
                        .optional()?
                        .flatten();
                    if album_artwork.is_none() {
                        self.library
                            .set_album_artwork_in(uow, album_id, Some(artwork_id))?;
                    }
                }
                Ok::<_, anyhow::Error>(())
            })?;
            updated += 1;
        }

        if updated > 0 {
            info!("Imported artwork for [{}] songs.", updated);
        }
        Ok(updated)
    }
}

enum StagedArtwork {
    None,
    Existing(i64),
    Staged {
        source: tempfile::TempPath,
        mime_type: String,
        checksum: String,
    },
}

/// First file in `dir` whose stem is a recognized artwork name and whose
/// extension is an image extension, in name order for determinism.
fn find_external_artwork(dir: &Path) -> Option<PathBuf> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();
    entries.sort();
    entries.into_iter().find(|path| {
        if !path.is_file() || !file_types::is_image_file(path) {
            return false;
        }
        path.file_stem()
            .and_then(|s| s.to_str())
            .map(|s| ARTWORK_STEMS.contains(&s.to_lowercase().as_str()))
            .unwrap_or(false)
    })
}

fn sha256_hex_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}
