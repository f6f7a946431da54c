use super::models::{Album, Artist, Genre, NewSong, Song};
use crate::db::{Database, UnitOfWork};
use crate::paging::{Page, PageRequest};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

const SELECT_SONG: &str = "SELECT id, path, title, duration_sec, checksum, artist_id, \
                           album_id, genre_id, artwork_id FROM songs";

/// Row access for the catalog entities. Paged queries are ordered by id so
/// [`crate::paging::process_pages`] sees a stable sort key.
#[derive(Clone)]
pub struct LibraryStore {
    db: Database,
}

impl LibraryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // =========================================================================
    // Songs
    // =========================================================================

    pub fn song_by_id(&self, id: i64) -> Result<Option<Song>> {
        let conn = self.db.lock();
        Self::find_song(&conn, &format!("{} WHERE id = ?1", SELECT_SONG), params![id])
    }

    pub fn song_by_path(&self, path: &str) -> Result<Option<Song>> {
        let conn = self.db.lock();
        Self::find_song(
            &conn,
            &format!("{} WHERE path = ?1", SELECT_SONG),
            params![path],
        )
    }

    fn find_song(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Option<Song>> {
        let song = conn.query_row(sql, params, row_to_song).optional()?;
        Ok(song)
    }

    pub fn songs_page(&self, request: PageRequest) -> Result<Page<Song>> {
        let conn = self.db.lock();
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM songs", [], |r| r.get(0))?;
        let mut stmt =
            conn.prepare_cached(&format!("{} ORDER BY id LIMIT ?1 OFFSET ?2", SELECT_SONG))?;
        let items = stmt
            .query_map(
                params![request.size as i64, request.offset() as i64],
                row_to_song,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Page {
            items,
            number: request.number,
            total_elements: total as u64,
        })
    }

    pub fn songs_without_artwork_page(&self, request: PageRequest) -> Result<Page<Song>> {
        let conn = self.db.lock();
        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM songs WHERE artwork_id IS NULL",
            [],
            |r| r.get(0),
        )?;
        let mut stmt = conn.prepare_cached(&format!(
            "{} WHERE artwork_id IS NULL ORDER BY id LIMIT ?1 OFFSET ?2",
            SELECT_SONG
        ))?;
        let items = stmt
            .query_map(
                params![request.size as i64, request.offset() as i64],
                row_to_song,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Page {
            items,
            number: request.number,
            total_elements: total as u64,
        })
    }

    /// Insert the song, or update the existing row with the same path.
    /// Returns the row and whether it was newly created.
    pub fn upsert_song_in(&self, uow: &mut UnitOfWork, song: &NewSong) -> Result<(Song, bool)> {
        let existing_id: Option<i64> = uow
            .conn()
            .query_row(
                "SELECT id FROM songs WHERE path = ?1",
                params![song.path],
                |r| r.get(0),
            )
            .optional()?;
        let (id, created) = match existing_id {
            Some(id) => {
                uow.conn().execute(
                    "UPDATE songs SET title = ?1, duration_sec = ?2, checksum = ?3, \
                     artist_id = ?4, album_id = ?5, genre_id = ?6, artwork_id = ?7 \
                     WHERE id = ?8",
                    params![
                        song.title,
                        song.duration_sec,
                        song.checksum,
                        song.artist_id,
                        song.album_id,
                        song.genre_id,
                        song.artwork_id,
                        id,
                    ],
                )?;
                (id, false)
            }
            None => {
                uow.conn().execute(
                    "INSERT INTO songs (path, title, duration_sec, checksum, artist_id, \
                     album_id, genre_id, artwork_id) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        song.path,
                        song.title,
                        song.duration_sec,
                        song.checksum,
                        song.artist_id,
                        song.album_id,
                        song.genre_id,
                        song.artwork_id,
                    ],
                )?;
                (uow.conn().last_insert_rowid(), true)
            }
        };
        let row = Self::find_song(
            uow.conn(),
            &format!("{} WHERE id = ?1", SELECT_SONG),
            params![id],
        )?
        .ok_or_else(|| anyhow::anyhow!("song row {} missing after upsert", id))?;
        Ok((row, created))
    }

    pub fn delete_songs_in(&self, uow: &mut UnitOfWork, ids: &[i64]) -> Result<()> {
        let mut stmt = uow
            .conn()
            .prepare_cached("DELETE FROM songs WHERE id = ?1")?;
        for id in ids {
            stmt.execute(params![id])?;
        }
        Ok(())
    }

    pub fn set_song_artwork_in(
        &self,
        uow: &mut UnitOfWork,
        song_id: i64,
        artwork_id: Option<i64>,
    ) -> Result<()> {
        uow.conn().execute(
            "UPDATE songs SET artwork_id = ?1 WHERE id = ?2",
            params![artwork_id, song_id],
        )?;
        Ok(())
    }

    // =========================================================================
    // Albums, artists, genres
    // =========================================================================

    pub fn album_by_id(&self, id: i64) -> Result<Option<Album>> {
        let conn = self.db.lock();
        let album = conn
            .query_row(
                "SELECT id, name, year, artist_id, artwork_id FROM albums WHERE id = ?1",
                params![id],
                row_to_album,
            )
            .optional()?;
        Ok(album)
    }

    pub fn artist_by_id(&self, id: i64) -> Result<Option<Artist>> {
        let conn = self.db.lock();
        let artist = conn
            .query_row(
                "SELECT id, name, artwork_id FROM artists WHERE id = ?1",
                params![id],
                row_to_artist,
            )
            .optional()?;
        Ok(artist)
    }

    pub fn genre_by_id(&self, id: i64) -> Result<Option<Genre>> {
        let conn = self.db.lock();
        let genre = conn
            .query_row(
                "SELECT id, name, artwork_id FROM genres WHERE id = ?1",
                params![id],
                row_to_genre,
            )
            .optional()?;
        Ok(genre)
    }

    pub fn upsert_artist_in(&self, uow: &mut UnitOfWork, name: &str) -> Result<i64> {
        Self::upsert_named(uow.conn(), "artists", name)
    }

    pub fn upsert_genre_in(&self, uow: &mut UnitOfWork, name: &str) -> Result<i64> {
        Self::upsert_named(uow.conn(), "genres", name)
    }

    fn upsert_named(conn: &Connection, table: &str, name: &str) -> Result<i64> {
        let existing: Option<i64> = conn
            .query_row(
                &format!("SELECT id FROM {} WHERE name = ?1", table),
                params![name],
                |r| r.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }
        conn.execute(
            &format!("INSERT INTO {} (name) VALUES (?1)", table),
            params![name],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Albums are unique per (name, artist), not globally by name.
    pub fn upsert_album_in(
        &self,
        uow: &mut UnitOfWork,
        name: &str,
        year: Option<i64>,
        artist_id: Option<i64>,
    ) -> Result<i64> {
        let existing: Option<i64> = uow
            .conn()
            .query_row(
                "SELECT id FROM albums WHERE name = ?1 AND artist_id IS ?2",
                params![name, artist_id],
                |r| r.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            if year.is_some() {
                uow.conn().execute(
                    "UPDATE albums SET year = ?1 WHERE id = ?2",
                    params![year, id],
                )?;
            }
            return Ok(id);
        }
        uow.conn().execute(
            "INSERT INTO albums (name, year, artist_id) VALUES (?1, ?2, ?3)",
            params![name, year, artist_id],
        )?;
        Ok(uow.conn().last_insert_rowid())
    }

    pub fn set_album_artwork_in(
        &self,
        uow: &mut UnitOfWork,
        album_id: i64,
        artwork_id: Option<i64>,
    ) -> Result<()> {
        uow.conn().execute(
            "UPDATE albums SET artwork_id = ?1 WHERE id = ?2",
            params![artwork_id, album_id],
        )?;
        Ok(())
    }

    pub fn set_artist_artwork_in(
        &self,
        uow: &mut UnitOfWork,
        artist_id: i64,
        artwork_id: Option<i64>,
    ) -> Result<()> {
        uow.conn().execute(
            "UPDATE artists SET artwork_id = ?1 WHERE id = ?2",
            params![artwork_id, artist_id],
        )?;
        Ok(())
    }

    pub fn set_genre_artwork_in(
        &self,
        uow: &mut UnitOfWork,
        genre_id: i64,
        artwork_id: Option<i64>,
    ) -> Result<()> {
        uow.conn().execute(
            "UPDATE genres SET artwork_id = ?1 WHERE id = ?2",
            params![artwork_id, genre_id],
        )?;
        Ok(())
    }

    /// Clear every reference to a stored file, referrers first: songs, then
    /// albums, then artists, then genres. Must run in the same transaction
    /// that deletes the stored file row, so no reader can observe a dangling
    /// reference.
    pub fn clear_artwork_refs_in(&self, uow: &mut UnitOfWork, artwork_id: i64) -> Result<()> {
        for table in ["songs", "albums", "artists", "genres"] {
            uow.conn().execute(
                &format!("UPDATE {} SET artwork_id = NULL WHERE artwork_id = ?1", table),
                params![artwork_id],
            )?;
        }
        Ok(())
    }
}

fn row_to_song(row: &rusqlite::Row) -> rusqlite::Result<Song> {
    Ok(Song {
        id: row.get("id")?,
        path: row.get("path")?,
        title: row.get("title")?,
        duration_sec: row.get("duration_sec")?,
        checksum: row.get("checksum")?,
        artist_id: row.get("artist_id")?,
        album_id: row.get("album_id")?,
        genre_id: row.get("genre_id")?,
        artwork_id: row.get("artwork_id")?,
    })
}

fn row_to_album(row: &rusqlite::Row) -> rusqlite::Result<Album> {
    Ok(Album {
        id: row.get("id")?,
        name: row.get("name")?,
        year: row.get("year")?,
        artist_id: row.get("artist_id")?,
        artwork_id: row.get("artwork_id")?,
    })
}

fn row_to_artist(row: &rusqlite::Row) -> rusqlite::Result<Artist> {
    Ok(Artist {
        id: row.get("id")?,
        name: row.get("name")?,
        artwork_id: row.get("artwork_id")?,
    })
}

fn row_to_genre(row: &rusqlite::Row) -> rusqlite::Result<Genre> {
    Ok(Genre {
        id: row.get("id")?,
        name: row.get("name")?,
        artwork_id: row.get("artwork_id")?,
    })
}
