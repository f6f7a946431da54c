//! Table definitions for the library database.
//!
//! The `artwork_id` columns on songs, albums, artists and genres are weak
//! references into `stored_files`: no foreign key constraint, because a
//! stored file can be referenced from four independent tables and its
//! deletion clears those references procedurally (see `LibraryManager`).

use super::versioned_schema::{Column, SqlType, Table, VersionedSchema};

const STORED_FILES_V1: Table = Table {
    name: "stored_files",
    columns: &[
        Column::new("id", SqlType::Integer).primary_key(),
        Column::new("name", SqlType::Text),
        Column::new("mime_type", SqlType::Text).non_null(),
        Column::new("checksum", SqlType::Text).non_null(),
        Column::new("size", SqlType::Integer).non_null(),
        Column::new("tag", SqlType::Text).non_null(),
        Column::new("user_data", SqlType::Text),
        Column::new("relative_path", SqlType::Text).non_null(),
        Column::new("created_at", SqlType::Text).non_null(),
    ],
    indices: &[
        ("idx_stored_files_tag_checksum", "tag, checksum"),
        ("idx_stored_files_checksum", "checksum"),
    ],
};

const SONGS_V1: Table = Table {
    name: "songs",
    columns: &[
        Column::new("id", SqlType::Integer).primary_key(),
        Column::new("path", SqlType::Text).non_null().unique(),
        Column::new("title", SqlType::Text),
        Column::new("duration_sec", SqlType::Integer),
        Column::new("checksum", SqlType::Text),
        Column::new("artist_id", SqlType::Integer),
        Column::new("album_id", SqlType::Integer),
        Column::new("genre_id", SqlType::Integer),
        Column::new("artwork_id", SqlType::Integer),
    ],
    indices: &[("idx_songs_artwork", "artwork_id")],
};

const ALBUMS_V1: Table = Table {
    name: "albums",
    columns: &[
        Column::new("id", SqlType::Integer).primary_key(),
        Column::new("name", SqlType::Text).non_null(),
        Column::new("year", SqlType::Integer),
        Column::new("artist_id", SqlType::Integer),
        Column::new("artwork_id", SqlType::Integer),
    ],
    indices: &[
        ("idx_albums_artwork", "artwork_id"),
        ("idx_albums_artist", "artist_id"),
    ],
};

const ARTISTS_V1: Table = Table {
    name: "artists",
    columns: &[
        Column::new("id", SqlType::Integer).primary_key(),
        Column::new("name", SqlType::Text).non_null().unique(),
        Column::new("artwork_id", SqlType::Integer),
    ],
    indices: &[("idx_artists_artwork", "artwork_id")],
};

const GENRES_V1: Table = Table {
    name: "genres",
    columns: &[
        Column::new("id", SqlType::Integer).primary_key(),
        Column::new("name", SqlType::Text).non_null().unique(),
        Column::new("artwork_id", SqlType::Integer),
    ],
    indices: &[("idx_genres_artwork", "artwork_id")],
};

const LOG_ENTRIES_V1: Table = Table {
    name: "log_entries",
    columns: &[
        Column::new("id", SqlType::Integer).primary_key(),
        Column::new("level", SqlType::Text).non_null(),
        Column::new("key", SqlType::Text).non_null(),
        Column::new("message", SqlType::Text).non_null(),
        Column::new("args", SqlType::Text).non_null(),
        Column::new("created_at", SqlType::Text).non_null(),
    ],
    indices: &[("idx_log_entries_level", "level, id")],
};

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[
        STORED_FILES_V1,
        SONGS_V1,
        ALBUMS_V1,
        ARTISTS_V1,
        GENRES_V1,
        LOG_ENTRIES_V1,
    ],
    migration: None,
}];
