//! Catalog entity rows. Each entity may hold at most one weak reference
//! (`artwork_id`) to a stored file; the reference is cleared, never cascaded,
//! when the stored file goes away.

#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub id: i64,
    /// Absolute path of the media file this row was imported from.
    pub path: String,
    pub title: Option<String>,
    pub duration_sec: Option<i64>,
    pub checksum: Option<String>,
    pub artist_id: Option<i64>,
    pub album_id: Option<i64>,
    pub genre_id: Option<i64>,
    pub artwork_id: Option<i64>,
}

/// Field set for inserting or updating a song row, keyed by unique path.
#[derive(Debug, Clone, Default)]
pub struct NewSong {
    pub path: String,
    pub title: Option<String>,
    pub duration_sec: Option<i64>,
    pub checksum: Option<String>,
    pub artist_id: Option<i64>,
    pub album_id: Option<i64>,
    pub genre_id: Option<i64>,
    pub artwork_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Album {
    pub id: i64,
    pub name: String,
    pub year: Option<i64>,
    pub artist_id: Option<i64>,
    pub artwork_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artist {
    pub id: i64,
    pub name: String,
    pub artwork_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Genre {
    pub id: i64,
    pub name: String,
    pub artwork_id: Option<i64>,
}
