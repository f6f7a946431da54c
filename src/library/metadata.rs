//! Boundary seam for reading and writing tag metadata of media files. The
//! actual parser lives behind [`SongMetadataCodec`]; this crate only consumes
//! the extracted fields and the embedded artwork bytes.

use crate::file_types;
use anyhow::{bail, Result};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct SongMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i64>,
    pub duration_sec: Option<i64>,
    pub mime_type: String,
    pub embedded_artwork: Option<EmbeddedArtwork>,
}

#[derive(Debug, Clone)]
pub struct EmbeddedArtwork {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Tag fields to write back to a media file before re-importing it. `None`
/// fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct SongPatch {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i64>,
}

pub trait SongMetadataCodec: Send + Sync {
    fn read(&self, path: &Path) -> Result<SongMetadata>;
    fn write(&self, path: &Path, patch: &SongPatch) -> Result<()>;
}

/// Fallback codec deriving a title from the file name and the MIME type from
/// the extension. Carries no tag parser, so it never yields artist/album
/// data and cannot write.
pub struct FileNameMetadataCodec;

impl SongMetadataCodec for FileNameMetadataCodec {
    fn read(&self, path: &Path) -> Result<SongMetadata> {
        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
        let mime_type = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(file_types::mime_for_extension)
            .unwrap_or("application/octet-stream")
            .to_string();
        Ok(SongMetadata {
            title,
            mime_type,
            ..SongMetadata::default()
        })
    }

    fn write(&self, path: &Path, _patch: &SongPatch) -> Result<()> {
        bail!("no tag writer available for {:?}", path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn filename_codec_derives_title_and_mime() {
        let metadata = FileNameMetadataCodec
            .read(&PathBuf::from("/music/Blue Train.flac"))
            .unwrap();
        assert_eq!(metadata.title.as_deref(), Some("Blue Train"));
        assert_eq!(metadata.mime_type, "audio/flac");
        assert!(metadata.embedded_artwork.is_none());
    }

    #[test]
    fn filename_codec_refuses_to_write() {
        assert!(FileNameMetadataCodec
            .write(&PathBuf::from("/music/a.mp3"), &SongPatch::default())
            .is_err());
    }
}
