//! Pure file-type lookups: MIME type to extension mapping, audio file
//! detection for library walks, and filename sanitization for generated
//! storage paths.

use std::path::Path;

/// Audio extensions the library walker considers song files.
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "m4a", "aac", "wma", "opus"];

const MIME_EXTENSIONS: &[(&str, &str)] = &[
    ("audio/mpeg", "mp3"),
    ("audio/flac", "flac"),
    ("audio/x-flac", "flac"),
    ("audio/wav", "wav"),
    ("audio/ogg", "ogg"),
    ("audio/mp4", "m4a"),
    ("audio/aac", "aac"),
    ("audio/opus", "opus"),
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/bmp", "bmp"),
    ("image/webp", "webp"),
];

/// Extension for a MIME type; `None` for unknown types, in which case
/// generated storage paths simply carry no extension.
pub fn extension_for_mime(mime_type: &str) -> Option<&'static str> {
    MIME_EXTENSIONS
        .iter()
        .find(|(mime, _)| *mime == mime_type)
        .map(|(_, ext)| *ext)
}

pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    let extension = extension.to_lowercase();
    MIME_EXTENSIONS
        .iter()
        .find(|(_, ext)| *ext == extension)
        .map(|(mime, _)| *mime)
}

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or(false)
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or(false)
}

/// Sniff the MIME type of an image file from its content. Returns `None`
/// when the file cannot be read or is not an image.
pub fn detect_image_mime(path: &Path) -> Option<String> {
    let kind = infer::get_from_path(path).ok().flatten()?;
    if kind.matcher_type() == infer::MatcherType::Image {
        Some(kind.mime_type().to_string())
    } else {
        None
    }
}

/// Replace path separators and control characters so a display name is safe
/// to use as a single path component.
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = sanitized.trim().trim_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}
