//! File type classification
//!
//! Maps a file's local name to a coarse type label by its extension. The
//! table is data: each label owns a set of lower-case extensions, and names
//! that match none of them classify as `OTHER`. Directories have no type.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::types::Record;

/// Label for files whose extension is not in the table
pub const OTHER: &str = "OTHER";

/// Type labels in canonical export order, with their extensions
pub const FILE_TYPES: &[(&str, &[&str])] = &[
    ("AVRO", &["avro"]),
    ("PARQUET", &["parquet", "parq"]),
    ("ORC", &["orc"]),
    ("SEQUENCE", &["seq"]),
    ("CSV", &["csv", "tsv"]),
    ("JSON", &["json", "jsonl", "ndjson"]),
    ("TEXT", &["txt", "md", "xml", "yaml", "yml"]),
    ("LOG", &["log", "out", "err"]),
    ("COMPRESSED", &["gz", "bz2", "snappy", "lz4", "lzo", "zst", "xz", "deflate"]),
    ("ARCHIVE", &["zip", "tar", "tgz", "jar", "war"]),
    ("IMAGE", &["jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff"]),
    ("VIDEO", &["mp4", "avi", "mov", "mkv"]),
    ("AUDIO", &["mp3", "wav", "flac", "ogg"]),
    ("SCRIPT", &["sh", "py", "pig", "hql", "sql", "scala", "r"]),
    ("TEMP", &["tmp", "temp", "swp", "crc"]),
    (OTHER, &[]),
];

static BY_EXTENSION: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    FILE_TYPES
        .iter()
        .flat_map(|(label, extensions)| extensions.iter().map(move |ext| (*ext, *label)))
        .collect()
});

/// Type label of a local file name
///
/// Hidden files without a further dot (`.bashrc`) have no extension.
pub fn classify(name: &str) -> &'static str {
    let extension = match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => &name[idx + 1..],
        _ => return OTHER,
    };
    BY_EXTENSION
        .get(extension.to_ascii_lowercase().as_str())
        .copied()
        .unwrap_or(OTHER)
}

/// Type label of a record; `None` for directories
pub fn file_type(record: &Record) -> Option<&'static str> {
    record.is_file().then(|| classify(&record.name))
}

/// Every label in canonical order
pub fn labels() -> Vec<String> {
    FILE_TYPES.iter().map(|(label, _)| label.to_string()).collect()
}
