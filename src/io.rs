use std::{
    fs::File,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use crate::result::Result;

/// Characters that are never kept in a file name
const FORBIDDEN_CHARS: [char; 13] = [
    '\'', '"', '/', '\\', '|', '~', '$', '#', ':', '*', '?', '<', '>',
];

/// Prefix of the temporary files written while a download is in progress
pub const PARTIAL_PREFIX: &str = ".partial-";

/// Remove potentially problematic characters from a title so that it can
/// be used as a file name, and collapse the whitespace left behind.
pub fn sanitize_title(title: &str) -> String {
    title
        .split(|c: char| FORBIDDEN_CHARS.contains(&c) || c.is_control())
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Create a hidden temporary file in the directory and return its handle.
///
/// The file is removed when the handle is dropped.
/// **As such, one must either persist it or accept that its content is lost.**
pub fn partial_file_in(dir: &Path) -> Result<NamedTempFile> {
    Ok(tempfile::Builder::new()
        .prefix(PARTIAL_PREFIX)
        .tempfile_in(dir)?)
}

/// List the regular, non-hidden files of a directory, sorted by name.
///
/// A missing directory has no files.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut files = Vec::new();
    for entry in dir.read_dir()? {
        let entry = entry?;
        let is_hidden = entry.file_name().to_string_lossy().starts_with('.');
        if entry.file_type()?.is_file() && !is_hidden {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Flush the file content to disk before its handle is closed
pub fn sync_file(file: &File) -> Result<()> {
    file.sync_all()?;
    Ok(())
}
