//! Media file selection inside a fetched payload.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{WorkerError, WorkerResult};

/// Extensions recognized as playable media, compared case-insensitively.
pub const MEDIA_EXTENSIONS: [&str; 3] = ["mp4", "mkv", "avi"];

/// File chosen for transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Size in bytes.
    pub size_bytes: u64,
}

/// Pick the largest media file under `root`.
///
/// Entries are visited in file-name order, so equal sizes resolve to the first
/// name.
///
/// # Errors
///
/// Returns [`WorkerError::NoMediaFile`] when nothing matches and
/// [`WorkerError::Scan`] when the tree cannot be walked.
pub fn select_largest_media(root: &Path) -> WorkerResult<SelectedFile> {
    let mut best: Option<SelectedFile> = None;
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| WorkerError::Scan {
            path: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() || !is_media(entry.path()) {
            continue;
        }
        let size_bytes = entry
            .metadata()
            .map_err(|source| WorkerError::Scan {
                path: entry.path().to_path_buf(),
                source,
            })?
            .len();
        if best.as_ref().is_none_or(|current| size_bytes > current.size_bytes) {
            best = Some(SelectedFile {
                path: entry.into_path(),
                size_bytes,
            });
        }
    }
    best.ok_or_else(|| WorkerError::NoMediaFile {
        path: root.to_path_buf(),
    })
}

fn is_media(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            MEDIA_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}
