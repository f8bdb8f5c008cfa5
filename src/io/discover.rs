use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::debug;

use crate::error::IoError;

/// Find files matching `*.tif*` under `dir`, sorted by path.
///
/// With `recursive` every subdirectory is searched as well. Matching is
/// case-insensitive, so `SCAN.TIF` is found too. Unreadable entries are
/// skipped.
pub fn find_tiff_files(dir: impl AsRef<Path>, recursive: bool) -> Result<Vec<PathBuf>, IoError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(IoError::NotFound(dir.display().to_string()));
    }

    let escaped = Pattern::escape(&dir.to_string_lossy());
    let pattern = if recursive {
        format!("{escaped}/**/*.tif*")
    } else {
        format!("{escaped}/*.tif*")
    };
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    let entries = glob::glob_with(&pattern, options).map_err(|e| IoError::Read {
        path: dir.display().to_string(),
        message: format!("invalid search pattern: {e}"),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                debug!(error = %e, "Skipping unreadable directory entry");
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}
