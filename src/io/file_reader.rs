use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::error::IoError;

use super::range_reader::{check_range, RangeReader};

/// Chunk size used when streaming a file through the hasher.
pub const HASH_CHUNK_SIZE: usize = 4096;

/// Range reader backed by a file on local disk.
///
/// The file handle sits behind a mutex so the reader stays `Sync`; each read
/// is a seek followed by `read_exact`.
#[derive(Debug)]
pub struct FileRangeReader {
    file: Mutex<File>,
    size: u64,
    identifier: String,
}

impl FileRangeReader {
    /// Open `path` for range reads.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| IoError::read(path, e))?;
        let size = file
            .metadata()
            .map_err(|e| IoError::read(path, e))?
            .len();

        Ok(Self {
            file: Mutex::new(file),
            size,
            identifier: path.display().to_string(),
        })
    }
}

impl RangeReader for FileRangeReader {
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_range(offset, len, self.size)?;

        let read_err = |e: std::io::Error| IoError::Read {
            path: self.identifier.clone(),
            message: e.to_string(),
        };

        let mut file = self.file.lock().map_err(|_| IoError::Read {
            path: self.identifier.clone(),
            message: "file handle poisoned".to_string(),
        })?;
        file.seek(SeekFrom::Start(offset)).map_err(read_err)?;

        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf).map_err(read_err)?;
        Ok(Bytes::from(buf))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Size of a file in bytes.
pub fn file_size(path: impl AsRef<Path>) -> Result<u64, IoError> {
    let path = path.as_ref();
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| IoError::read(path, e))
}

/// Hex-encoded SHA-256 digest of a file's raw bytes.
///
/// The file is streamed in [`HASH_CHUNK_SIZE`] chunks.
pub fn file_digest(path: impl AsRef<Path>) -> Result<String, IoError> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| IoError::read(path, e))?;
    let mut hasher = Sha256::new();
    let mut chunk = [0u8; HASH_CHUNK_SIZE];

    loop {
        let n = file.read(&mut chunk).map_err(|e| IoError::read(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&chunk[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Remove a file.
pub fn remove_file(path: impl AsRef<Path>) -> Result<(), IoError> {
    let path = path.as_ref();
    std::fs::remove_file(path).map_err(|e| IoError::remove(path, e))
}

/// Move `path` into `dir`, keeping its file name when it is free.
///
/// A taken name gets a counter, `x.tif` then `x (1).tif`, so an existing
/// file in `dir` is never replaced. Falls back to copy-and-remove when a
/// rename crosses filesystems.
pub fn move_into(path: impl AsRef<Path>, dir: impl AsRef<Path>) -> Result<PathBuf, IoError> {
    let path = path.as_ref();
    let dir = dir.as_ref();

    std::fs::create_dir_all(dir).map_err(|e| IoError::write(dir, e))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| IoError::NotFound(path.display().to_string()))?;
    let target = free_target(dir, Path::new(file_name));

    if std::fs::rename(path, &target).is_err() {
        std::fs::copy(path, &target).map_err(|e| IoError::write(&target, e))?;
        remove_file(path)?;
    }

    Ok(target)
}

/// First name in `dir` not yet taken by `name` or its numbered variants.
fn free_target(dir: &Path, name: &Path) -> PathBuf {
    let plain = dir.join(name);
    if !plain.exists() {
        return plain;
    }

    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (1u64..)
        .map(|n| dir.join(format!("{stem} ({n}){ext}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(plain)
}
