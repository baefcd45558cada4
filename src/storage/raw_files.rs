//! Raw File Storage.
//!
//! # Security
//! - Files are written atomically (write, sync, rename).
//! - Reads are capped so a corrupted directory cannot exhaust memory.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use rand_core::{OsRng, RngCore};

use super::StorageError;

/// Largest file `read_file` accepts.
pub const MAX_FILE_LEN: u64 = 16 * 1024 * 1024;

/// Writes data to a file atomically, creating the parent directory if needed.
pub fn write_atomic<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<(), StorageError> {
    let path = path.as_ref();
    let dir = path.parent().ok_or(StorageError::InvalidPath)?;
    let filename = path.file_name().ok_or(StorageError::InvalidPath)?;
    fs::create_dir_all(dir)?;

    // Unique per writer, so concurrent writes of one path never share a temp file.
    let temp_path = dir.join(format!(".{}.{:016x}.tmp", filename.to_string_lossy(), OsRng.next_u64()));

    let result = (|| {
        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    Ok(result?)
}

/// Reads a whole file.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, StorageError> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if len > MAX_FILE_LEN {
        return Err(StorageError::TooLarge(len));
    }

    let mut buffer = Vec::with_capacity(len as usize);
    file.read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Files in `dir` with the given extension, sorted by name. A missing
/// directory lists as empty.
pub fn list_files<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Vec<PathBuf>, StorageError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |e| e == extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
