//! File helpers shared by the record types.
//!
//! Every write is a whole-file replace: the payload goes to a uniquely named
//! sibling temp file which is then renamed over the target. Read-modify-write
//! cycles on one data file are serialized with [`lock_file`].

use crate::error::{StudioError, StudioResult};
use once_cell::sync::Lazy;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use walkdir::WalkDir;

pub const VIDEO_DATA_FILE: &str = "video_data.json";
pub const SERIES_DATA_FILE: &str = "series_data.json";
pub const IMAGES_DIR: &str = "images";
pub const AUDIOS_DIR: &str = "audios";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

static FILE_LOCKS: Lazy<Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Exclusive access to `path` within this process until the guard drops.
/// Callers must not take the same lock twice.
pub async fn lock_file(path: &Path) -> OwnedMutexGuard<()> {
    let lock = {
        let mut locks = FILE_LOCKS.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(path.to_path_buf()).or_default())
    };
    lock.lock_owned().await
}

pub async fn file_exists(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

/// Reads and parses `path`. A missing file is `Ok(None)`.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> StudioResult<Option<T>> {
    let text = match fs::read_to_string(path).await {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(StudioError::io(path, err)),
    };

    serde_json::from_str(&text)
        .map(Some)
        .map_err(|source| StudioError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> StudioResult<()> {
    let mut body = serde_json::to_vec_pretty(value)?;
    body.push(b'\n');
    write_replace(path, &body).await
}

pub async fn write_replace(path: &Path, data: &[u8]) -> StudioResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)
        .await
        .map_err(|e| StudioError::io(&parent, e))?;

    let target = path.to_path_buf();
    let data = data.to_vec();
    tokio::task::spawn_blocking(move || persist_in(&parent, &target, &data))
        .await
        .map_err(|e| StudioError::io(path, std::io::Error::other(e)))?
}

fn persist_in(dir: &Path, target: &Path, data: &[u8]) -> StudioResult<()> {
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StudioError::io(dir, e))?;
    tmp.write_all(data)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| StudioError::io(tmp.path(), e))?;
    tmp.persist(target)
        .map_err(|e| StudioError::io(target, e.error))?;
    Ok(())
}

/// Number of image files directly inside `dir`; a missing directory counts zero.
pub async fn count_image_files(dir: &Path) -> StudioResult<usize> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(StudioError::io(dir, err)),
    };

    let mut count = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StudioError::io(dir, e))?
    {
        let path = entry.path();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_file && has_image_extension(&path) {
            count += 1;
        }
    }
    Ok(count)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Immediate subdirectories of `dir`, sorted by name. Missing `dir` is empty.
pub fn subdirectories(dir: &Path) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .collect();
    out.sort();
    out
}

/// Video ordinal encoded in a directory name (`"10"` -> 10).
pub fn dir_ordinal(path: &Path) -> Option<u32> {
    path.file_name()
        .and_then(OsStr::to_str)
        .and_then(|name| name.parse::<u32>().ok())
}

/// Immediate subdirectories whose name is a number, in numeric order.
pub fn numbered_subdirectories(dir: &Path) -> Vec<(u32, PathBuf)> {
    let mut out: Vec<(u32, PathBuf)> = subdirectories(dir)
        .into_iter()
        .filter_map(|path| dir_ordinal(&path).map(|n| (n, path)))
        .collect();
    out.sort_by_key(|(n, _)| *n);
    out
}
