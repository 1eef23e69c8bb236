//! File system utilities for pipeline artefacts

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::Result;

/// Ensures a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    } else if !path.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("Path exists but is not a directory: {:?}", path),
        )
        .into());
    }
    Ok(())
}

/// Ensures the parent directory of a file path exists
pub fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        | Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        | _ => Ok(()),
    }
}

/// `<dir>/<stem>_<TICKER>.csv`
pub fn table_path(dir: &Path, stem: &str, ticker: &str) -> PathBuf {
    dir.join(format!("{}_{}.csv", stem, ticker.to_uppercase()))
}

/// Newest (lexicographically last) `<prefix>*.csv` in `dir`, if any
pub fn latest_with_prefix(dir: &Path, prefix: &str) -> Result<Option<PathBuf>> {
    if !dir.exists() {
        return Ok(None);
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path.is_file()
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(prefix) && n.ends_with(".csv"))
                .unwrap_or(false);
        if matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files.pop())
}

/// Ticker encoded in a `<prefix><TICKER>.csv` file name
pub fn ticker_from_table_path(path: &Path, prefix: &str) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let ticker = name.strip_prefix(prefix)?.strip_suffix(".csv")?;
    if ticker.is_empty() {
        None
    } else {
        Some(ticker.to_uppercase())
    }
}
