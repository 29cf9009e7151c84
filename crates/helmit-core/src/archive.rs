//! Reading `.tgz` chart archives into named file blobs
//!
//! A chart archive is a gzip-compressed tar stream whose entries all live under
//! a single top-level directory (the chart name). That directory is stripped so
//! the resulting names match what a directory walk of the chart would produce.

use flate2::read::GzDecoder;
use std::io::Read;
use tar::Archive;

use crate::chart::ChartFile;
use crate::error::{CoreError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Decode a gzip-compressed tar stream held in memory
pub fn read_archive(data: &[u8]) -> Result<Vec<ChartFile>> {
    if !data.starts_with(&GZIP_MAGIC) {
        return Err(CoreError::archive("not a gzip stream"));
    }

    let mut archive = Archive::new(GzDecoder::new(data));
    let entries = archive
        .entries()
        .map_err(|e| CoreError::archive(e.to_string()))?;

    let mut files = Vec::new();
    for entry in entries {
        let mut entry = entry.map_err(|e| CoreError::archive(e.to_string()))?;
        let raw = String::from_utf8_lossy(&entry.path_bytes()).into_owned();

        let kind = entry.header().entry_type();
        if kind.is_dir() {
            continue;
        }
        if !kind.is_file() {
            tracing::debug!(entry = %raw, "skipping non-regular archive entry");
            continue;
        }

        let name = strip_chart_dir(&raw)?;

        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|e| CoreError::archive(format!("{raw}: {e}")))?;

        files.push(ChartFile::new(name, content));
    }

    if files.is_empty() {
        return Err(CoreError::archive("no files in chart archive"));
    }

    Ok(files)
}

/// Drop the leading chart directory and reject names escaping it
fn strip_chart_dir(raw: &str) -> Result<String> {
    let normalized = raw.replace('\\', "/");
    if normalized.starts_with('/') {
        return Err(CoreError::archive("chart illegally contains absolute paths"));
    }

    let rest: Vec<&str> = normalized
        .split('/')
        .skip(1)
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();

    if rest.is_empty() {
        return Err(CoreError::archive(format!(
            "chart illegally contains content outside the base directory: {raw:?}"
        )));
    }
    if rest.contains(&"..") {
        return Err(CoreError::archive("chart illegally references parent directory"));
    }

    Ok(rest.join("/"))
}
