//! Archive expansion for documents uploaded as zip files.
//!
//! Entries are read eagerly into memory, in the order they appear in the
//! central directory. Directories and platform metadata are skipped.

use crate::classifier::{ContentClassifier, MIME_BINARY};
use crate::error::AnalysisError;
use crate::models::{ArchiveEntry, DocumentPayload};
use crate::Result;
use std::io::{Cursor, Read};
use tracing::debug;
use zip::ZipArchive;

/// Folder created by macOS Finder when compressing.
const MACOS_METADATA_PREFIX: &str = "__MACOSX/";
const METADATA_FILE_NAMES: &[&str] = &[".DS_Store"];

/// Archive handler for zip files.
pub struct ArchiveExpander;

impl ArchiveExpander {
    /// Expand a zip buffer into its eligible file entries.
    pub fn expand(bytes: &[u8]) -> Result<Vec<ArchiveEntry>> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| AnalysisError::ArchiveCorrupt(e.to_string()))?;

        let mut entries = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| AnalysisError::ArchiveCorrupt(e.to_string()))?;
            let path = file.name().to_string();

            if file.is_dir() || is_platform_metadata(&path) {
                debug!(path = %path, "Skipping archive entry");
                continue;
            }

            let mut buffer = Vec::new();
            file.read_to_end(&mut buffer).map_err(|e| {
                AnalysisError::ArchiveCorrupt(format!("failed to read '{}': {}", path, e))
            })?;

            // Nested archives are not expanded; they go out as opaque binary.
            let media_type = match ContentClassifier::media_type_for_path(&path) {
                mime if ContentClassifier::is_archive(mime) => MIME_BINARY,
                mime => mime,
            };
            debug!(path = %path, media_type, size = buffer.len(), "Expanded archive entry");

            entries.push(ArchiveEntry {
                payload: DocumentPayload::new(buffer, media_type),
                path,
            });
        }

        Ok(entries)
    }
}

fn is_platform_metadata(path: &str) -> bool {
    if path.starts_with(MACOS_METADATA_PREFIX) {
        return true;
    }
    let file_name = path.rsplit('/').next().unwrap_or(path);
    METADATA_FILE_NAMES.contains(&file_name)
}
