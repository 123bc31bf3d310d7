//! Content-Type Classifier
//!
//! Maps file extensions and declared MIME types to a normalized media kind:
//! - Plain text: decoded locally, never sent to the model for extraction
//! - Image: passed straight to the multimodal analysis prompt
//! - Archive: expanded and aggregated entry by entry
//! - Everything else: routed through model-based text extraction

pub const MIME_TEXT: &str = "text/plain";
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_WORD: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_EXCEL: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MIME_POWERPOINT: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_PNG: &str = "image/png";
pub const MIME_ZIP: &str = "application/zip";
pub const MIME_BINARY: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    PlainText,
    Pdf,
    OfficeDocument,
    Image,
    Archive,
    Binary,
}

/// Static extension tables
const TEXT_EXTENSIONS: &[&str] = &["txt", "csv", "tsv", "md", "json"];
const WORD_EXTENSIONS: &[&str] = &["doc", "docx"];
const EXCEL_EXTENSIONS: &[&str] = &["xls", "xlsx"];
const POWERPOINT_EXTENSIONS: &[&str] = &["ppt", "pptx"];
const JPEG_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

const ARCHIVE_MIME_TYPES: &[&str] = &[
    "application/zip",
    "application/x-zip-compressed",
    "application/x-zip",
];

const OFFICE_MIME_PREFIXES: &[&str] = &[
    "application/vnd.openxmlformats-officedocument.",
    "application/vnd.ms-",
    "application/msword",
];

/// Content-type classifier
pub struct ContentClassifier;

impl ContentClassifier {
    /// Infer a MIME type from the extension of an archive-relative path.
    pub fn media_type_for_path(path: &str) -> &'static str {
        let Some(extension) = extension_of(path) else {
            return MIME_BINARY;
        };
        let ext = extension.as_str();

        if TEXT_EXTENSIONS.contains(&ext) {
            MIME_TEXT
        } else if ext == "pdf" {
            MIME_PDF
        } else if WORD_EXTENSIONS.contains(&ext) {
            MIME_WORD
        } else if EXCEL_EXTENSIONS.contains(&ext) {
            MIME_EXCEL
        } else if POWERPOINT_EXTENSIONS.contains(&ext) {
            MIME_POWERPOINT
        } else if JPEG_EXTENSIONS.contains(&ext) {
            MIME_JPEG
        } else if ext == "png" {
            MIME_PNG
        } else if ext == "zip" {
            MIME_ZIP
        } else {
            MIME_BINARY
        }
    }

    /// Classify a declared (already normalized) MIME type.
    pub fn kind_of_mime(media_type: &str) -> MediaKind {
        if Self::is_archive(media_type) {
            MediaKind::Archive
        } else if media_type.starts_with("text/") {
            MediaKind::PlainText
        } else if media_type.starts_with("image/") {
            MediaKind::Image
        } else if media_type == MIME_PDF {
            MediaKind::Pdf
        } else if OFFICE_MIME_PREFIXES
            .iter()
            .any(|prefix| media_type.starts_with(prefix))
        {
            MediaKind::OfficeDocument
        } else {
            MediaKind::Binary
        }
    }

    pub fn is_archive(media_type: &str) -> bool {
        ARCHIVE_MIME_TYPES.contains(&media_type)
    }
}

/// Lower-cased text after the last path separator and the last dot.
fn extension_of(path: &str) -> Option<String> {
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let (stem, ext) = file_name.rsplit_once('.')?;
    // ".env" style names have no extension
    if ext.is_empty() || stem.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}
