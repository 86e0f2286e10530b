//! Best-effort content type guessing from file names

use std::path::Path;

/// Content type used when the file name gives no hint
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Guess the content type of `path` from its extension
#[must_use]
pub fn guess_content_type(path: &Path) -> String {
    path.file_name()
        .and_then(|name| mime_guess::from_path(Path::new(name)).first_raw())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

/// Check whether a content type denotes text-like data
#[must_use]
pub fn is_textual(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence.starts_with("text/")
        || essence == "application/json"
        || essence.ends_with("+json")
        || essence.ends_with("+xml")
        || essence == "application/xml"
        || essence == "application/yaml"
        || essence == "application/x-yaml"
}
