//! Path utilities for asset filenames and web paths.
//!
//! Archive entry names are untrusted input. Everything that ends up as a
//! filename under the upload root goes through [`secure_filename`] or
//! [`archive_basename`] first, so no asset can be written outside that root.

use std::path::Path;

/// List of supported image file extensions.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Reserved device names that Windows refuses as plain filenames.
const WINDOWS_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Check if a path has an image file extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use galleria_core::paths::is_image_file;
///
/// assert!(is_image_file(Path::new("poster.jpg")));
/// assert!(is_image_file(Path::new("/path/to/image.PNG")));
/// assert!(!is_image_file(Path::new("data.json")));
/// ```
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Return the last component of an archive-internal path.
///
/// Both `/` and `\` count as separators so a Windows-built archive cannot
/// smuggle directory components past the split.
///
/// ```
/// use galleria_core::paths::archive_basename;
///
/// assert_eq!(archive_basename("images/cat.png"), "cat.png");
/// assert_eq!(archive_basename("dir\\dog.png"), "dog.png");
/// assert_eq!(archive_basename("flat.png"), "flat.png");
/// ```
pub fn archive_basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Turn an arbitrary name into a filesystem-safe, traversal-free filename.
///
/// Non-ASCII characters are dropped, path separators become spaces,
/// whitespace runs collapse to `_`, anything outside `[A-Za-z0-9_.-]` is
/// removed and leading/trailing `.`/`_` are stripped. Windows device names
/// get a `_` prefix. The result can be empty; callers must treat that as
/// an unusable name.
///
/// ```
/// use galleria_core::paths::secure_filename;
///
/// assert_eq!(secure_filename("My cool movie.mov"), "My_cool_movie.mov");
/// assert_eq!(secure_filename("../../../etc/passwd"), "etc_passwd");
/// assert_eq!(secure_filename("con.png"), "_con.png");
/// ```
pub fn secure_filename(name: &str) -> String {
    let ascii: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");

    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    let trimmed = kept.trim_matches(|c| c == '.' || c == '_');

    if is_windows_device_name(trimmed) {
        format!("_{trimmed}")
    } else {
        trimmed.to_string()
    }
}

fn is_windows_device_name(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or_default().to_ascii_uppercase();
    !stem.is_empty() && WINDOWS_DEVICE_NAMES.contains(&stem.as_str())
}

/// Build the web-relative path under which an uploaded file is served.
///
/// ```
/// use galleria_core::paths::web_path;
///
/// assert_eq!(web_path("static/uploads", "a.png"), "/static/uploads/a.png");
/// assert_eq!(web_path("/uploads/", "a.png"), "/uploads/a.png");
/// ```
pub fn web_path(upload_folder: &str, filename: &str) -> String {
    format!("/{}/{}", upload_folder.trim_matches('/'), filename)
}
