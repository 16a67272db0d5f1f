//! On-disk layout of uploaded and predicted images.
//!
//! ```text
//! <root>/original/<name>-<uid><ext>             downloaded object-store inputs
//! <root>/predicted/<name>-<uid>.jpg             annotated images (shared)
//! <root>/chats/<chat_id>/predicted/<name>-<uid>.jpg   annotated images per chat
//! ```
//!
//! File names are derived with plain string rules (last `/` separates the
//! base name, last non-leading `.` separates the extension) so that keys
//! coming from the object store map to the same names on every platform.

use std::path::{Path, PathBuf};

/// Default uploads root, relative to the working directory.
pub const DEFAULT_UPLOADS_DIR: &str = "uploads";

/// Extension used when an object key has none.
pub const DEFAULT_EXTENSION: &str = ".jpg";

const ORIGINAL_DIR: &str = "original";
const PREDICTED_DIR: &str = "predicted";
const CHATS_DIR: &str = "chats";

/// Directory layout rooted at the uploads directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Read the root from `UPLOADS_DIR` (default: `uploads`).
    pub fn from_env() -> Self {
        let root = std::env::var("UPLOADS_DIR").unwrap_or_else(|_| DEFAULT_UPLOADS_DIR.into());
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding downloaded originals.
    pub fn original_dir(&self) -> PathBuf {
        self.root.join(ORIGINAL_DIR)
    }

    /// Shared directory for annotated images of jobs without a chat.
    pub fn predicted_dir(&self) -> PathBuf {
        self.root.join(PREDICTED_DIR)
    }

    pub fn chats_dir(&self) -> PathBuf {
        self.root.join(CHATS_DIR)
    }

    /// Local destination for an object-store key.
    pub fn original_path(&self, key: &str, uid: &str) -> PathBuf {
        self.original_dir().join(original_file_name(key, uid))
    }

    /// Predicted-image directory for a job, namespaced by chat if present.
    ///
    /// `chat_id` must already have passed [`is_safe_segment`].
    pub fn predicted_dir_for(&self, chat_id: Option<&str>) -> PathBuf {
        match chat_id {
            Some(chat_id) => self.chats_dir().join(chat_id).join(PREDICTED_DIR),
            None => self.predicted_dir(),
        }
    }

    /// Full predicted-image path for a resolved input.
    pub fn predicted_path(&self, chat_id: Option<&str>, input: &Path, uid: &str) -> PathBuf {
        self.predicted_dir_for(chat_id)
            .join(predicted_file_name(input, uid))
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::new(DEFAULT_UPLOADS_DIR)
    }
}

/// Strip leading slashes from an object-store key.
pub fn object_key(img: &str) -> &str {
    img.trim_start_matches('/')
}

/// Last path component of a `/`-separated string.
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Split a file name into `(stem, extension)`, extension including the dot.
///
/// Only the last dot counts, and dots at the start of the name (dotfiles)
/// never begin an extension.
pub fn split_ext(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(dot) if name[..dot].chars().any(|c| c != '.') => (&name[..dot], &name[dot..]),
        _ => (name, ""),
    }
}

/// `<stem>-<uid><ext>` for an object key, defaulting the extension to `.jpg`.
pub fn original_file_name(key: &str, uid: &str) -> String {
    let (stem, ext) = split_ext(base_name(object_key(key)));
    let ext = if ext.is_empty() { DEFAULT_EXTENSION } else { ext };
    format!("{stem}-{uid}{ext}")
}

/// `<stem-of-input>-<uid>.jpg`.
pub fn predicted_file_name(input: &Path, uid: &str) -> String {
    let input = input.to_string_lossy();
    let (stem, _) = split_ext(base_name(&input));
    format!("{stem}-{uid}.jpg")
}

/// Whether `segment` can be used as a single directory name under the
/// chats root without escaping it.
pub fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0'])
}
