//! Unified error type for galleria.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for API handlers to derive an HTTP status code via [`Error::http_status`].

use std::fmt;

/// Unified error type covering all failure modes in galleria.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "image", "tag").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A conflicting resource already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An upload exceeded its configured size limit.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// A database operation failed.
    #[error("Database error: {source}")]
    Database {
        /// The underlying database error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The ZIP container could not be opened or read.
    #[error("Archive error: {0}")]
    Archive(String),

    /// The import manifest (or one of its entries) is malformed.
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// An asset the manifest requires is absent from the archive.
    #[error("Missing asset: {0}")]
    MissingAsset(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::Validation(_) => 400,
            Error::Conflict(_) => 409,
            Error::PayloadTooLarge(_) => 413,
            Error::Database { .. } => 500,
            Error::Io { .. } => 500,
            Error::Archive(_) => 422,
            Error::Manifest(_) => 422,
            Error::MissingAsset(_) => 422,
            Error::Internal(_) => 500,
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Database`].
    pub fn database(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Database {
            source: source.into(),
        }
    }

    /// Convenience constructor for [`Error::Archive`].
    pub fn archive(message: impl fmt::Display) -> Self {
        Error::Archive(message.to_string())
    }

    /// Convenience constructor for [`Error::Manifest`].
    pub fn manifest(message: impl fmt::Display) -> Self {
        Error::Manifest(message.to_string())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = Error::not_found("image", "abc-123");
        assert_eq!(err.to_string(), "image not found: abc-123");
        assert_eq!(err.http_status(), 404);
    }

    #[test]
    fn validation_display() {
        let err = Error::Validation("title is required".into());
        assert_eq!(err.to_string(), "Validation error: title is required");
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn payload_too_large_maps_to_413() {
        let err = Error::PayloadTooLarge("archive exceeds 1 MB".into());
        assert_eq!(err.http_status(), 413);
    }

    #[test]
    fn conflict_display() {
        let err = Error::Conflict("import already running".into());
        assert_eq!(err.to_string(), "Conflict: import already running");
        assert_eq!(err.http_status(), 409);
    }

    #[test]
    fn database_display() {
        let err = Error::database("connection refused");
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn archive_and_manifest_display() {
        let err = Error::archive("invalid Zip archive");
        assert_eq!(err.to_string(), "Archive error: invalid Zip archive");
        assert_eq!(err.http_status(), 422);

        let err = Error::manifest("missing field `title`");
        assert_eq!(err.to_string(), "Manifest error: missing field `title`");
    }

    #[test]
    fn missing_asset_display() {
        let err = Error::MissingAsset("main image img/a.png".into());
        assert_eq!(err.to_string(), "Missing asset: main image img/a.png");
    }

    #[test]
    fn result_alias() {
        fn ok_fn() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(ok_fn().unwrap(), 42);

        fn err_fn() -> Result<i32> {
            Err(Error::Internal("boom".into()))
        }
        assert!(err_fn().is_err());
    }
}
