//! galleria-core: shared types, IDs, errors, and path helpers.
//!
//! This crate is the foundational dependency for the other galleria crates,
//! providing type-safe identifiers, a unified error type, gallery-domain
//! enums, and the filename sanitizer used when assets land on disk.

pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
