//! galleria-db: database access and persistence layer.
//!
//! This crate provides SQLite-backed storage with connection pooling,
//! embedded migrations, typed models, and explicit repository operations
//! for images, tags and reference images.
//!
//! # Example
//!
//! ```
//! use galleria_db::pool::{get_conn, init_memory_pool};
//! use galleria_db::queries::tags;
//!
//! let pool = init_memory_pool().unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let tag = tags::find_or_create_tag(&conn, "portrait").unwrap();
//! assert_eq!(tag.name, "portrait");
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
