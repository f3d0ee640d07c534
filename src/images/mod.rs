//! Asset storage for gallery images.
//!
//! Files are kept flat under the configured upload folder; the database
//! only records their web paths.

mod publish;
mod storage;

pub use publish::{publish_image, UploadForm};
pub use storage::UploadStore;
