//! Gallery-domain enums and defaults.
//!
//! Enums serialize in lowercase and implement `Display`/`FromStr` manually so
//! the same spelling is used in the database, the JSON API and the CLI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Image type assumed when a manifest entry does not name one.
pub const DEFAULT_IMAGE_TYPE: &str = "txt2img";

/// Category for regular gallery entries.
pub const CATEGORY_GALLERY: &str = "gallery";

/// Category for prompt templates.
pub const CATEGORY_TEMPLATE: &str = "template";

// ---------------------------------------------------------------------------
// ImageStatus
// ---------------------------------------------------------------------------

/// Moderation state of a published image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    /// Waiting in the moderation queue. Every import lands here.
    #[default]
    Pending,
    /// Visible in the public gallery.
    Approved,
    /// Hidden after review.
    Rejected,
}

impl ImageStatus {
    /// All statuses, in queue order.
    pub const ALL: [ImageStatus; 3] = [Self::Pending, Self::Approved, Self::Rejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(Error::Validation(format!("unknown image status '{other}'"))),
        }
    }
}
