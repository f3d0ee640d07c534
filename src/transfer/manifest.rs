//! The `data.json` manifest carried inside import/export archives.
//!
//! The manifest is parsed in two steps: the document is read into a list of
//! raw JSON values, then each value is decoded into a [`ManifestItem`] on
//! its own. A malformed entry therefore fails only that entry.

use std::io::Read;

use galleria_core::{Error, Result, CATEGORY_GALLERY, DEFAULT_IMAGE_TYPE};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Archive-internal name of the manifest.
pub const MANIFEST_NAME: &str = "data.json";

/// Archive folder that structured references are looked up in.
pub const ASSET_DIR: &str = "images";

/// Top-level manifest document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportManifest {
    #[serde(default)]
    pub images: Vec<ManifestItem>,
}

/// One image entry of the manifest.
///
/// Unknown keys, including a manifest-supplied `status`, are ignored.
/// Explicit `null`s fall back to the same defaults as absent keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestItem {
    pub title: String,
    #[serde(default, deserialize_with = "null_default")]
    pub author: String,
    #[serde(default, deserialize_with = "null_default")]
    pub prompt: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(rename = "type", default = "default_type", deserialize_with = "null_type")]
    pub image_type: String,
    #[serde(default = "default_category", deserialize_with = "null_category")]
    pub category: String,
    #[serde(default)]
    pub zip_image_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_thumb_path: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub refs: Vec<RefEntry>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub heat_score: i64,
}

/// A reference image entry, in either of the two shapes archives use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RefEntry {
    /// Older archives list the archive path directly.
    Legacy(String),
    Structured(StructuredRef),
    /// Anything else; skipped on import.
    Unrecognized(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredRef {
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_int")]
    pub position: Option<i64>,
    #[serde(default, deserialize_with = "null_default")]
    pub is_placeholder: bool,
}

fn default_type() -> String {
    DEFAULT_IMAGE_TYPE.to_string()
}

fn default_category() -> String {
    CATEGORY_GALLERY.to_string()
}

fn null_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn null_type<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Option::<String>::deserialize(deserializer).map(|v| v.unwrap_or_else(default_type))
}

fn null_category<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<String, D::Error> {
    Option::<String>::deserialize(deserializer).map(|v| v.unwrap_or_else(default_category))
}

/// Coerce a JSON number or numeric string to an integer.
///
/// Fractions are truncated toward zero. `null` yields `None`; booleans,
/// non-numeric strings and other shapes are errors.
fn coerce_int(value: &Value) -> std::result::Result<Option<i64>, String> {
    let from_float = |f: f64| {
        if f.is_finite() {
            Ok(Some(f.trunc() as i64))
        } else {
            Err(format!("{f} is not a finite number"))
        }
    };
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Some(i)),
            None => from_float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(i) => Ok(Some(i)),
                Err(_) => s
                    .parse::<f64>()
                    .map_err(|_| format!("expected a number, found {s:?}"))
                    .and_then(from_float),
            }
        }
        other => Err(format!("expected a number, found {other}")),
    }
}

fn lenient_int<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    lenient_opt_int(deserializer).map(Option::unwrap_or_default)
}

fn lenient_opt_int<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<i64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    coerce_int(&value).map_err(D::Error::custom)
}

impl ManifestItem {
    /// Decode a single raw manifest entry.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::manifest(format!("invalid item: {e}")))
    }
}

/// Best-effort title of a raw entry, for progress output.
pub fn raw_title(value: &Value) -> Option<&str> {
    value.get("title").and_then(Value::as_str)
}

/// Read the manifest document and return its raw `images` entries.
///
/// A missing `images` key means an empty import. A document that is not
/// valid JSON, is not an object, or whose `images` is not a list is
/// rejected as a whole.
pub fn read_entries<R: Read>(reader: R) -> Result<Vec<Value>> {
    let doc: Value = serde_json::from_reader(reader)
        .map_err(|e| Error::manifest(format!("{MANIFEST_NAME} is not valid JSON: {e}")))?;

    let Value::Object(mut doc) = doc else {
        return Err(Error::manifest(format!("{MANIFEST_NAME} must be a JSON object")));
    };

    match doc.remove("images") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(Error::manifest("\"images\" must be a list")),
    }
}
