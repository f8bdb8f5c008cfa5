//! ImageJ hyperstack metadata.
//!
//! ImageJ stores its metadata as `key=value` lines in the first page's
//! ImageDescription, starting with `ImageJ=<version>`:
//!
//! ```text
//! ImageJ=1.53t
//! images=24
//! channels=2
//! slices=3
//! frames=4
//! hyperstack=true
//! ```
//!
//! Values are typed the way readers conventionally type them: integer
//! first, then float, then boolean, otherwise text.

use std::fmt;

use serde::Serialize;

/// Prefix that marks an ImageJ description.
pub const IMAGEJ_MARKER: &str = "ImageJ=";

// =============================================================================
// MetadataValue
// =============================================================================

/// A typed metadata value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl MetadataValue {
    /// Type a raw value string.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(v) = raw.parse::<i64>() {
            return MetadataValue::Int(v);
        }
        if let Ok(v) = raw.parse::<f64>() {
            return MetadataValue::Float(v);
        }
        match raw.to_ascii_lowercase().as_str() {
            "true" => MetadataValue::Bool(true),
            "false" => MetadataValue::Bool(false),
            _ => MetadataValue::Text(raw.to_string()),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            MetadataValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Int(v) => write!(f, "{v}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Bool(v) => write!(f, "{v}"),
            MetadataValue::Text(v) => f.write_str(v),
        }
    }
}

// =============================================================================
// ImageJMetadata
// =============================================================================

/// Ordered ImageJ key/value metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ImageJMetadata {
    entries: Vec<(String, MetadataValue)>,
}

impl ImageJMetadata {
    /// Whether a description string is ImageJ metadata.
    pub fn is_imagej_description(description: &str) -> bool {
        description.trim_start().starts_with(IMAGEJ_MARKER)
    }

    /// Parse an ImageDescription.
    ///
    /// Returns `None` when the description is not ImageJ metadata. Lines
    /// without a `=` are ignored.
    pub fn parse(description: &str) -> Option<Self> {
        if !Self::is_imagej_description(description) {
            return None;
        }

        let mut metadata = ImageJMetadata::default();
        for line in description.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            metadata.set(key, MetadataValue::parse(value));
        }
        Some(metadata)
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace a value, keeping the original key position.
    pub fn set(&mut self, key: &str, value: MetadataValue) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    /// Positive integer value of `key`, if present.
    pub fn get_count(&self, key: &str) -> Option<usize> {
        self.get(key)
            .and_then(MetadataValue::as_int)
            .and_then(|v| usize::try_from(v).ok())
    }

    pub fn images(&self) -> Option<usize> {
        self.get_count("images")
    }

    pub fn frames(&self) -> Option<usize> {
        self.get_count("frames")
    }

    pub fn slices(&self) -> Option<usize> {
        self.get_count("slices")
    }

    pub fn channels(&self) -> Option<usize> {
        self.get_count("channels")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the metadata back into an ImageDescription.
    ///
    /// The `ImageJ` version line always comes first and `images` second,
    /// the order ImageJ itself expects.
    pub fn to_description(&self) -> String {
        let version = self
            .get("ImageJ")
            .map(|v| v.to_string())
            .unwrap_or_default();

        let mut out = format!("{IMAGEJ_MARKER}{version}\n");
        if let Some(images) = self.get("images") {
            out.push_str(&format!("images={images}\n"));
        }
        for (key, value) in &self.entries {
            if key == "ImageJ" || key == "images" {
                continue;
            }
            out.push_str(&format!("{key}={value}\n"));
        }
        out
    }
}
