//! Catalog record types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::color::HexColor;

/// A catalog entry subject to enrichment
///
/// `attributes` holds the record's remaining catalog fields (title, item URL, ...).
/// The pipeline never reads or writes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub calculated_colors: Option<Vec<HexColor>>,
    #[serde(default)]
    pub attributes: Map<String, JsonValue>,
}

impl Record {
    /// Creates a record with an image URL and no attributes
    pub fn new(id: impl Into<String>, image_url: Option<String>) -> Self {
        Self {
            id: id.into(),
            image_url,
            calculated_colors: None,
            attributes: Map::new(),
        }
    }

    /// Adds an opaque catalog attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Targeted field update applied to a single record
///
/// `calculated_colors` replaces any previous palette in full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordUpdate {
    pub calculated_colors: Vec<HexColor>,
}
