//! Item descriptors as returned by the collection endpoint.

use serde_json::{Map, Value};

/// One remote catalog entry.
///
/// The descriptor is kept as the raw JSON object the source returned; only
/// the few fields the downloader needs are interpreted, through accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDescriptor {
    fields: Map<String, Value>,
}

impl ItemDescriptor {
    /// Wraps a JSON object. Returns `None` for any other JSON value.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    /// Returns the raw field map.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Looks up a top-level field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// The item identifier, rendered as a string.
    ///
    /// Numeric identifiers are accepted as well; anything else yields an empty
    /// string.
    #[must_use]
    pub fn id(&self) -> String {
        match self.fields.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => String::new(),
        }
    }

    /// Non-empty `title`, if present.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        non_empty_str(self.fields.get("title"))
    }

    /// Non-empty `description`, if present.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        non_empty_str(self.fields.get("description"))
    }
}

/// A candidate binary resource for an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    /// Absolute URL of the asset.
    pub url: String,
    /// Declared width in pixels.
    pub width: Option<u64>,
    /// Declared height in pixels.
    pub height: Option<u64>,
    /// Size tier or map key the reference was found under.
    pub tier: Option<String>,
}

impl AssetReference {
    /// Reads an asset entry of the form `{"url": ..., "width": ..., "height": ...}`.
    ///
    /// Returns `None` when the value is not an object or has no non-empty URL.
    #[must_use]
    pub fn from_value(tier: &str, value: &Value) -> Option<Self> {
        let entry = value.as_object()?;
        let url = non_empty_str(entry.get("url"))?;
        Some(Self {
            url: url.to_string(),
            width: entry.get("width").and_then(Value::as_u64),
            height: entry.get("height").and_then(Value::as_u64),
            tier: Some(tier.to_string()),
        })
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}
