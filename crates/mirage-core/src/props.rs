//! Property-bag codec.
//!
//! Every entity carries an open-ended key/value attribute set serialized into
//! a single text column. Extension attributes that are not promoted to
//! first-class columns live here, so adding one never requires a schema
//! change. The encoding is a flat JSON object with string values.

use std::collections::BTreeMap;

use thiserror::Error;

/// Open-ended extension attributes attached to an entity.
pub type PropertyBag = BTreeMap<String, String>;

/// The property-bag blob could not be decoded.
#[derive(Debug, Error)]
#[error("malformed property bag: {0}")]
pub struct DecodeError(pub String);

/// Encode a property bag into its text blob.
pub fn encode(bag: &PropertyBag) -> String {
    let map: serde_json::Map<String, serde_json::Value> = bag
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();
    serde_json::Value::Object(map).to_string()
}

/// Decode a text blob back into a property bag.
///
/// An empty blob decodes to the empty bag: an entity that never stored
/// extension attributes has nothing to decode, which is not corruption.
pub fn decode(blob: &str) -> Result<PropertyBag, DecodeError> {
    if blob.trim().is_empty() {
        return Ok(PropertyBag::new());
    }
    serde_json::from_str(blob).map_err(|e| DecodeError(e.to_string()))
}
