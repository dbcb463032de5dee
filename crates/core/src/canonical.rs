//! Canonical JSON encoding.
//!
//! The audit service hashes what it receives, so the text we hand it must be
//! a pure function of the logical value:
//! - object keys sorted by code point at every depth
//! - compact separators, no whitespace
//! - non-ASCII text emitted as UTF-8 rather than `\u` escapes
//!
//! Key order does not depend on the `serde_json::Map` backing type, so the
//! output is stable even if another crate turns on `preserve_order`.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Serialize `value` to its canonical JSON text.
pub fn canonicalize_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    serde_json::to_string(&Canonical(&value))
}

struct Canonical<'a>(&'a Value);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&Canonical(item))?;
                }
                seq.end()
            }
            Value::Object(fields) => {
                let mut entries: Vec<(&String, &Value)> = fields.iter().collect();
                entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, &Canonical(value))?;
                }
                map.end()
            }
            scalar => scalar.serialize(serializer),
        }
    }
}
