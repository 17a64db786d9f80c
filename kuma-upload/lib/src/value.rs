//! Conversion from plain JSON to Firestore's typed value representation.
//!
//! The REST API does not accept bare JSON: every value is wrapped in an
//! object naming its type (`stringValue`, `integerValue`, `mapValue`, ...).
//! Integers are sent as decimal strings because they are 64-bit on the wire.

use serde_json::{Map, Number, Value, json};

/// Encodes one JSON value as a Firestore `Value`.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => encode_number(n),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Encodes every entry of a JSON object, keeping the keys.
pub fn encode_fields(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect()
}

/// Builds a full document body (`{"fields": {...}}`) from a JSON object.
pub fn encode_document(map: &Map<String, Value>) -> Value {
    json!({ "fields": encode_fields(map) })
}

fn encode_number(n: &Number) -> Value {
    if let Some(i) = n.as_i64() {
        return json!({ "integerValue": i.to_string() });
    }
    // u64 above i64::MAX and all floats
    json!({ "doubleValue": n.as_f64().unwrap_or(f64::NAN) })
}
