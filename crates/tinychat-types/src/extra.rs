//! Codec for the structured `extra` payload.
//!
//! Drivers persist `extra` as JSON text; the session cache holds the decoded
//! `serde_json::Value`. Every JSON value survives an encode/decode round trip.

use serde_json::Value;

/// Serialize an `extra` value to the text form drivers store.
pub fn encode_extra(value: &Value) -> String {
    value.to_string()
}

/// Parse the stored text form back into a value.
pub fn decode_extra(raw: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip_representative_values() {
        let values = [
            Value::Null,
            json!(true),
            json!(-12),
            json!(1.5),
            json!(u64::MAX),
            json!("quoted \"text\" with \\ and unicode é"),
            json!([]),
            json!([1, "two", null, {"three": [3]}]),
            json!({}),
            json!({"theme": {"dark": true, "accent": "#fff"}, "pinned": [1, 2]}),
        ];
        for value in values {
            let decoded = decode_extra(&encode_extra(&value)).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn test_decode_rejects_malformed_text() {
        assert!(decode_extra("{not json").is_err());
        assert!(decode_extra("").is_err());
    }
}
