use serde_json::Value as JsonValue;

pub const TYPE_STRING: &str = "string";
pub const TYPE_INT: &str = "int";
pub const TYPE_DOUBLE: &str = "double";
pub const TYPE_BOOL: &str = "bool";
pub const TYPE_BYTES: &str = "bytes";
pub const TYPE_ARRAY: &str = "array";
pub const TYPE_KVLIST: &str = "kvlist";

/// Decoded OTLP attribute value. The two recursive cases keep their
/// structure in memory; storage flattens every value to a (type, text)
/// pair via [`AnyValue::encode`].
#[derive(Debug, Clone, PartialEq)]
pub enum AnyValue {
    Str(String),
    Int(i64),
    Double(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    Array(Vec<AnyValue>),
    KvList(Vec<(String, AnyValue)>),
    Empty,
}

impl AnyValue {
    /// Storage projection: a type tag plus a textual value. Composite
    /// values become JSON text so they decode losslessly.
    pub fn encode(&self) -> (&'static str, String) {
        match self {
            AnyValue::Str(s) => (TYPE_STRING, s.clone()),
            AnyValue::Int(i) => (TYPE_INT, i.to_string()),
            AnyValue::Double(d) => (TYPE_DOUBLE, format_double(*d)),
            AnyValue::Bool(b) => (TYPE_BOOL, b.to_string()),
            AnyValue::Bytes(b) => (TYPE_BYTES, bytes_to_hex(b)),
            AnyValue::Array(_) => (TYPE_ARRAY, self.to_json().to_string()),
            AnyValue::KvList(_) => (TYPE_KVLIST, self.to_json().to_string()),
            AnyValue::Empty => (TYPE_STRING, String::new()),
        }
    }

    /// JSON projection used inside arrays and kvlists. Bytes become hex
    /// so the output is always valid UTF-8.
    pub fn to_json(&self) -> JsonValue {
        match self {
            AnyValue::Str(s) => JsonValue::String(s.clone()),
            AnyValue::Int(i) => JsonValue::from(*i),
            AnyValue::Double(d) => {
                serde_json::Number::from_f64(*d).map_or(JsonValue::Null, JsonValue::Number)
            }
            AnyValue::Bool(b) => JsonValue::Bool(*b),
            AnyValue::Bytes(b) => JsonValue::String(bytes_to_hex(b)),
            AnyValue::Array(values) => {
                JsonValue::Array(values.iter().map(AnyValue::to_json).collect())
            }
            AnyValue::KvList(entries) => JsonValue::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            AnyValue::Empty => JsonValue::Null,
        }
    }

    /// Scalar rendering used for `service.name` resolution. Composite and
    /// absent values render empty.
    pub fn scalar_string(&self) -> String {
        match self {
            AnyValue::Str(s) => s.clone(),
            AnyValue::Int(i) => i.to_string(),
            AnyValue::Double(d) => format_double(*d),
            AnyValue::Bool(b) => b.to_string(),
            _ => String::new(),
        }
    }
}

/// Inverse of [`AnyValue::encode`] for the query path. Malformed stored
/// text falls back to the raw string rather than erroring.
pub fn decode_attribute(type_tag: &str, value: &str) -> JsonValue {
    match type_tag {
        TYPE_INT => value
            .parse::<i64>()
            .map_or_else(|_| JsonValue::String(value.to_string()), JsonValue::from),
        TYPE_DOUBLE => value
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map_or_else(|| JsonValue::String(value.to_string()), JsonValue::Number),
        TYPE_BOOL => value
            .parse::<bool>()
            .map_or_else(|_| JsonValue::String(value.to_string()), JsonValue::Bool),
        TYPE_ARRAY => match serde_json::from_str::<JsonValue>(value) {
            Ok(decoded @ JsonValue::Array(_)) => decoded,
            _ => JsonValue::Array(vec![JsonValue::String(value.to_string())]),
        },
        TYPE_KVLIST => match serde_json::from_str::<JsonValue>(value) {
            Ok(decoded @ JsonValue::Object(_)) => decoded,
            _ => serde_json::json!({ "value": value }),
        },
        _ => JsonValue::String(value.to_string()),
    }
}

fn format_double(d: f64) -> String {
    d.to_string()
}

fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_scalars() {
        assert_eq!(
            AnyValue::Str("GET".into()).encode(),
            ("string", "GET".to_string())
        );
        assert_eq!(AnyValue::Int(42).encode(), ("int", "42".to_string()));
        assert_eq!(AnyValue::Bool(true).encode(), ("bool", "true".to_string()));
        assert_eq!(
            AnyValue::Bytes(vec![0xde, 0xad]).encode(),
            ("bytes", "dead".to_string())
        );
        assert_eq!(AnyValue::Empty.encode(), ("string", String::new()));
    }

    #[test]
    fn encodes_array_as_json_with_hex_bytes() {
        let value = AnyValue::Array(vec![
            AnyValue::Int(1),
            AnyValue::Str("two".into()),
            AnyValue::Bytes(vec![0x03]),
        ]);
        let (tag, text) = value.encode();
        assert_eq!(tag, "array");
        assert_eq!(text, r#"[1,"two","03"]"#);
    }

    #[test]
    fn encodes_kvlist_as_json_object() {
        let value = AnyValue::KvList(vec![
            ("count".to_string(), AnyValue::Int(3)),
            ("flag".to_string(), AnyValue::Bool(false)),
        ]);
        let (tag, text) = value.encode();
        assert_eq!(tag, "kvlist");
        let decoded: JsonValue = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded["count"], 3);
        assert_eq!(decoded["flag"], false);
    }

    #[test]
    fn round_trips_exact_scalars() {
        for value in [
            AnyValue::Str("hello".into()),
            AnyValue::Int(-7),
            AnyValue::Bool(true),
        ] {
            let (tag, text) = value.encode();
            assert_eq!(decode_attribute(tag, &text), value.to_json());
        }
    }

    #[test]
    fn round_trips_double_through_shortest_repr() {
        let (tag, text) = AnyValue::Double(3.25).encode();
        assert_eq!(decode_attribute(tag, &text), serde_json::json!(3.25));
    }

    #[test]
    fn round_trips_bytes_as_hex() {
        let (tag, text) = AnyValue::Bytes(vec![0x0a, 0xff]).encode();
        assert_eq!(decode_attribute(tag, &text), serde_json::json!("0aff"));
    }

    #[test]
    fn malformed_stored_text_falls_back_to_raw() {
        assert_eq!(decode_attribute("int", "not-a-number"), serde_json::json!("not-a-number"));
        assert_eq!(
            decode_attribute("array", "{broken"),
            serde_json::json!(["{broken"])
        );
        assert_eq!(
            decode_attribute("kvlist", "[broken"),
            serde_json::json!({ "value": "[broken" })
        );
    }

    #[test]
    fn int_and_string_stay_distinct() {
        assert_eq!(decode_attribute("int", "5"), serde_json::json!(5));
        assert_eq!(decode_attribute("string", "5"), serde_json::json!("5"));
    }

    #[test]
    fn scalar_string_for_service_lookup() {
        assert_eq!(AnyValue::Str("api".into()).scalar_string(), "api");
        assert_eq!(AnyValue::Int(5).scalar_string(), "5");
        assert_eq!(AnyValue::Array(vec![]).scalar_string(), "");
    }
}
