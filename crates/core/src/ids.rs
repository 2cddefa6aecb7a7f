/// Parent id stored for spans that have no parent, and the id an empty
/// OTLP span id normalizes to.
pub const ZERO_SPAN_ID: &str = "0000000000000000";

/// Lowercase-hex rendering of a 16-byte OTLP trace id. Empty input stays
/// empty so absent ids never masquerade as real ones.
pub fn format_trace_id(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    to_hex(bytes)
}

/// Lowercase-hex rendering of an 8-byte OTLP span id. Empty input maps to
/// the zero id, which is how root spans mark "no parent".
pub fn format_span_id(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return ZERO_SPAN_ID.to_string();
    }
    to_hex(bytes)
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_hex(s: &str) -> Vec<u8> {
        s.as_bytes()
            .chunks(2)
            .map(|pair| u8::from_str_radix(std::str::from_utf8(pair).unwrap(), 16).unwrap())
            .collect()
    }

    #[test]
    fn formats_lowercase_hex() {
        let trace = format_trace_id(&[
            0x4b, 0xf9, 0x2f, 0x35, 0x77, 0xb3, 0x4d, 0xa6, 0xa3, 0xce, 0x92, 0x9d, 0x0e, 0x0e,
            0x47, 0x36,
        ]);
        assert_eq!(trace, "4bf92f3577b34da6a3ce929d0e0e4736");

        let span = format_span_id(&[0x00, 0xf0, 0x67, 0xaa, 0x0b, 0xa9, 0x02, 0xb7]);
        assert_eq!(span, "00f067aa0ba902b7");
    }

    #[test]
    fn empty_span_id_is_zero_id() {
        assert_eq!(format_span_id(&[]), ZERO_SPAN_ID);
        assert_eq!(format_trace_id(&[]), "");
    }

    #[test]
    fn round_trips_through_hex_decode() {
        let original = vec![0x0a, 0x0b, 0x0c, 0x0d, 0x01, 0x02, 0x03, 0x04];
        let formatted = format_span_id(&original);
        assert_eq!(from_hex(&formatted), original);
    }
}
