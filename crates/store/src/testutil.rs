use tracevault_core::ids::ZERO_SPAN_ID;
use tracevault_core::model::{
    AnyValue, Attribute, EventRecord, ExportRequest, LinkRecord, ResourceSpans, ScopeSpans,
    SpanRecord,
};

pub(crate) const BASE_NANOS: i64 = 1_700_000_000_000_000_000;

pub(crate) fn attr(key: &str, value: AnyValue) -> Attribute {
    Attribute {
        key: key.to_string(),
        value,
    }
}

pub(crate) fn span_record(
    trace_id: &str,
    span_id: &str,
    parent_span_id: &str,
    name: &str,
    start: i64,
    end: i64,
    status_code: i32,
) -> SpanRecord {
    SpanRecord {
        trace_id: trace_id.to_string(),
        span_id: span_id.to_string(),
        parent_span_id: parent_span_id.to_string(),
        name: name.to_string(),
        kind: "SPAN_KIND_INTERNAL".to_string(),
        start_time_unix_nano: start,
        end_time_unix_nano: end,
        status_code,
        status_message: String::new(),
        flags: 0,
        attributes: Vec::new(),
        events: Vec::new(),
        links: Vec::new(),
    }
}

pub(crate) fn export_of(service: &str, spans: Vec<SpanRecord>) -> ExportRequest {
    ExportRequest {
        resources: vec![ResourceSpans {
            schema_url: String::new(),
            attributes: vec![attr("service.name", AnyValue::Str(service.to_string()))],
            scopes: vec![ScopeSpans {
                name: "testlib".to_string(),
                version: "0.1".to_string(),
                schema_url: String::new(),
                attributes: Vec::new(),
                spans,
            }],
        }],
    }
}

/// One complete span under `service`: an `http.method=GET` attribute, one
/// event carrying an attribute, and one link to a sibling trace.
pub(crate) fn sample_export(service: &str, trace_byte: u8, span_byte: u8) -> ExportRequest {
    let trace_id = format!("{trace_byte:02x}").repeat(16);
    let span_id = format!("{span_byte:02x}").repeat(8);

    let mut span = span_record(
        &trace_id,
        &span_id,
        ZERO_SPAN_ID,
        "GET /v1/orders",
        BASE_NANOS,
        BASE_NANOS + 10_000_000,
        0,
    );
    span.attributes = vec![attr("http.method", AnyValue::Str("GET".into()))];
    span.events = vec![EventRecord {
        name: "cache.miss".to_string(),
        time_unix_nano: BASE_NANOS + 1_000_000,
        dropped_attributes_count: 0,
        attributes: vec![attr("cache.key", AnyValue::Str("orders:42".into()))],
    }];
    span.links = vec![LinkRecord {
        trace_id: "fe".repeat(16),
        span_id: "fd".repeat(8),
        trace_state: String::new(),
        dropped_attributes_count: 0,
        flags: 0,
        attributes: Vec::new(),
    }];

    export_of(service, vec![span])
}
