use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::any_value::Value as ProtoValue;
use opentelemetry_proto::tonic::common::v1::{AnyValue as ProtoAnyValue, KeyValue};
use opentelemetry_proto::tonic::trace::v1::span::{Event as ProtoEvent, Link as ProtoLink, SpanKind};
use opentelemetry_proto::tonic::trace::v1::{
    ResourceSpans as ProtoResourceSpans, ScopeSpans as ProtoScopeSpans, Span as ProtoSpan,
};
use tracevault_core::ids::{format_span_id, format_trace_id};
use tracevault_core::model::{
    AnyValue, Attribute, EventRecord, ExportRequest, LinkRecord, ResourceSpans, ScopeSpans,
    SpanRecord,
};

/// Maps one wire-level export into the canonical trace model: ids become
/// lowercase hex, attribute values become [`AnyValue`]s, and the
/// resource → scope → span nesting is preserved.
pub fn decode_export(req: &ExportTraceServiceRequest) -> ExportRequest {
    ExportRequest {
        resources: req.resource_spans.iter().map(decode_resource_spans).collect(),
    }
}

fn decode_resource_spans(rs: &ProtoResourceSpans) -> ResourceSpans {
    ResourceSpans {
        schema_url: rs.schema_url.clone(),
        attributes: rs
            .resource
            .as_ref()
            .map(|r| decode_attributes(&r.attributes))
            .unwrap_or_default(),
        scopes: rs.scope_spans.iter().map(decode_scope_spans).collect(),
    }
}

fn decode_scope_spans(ss: &ProtoScopeSpans) -> ScopeSpans {
    let (name, version, attributes) = match &ss.scope {
        Some(scope) => (
            scope.name.clone(),
            scope.version.clone(),
            decode_attributes(&scope.attributes),
        ),
        None => (String::new(), String::new(), Vec::new()),
    };

    ScopeSpans {
        name,
        version,
        schema_url: ss.schema_url.clone(),
        attributes,
        spans: ss.spans.iter().map(decode_span).collect(),
    }
}

fn decode_span(span: &ProtoSpan) -> SpanRecord {
    let (status_code, status_message) = span
        .status
        .as_ref()
        .map(|s| (s.code, s.message.clone()))
        .unwrap_or((0, String::new()));

    SpanRecord {
        trace_id: format_trace_id(&span.trace_id),
        span_id: format_span_id(&span.span_id),
        parent_span_id: format_span_id(&span.parent_span_id),
        name: span.name.clone(),
        kind: span_kind_label(span.kind),
        start_time_unix_nano: span.start_time_unix_nano as i64,
        end_time_unix_nano: span.end_time_unix_nano as i64,
        status_code,
        status_message,
        flags: span.flags,
        attributes: decode_attributes(&span.attributes),
        events: span.events.iter().map(decode_event).collect(),
        links: span.links.iter().map(decode_link).collect(),
    }
}

fn decode_event(event: &ProtoEvent) -> EventRecord {
    EventRecord {
        name: event.name.clone(),
        time_unix_nano: event.time_unix_nano as i64,
        dropped_attributes_count: event.dropped_attributes_count,
        attributes: decode_attributes(&event.attributes),
    }
}

fn decode_link(link: &ProtoLink) -> LinkRecord {
    LinkRecord {
        trace_id: format_trace_id(&link.trace_id),
        span_id: format_span_id(&link.span_id),
        trace_state: link.trace_state.clone(),
        dropped_attributes_count: link.dropped_attributes_count,
        flags: link.flags,
        attributes: decode_attributes(&link.attributes),
    }
}

fn decode_attributes(attrs: &[KeyValue]) -> Vec<Attribute> {
    attrs
        .iter()
        .map(|kv| Attribute {
            key: kv.key.clone(),
            value: decode_any_value(kv.value.as_ref()),
        })
        .collect()
}

fn decode_any_value(value: Option<&ProtoAnyValue>) -> AnyValue {
    match value.and_then(|v| v.value.as_ref()) {
        None => AnyValue::Empty,
        Some(ProtoValue::StringValue(s)) => AnyValue::Str(s.clone()),
        Some(ProtoValue::IntValue(i)) => AnyValue::Int(*i),
        Some(ProtoValue::DoubleValue(d)) => AnyValue::Double(*d),
        Some(ProtoValue::BoolValue(b)) => AnyValue::Bool(*b),
        Some(ProtoValue::BytesValue(b)) => AnyValue::Bytes(b.clone()),
        Some(ProtoValue::ArrayValue(arr)) => AnyValue::Array(
            arr.values
                .iter()
                .map(|v| decode_any_value(Some(v)))
                .collect(),
        ),
        Some(ProtoValue::KvlistValue(list)) => AnyValue::KvList(
            list.values
                .iter()
                .map(|kv| (kv.key.clone(), decode_any_value(kv.value.as_ref())))
                .collect(),
        ),
    }
}

fn span_kind_label(kind: i32) -> String {
    match SpanKind::try_from(kind) {
        Ok(SpanKind::Unspecified) | Err(_) => "UNSPECIFIED".to_string(),
        Ok(kind) => kind.as_str_name().to_string(),
    }
}
