//! Builders for wire-level OTLP trace exports, shared by unit and e2e
//! tests.

use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::any_value::Value;
use opentelemetry_proto::tonic::common::v1::{AnyValue, InstrumentationScope, KeyValue};
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1::span::{Event, Link};
use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Span};
use prost::Message;

pub fn str_value(s: &str) -> AnyValue {
    AnyValue {
        value: Some(Value::StringValue(s.to_string())),
    }
}

pub fn key_value(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(str_value(value)),
    }
}

pub fn span_proto(trace_id: &[u8], span_id: &[u8], name: &str, start: u64, end: u64) -> Span {
    Span {
        trace_id: trace_id.to_vec(),
        span_id: span_id.to_vec(),
        name: name.to_string(),
        start_time_unix_nano: start,
        end_time_unix_nano: end,
        ..Span::default()
    }
}

/// One resource (carrying `service.name`) with one scope holding the
/// given spans.
pub fn export_request(service: &str, spans: Vec<Span>) -> ExportTraceServiceRequest {
    ExportTraceServiceRequest {
        resource_spans: vec![ResourceSpans {
            resource: Some(Resource {
                attributes: vec![key_value("service.name", service)],
                ..Resource::default()
            }),
            scope_spans: vec![ScopeSpans {
                scope: Some(InstrumentationScope {
                    name: "testlib".to_string(),
                    version: "0.1".to_string(),
                    ..InstrumentationScope::default()
                }),
                spans,
                schema_url: String::new(),
            }],
            schema_url: String::new(),
        }],
    }
}

pub const SAMPLE_START_NANOS: u64 = 1_700_000_000_000_000_000;

/// A fully populated single-span export: `http.method=GET`, one event
/// with an attribute, and one link to another trace.
pub fn sample_export_request(
    service: &str,
    trace_byte: u8,
    span_byte: u8,
) -> ExportTraceServiceRequest {
    let mut span = span_proto(
        &[trace_byte; 16],
        &[span_byte; 8],
        "GET /v1/orders",
        SAMPLE_START_NANOS,
        SAMPLE_START_NANOS + 10_000_000,
    );
    span.attributes = vec![key_value("http.method", "GET")];
    span.events = vec![Event {
        time_unix_nano: SAMPLE_START_NANOS + 1_000_000,
        name: "cache.miss".to_string(),
        attributes: vec![key_value("cache.key", "orders:42")],
        dropped_attributes_count: 0,
    }];
    span.links = vec![Link {
        trace_id: vec![0xfe; 16],
        span_id: vec![0xfd; 8],
        ..Link::default()
    }];
    export_request(service, vec![span])
}

pub fn encode_request(req: &ExportTraceServiceRequest) -> Vec<u8> {
    req.encode_to_vec()
}
