use crate::model::value::AnyValue;

/// One decoded OTLP export: the resource → scope → span forest of a
/// single `ExportTraceServiceRequest`, with ids already rendered as
/// lowercase hex.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExportRequest {
    pub resources: Vec<ResourceSpans>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceSpans {
    pub schema_url: String,
    pub attributes: Vec<Attribute>,
    pub scopes: Vec<ScopeSpans>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScopeSpans {
    pub name: String,
    pub version: String,
    pub schema_url: String,
    pub attributes: Vec<Attribute>,
    pub spans: Vec<SpanRecord>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpanRecord {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: String,
    pub name: String,
    pub kind: String,
    pub start_time_unix_nano: i64,
    pub end_time_unix_nano: i64,
    pub status_code: i32,
    pub status_message: String,
    pub flags: u32,
    pub attributes: Vec<Attribute>,
    pub events: Vec<EventRecord>,
    pub links: Vec<LinkRecord>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventRecord {
    pub name: String,
    pub time_unix_nano: i64,
    pub dropped_attributes_count: u32,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinkRecord {
    pub trace_id: String,
    pub span_id: String,
    pub trace_state: String,
    pub dropped_attributes_count: u32,
    pub flags: u32,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub key: String,
    pub value: AnyValue,
}

impl ResourceSpans {
    /// Owning service of every span under this resource: the first
    /// `service.name` attribute, rendered as a scalar, else `unknown`.
    pub fn service_name(&self) -> String {
        for attr in &self.attributes {
            if attr.key == "service.name" {
                return attr.value.scalar_string();
            }
        }
        "unknown".to_string()
    }

    pub fn span_count(&self) -> usize {
        self.scopes.iter().map(|scope| scope.spans.len()).sum()
    }
}
