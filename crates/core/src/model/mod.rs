pub mod trace;
pub mod value;

pub use trace::{
    Attribute, EventRecord, ExportRequest, LinkRecord, ResourceSpans, ScopeSpans, SpanRecord,
};
pub use value::AnyValue;
