use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Result, TraceVaultError};

pub const DEFAULT_LIMIT: usize = 100;

/// Attribute equality filter: the span must carry an attribute row with
/// exactly this key and textual value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrFilter {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    Unset,
    Ok,
    Error,
}

impl StatusCode {
    pub fn code(self) -> i32 {
        match self {
            StatusCode::Unset => 0,
            StatusCode::Ok => 1,
            StatusCode::Error => 2,
        }
    }
}

impl FromStr for StatusCode {
    type Err = TraceVaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "unset" => Ok(Self::Unset),
            "ok" => Ok(Self::Ok),
            "error" => Ok(Self::Error),
            _ => Err(TraceVaultError::Parse(
                "status must be unset, ok, or error".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TraceOrder {
    #[default]
    StartDesc,
    StartAsc,
    DurationDesc,
    DurationAsc,
}

impl FromStr for TraceOrder {
    type Err = TraceVaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "start_desc" => Ok(Self::StartDesc),
            "start_asc" => Ok(Self::StartAsc),
            "duration_desc" => Ok(Self::DurationDesc),
            "duration_asc" => Ok(Self::DurationAsc),
            _ => Err(TraceVaultError::Parse(
                "order must be start_desc, start_asc, duration_desc, or duration_asc".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpanQuery {
    pub service: String,
    pub start: i64,
    pub end: i64,
    pub limit: usize,
    pub attr_filters: Vec<AttrFilter>,
    pub status: Option<StatusCode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceQuery {
    pub service: String,
    pub start: i64,
    pub end: i64,
    pub limit: usize,
    pub attr_filters: Vec<AttrFilter>,
    pub status: Option<StatusCode>,
    pub order: TraceOrder,
    pub has_error: bool,
}

pub type AttrMap = BTreeMap<String, JsonValue>;

/// Fully hydrated span as served by the query API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanView {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: String,
    pub name: String,
    pub kind: String,
    pub start_time_unix_nano: i64,
    pub end_time_unix_nano: i64,
    pub status_code: i32,
    pub status_message: String,
    pub service_name: String,
    pub flags: u32,
    pub resource: ResourceView,
    pub scope: ScopeView,
    pub attributes: AttrMap,
    pub events: Vec<EventView>,
    pub links: Vec<LinkView>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResourceView {
    pub schema_url: String,
    pub attributes: AttrMap,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScopeView {
    pub name: String,
    pub version: String,
    pub schema_url: String,
    pub attributes: AttrMap,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventView {
    pub name: String,
    pub time_unix_nano: i64,
    pub dropped_attributes_count: u32,
    pub attributes: AttrMap,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkView {
    pub trace_id: String,
    pub span_id: String,
    pub trace_state: String,
    pub dropped_attributes_count: u32,
    pub flags: u32,
    pub attributes: AttrMap,
}

/// Per-trace aggregate over all spans sharing a trace id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceSummary {
    pub trace_id: String,
    pub root_name: Option<String>,
    pub start_time_unix_nano: i64,
    pub end_time_unix_nano: i64,
    pub duration_unix_nano: i64,
    pub span_count: i64,
    pub error_count: i64,
    pub service_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_tokens() {
        assert_eq!(StatusCode::from_str("unset").unwrap(), StatusCode::Unset);
        assert_eq!(StatusCode::from_str("ok").unwrap(), StatusCode::Ok);
        assert_eq!(StatusCode::from_str("error").unwrap(), StatusCode::Error);
        assert!(StatusCode::from_str("ERROR").is_err());
        assert!(StatusCode::from_str("warn").is_err());
    }

    #[test]
    fn status_maps_to_wire_codes() {
        assert_eq!(StatusCode::Unset.code(), 0);
        assert_eq!(StatusCode::Ok.code(), 1);
        assert_eq!(StatusCode::Error.code(), 2);
    }

    #[test]
    fn parses_order_tokens() {
        assert_eq!(
            TraceOrder::from_str("start_desc").unwrap(),
            TraceOrder::StartDesc
        );
        assert_eq!(
            TraceOrder::from_str("duration_asc").unwrap(),
            TraceOrder::DurationAsc
        );
        assert!(TraceOrder::from_str("fastest").is_err());
    }

    #[test]
    fn default_order_is_start_desc() {
        assert_eq!(TraceOrder::default(), TraceOrder::StartDesc);
    }
}
