use std::str::FromStr;
use std::time::Instant;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::any;
use serde::Serialize;
use tracevault_core::error::{Result, TraceVaultError};
use tracevault_core::query::{
    AttrFilter, DEFAULT_LIMIT, SpanQuery, SpanView, StatusCode as SpanStatus, TraceOrder,
    TraceQuery, TraceSummary,
};
use tracevault_store::Store;
use tracing::warn;

#[derive(Clone)]
struct ApiState {
    store: Store,
}

#[derive(Serialize)]
struct SpansResponse {
    spans: Vec<SpanView>,
}

#[derive(Serialize)]
struct TracesResponse {
    traces: Vec<TraceSummary>,
}

#[derive(Serialize)]
struct TraceDetailResponse {
    trace_id: String,
    spans: Vec<SpanView>,
}

/// Read API over the span store: span search, trace summaries, and the
/// single-trace waterfall.
pub fn router(store: Store) -> Router {
    Router::new()
        .route("/api/spans", any(query_spans))
        .route("/api/traces", any(query_traces))
        .route("/api/traces/{trace_id}", any(trace_detail))
        .with_state(ApiState { store })
}

async fn query_spans(
    State(state): State<ApiState>,
    method: Method,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let log = HandlerLog::new("query_spans", &method, &uri, &pairs);
    if method != Method::GET {
        return log.method_not_allowed();
    }

    let params = match parse_span_query(&pairs) {
        Ok(params) => params,
        Err(err) => return log.client_error(&err),
    };

    match state.store.query_spans(&params).await {
        Ok(spans) => Json(SpansResponse { spans }).into_response(),
        Err(err) => log.server_error(&err, "failed to query spans"),
    }
}

async fn query_traces(
    State(state): State<ApiState>,
    method: Method,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let log = HandlerLog::new("query_traces", &method, &uri, &pairs);
    if method != Method::GET {
        return log.method_not_allowed();
    }

    let params = match parse_trace_query(&pairs) {
        Ok(params) => params,
        Err(err) => return log.client_error(&err),
    };

    match state.store.query_traces(&params).await {
        Ok(traces) => Json(TracesResponse { traces }).into_response(),
        Err(err) => log.server_error(&err, "failed to query traces"),
    }
}

async fn trace_detail(
    State(state): State<ApiState>,
    method: Method,
    uri: Uri,
    Path(trace_id): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let log = HandlerLog::new("trace_detail", &method, &uri, &pairs);
    if method != Method::GET {
        return log.method_not_allowed();
    }

    let trace_id = trace_id.trim().to_string();
    if trace_id.is_empty() {
        return log.client_error(&TraceVaultError::InvalidArgument(
            "trace_id is required".to_string(),
        ));
    }

    let service = first_param(&pairs, "service").filter(|s| !s.is_empty());
    let status = match parse_status(&pairs) {
        Ok(status) => status,
        Err(err) => return log.client_error(&err),
    };

    match state
        .store
        .query_trace_spans(&trace_id, service, status)
        .await
    {
        Ok(spans) => Json(TraceDetailResponse { trace_id, spans }).into_response(),
        Err(err @ TraceVaultError::InvalidArgument(_)) => log.client_error(&err),
        Err(err) => log.server_error(&err, "failed to query trace"),
    }
}

struct HandlerLog {
    handler: &'static str,
    method: Method,
    path: String,
    service: String,
    start: Instant,
}

impl HandlerLog {
    fn new(handler: &'static str, method: &Method, uri: &Uri, pairs: &[(String, String)]) -> Self {
        Self {
            handler,
            method: method.clone(),
            path: uri.path().to_string(),
            service: first_param(pairs, "service").unwrap_or_default().to_string(),
            start: Instant::now(),
        }
    }

    fn method_not_allowed(&self) -> Response {
        self.emit(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
        (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET")],
            "method not allowed".to_string(),
        )
            .into_response()
    }

    fn client_error(&self, err: &TraceVaultError) -> Response {
        self.emit(StatusCode::BAD_REQUEST, &err.to_string());
        (StatusCode::BAD_REQUEST, reason(err)).into_response()
    }

    fn server_error(&self, err: &TraceVaultError, message: &'static str) -> Response {
        self.emit(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
        (StatusCode::INTERNAL_SERVER_ERROR, message.to_string()).into_response()
    }

    fn emit(&self, status: StatusCode, error: &str) {
        warn!(
            handler = self.handler,
            method = %self.method,
            path = %self.path,
            status = status.as_u16(),
            duration_ms = self.start.elapsed().as_millis() as u64,
            error,
            service = %self.service,
            "request failed"
        );
    }
}

// Parameter errors carry their own human-readable reason; strip the
// error-kind prefix for the response body.
fn reason(err: &TraceVaultError) -> String {
    match err {
        TraceVaultError::InvalidArgument(msg) | TraceVaultError::Parse(msg) => msg.clone(),
        other => other.to_string(),
    }
}

fn first_param<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(key, _)| key.as_str() == name)
        .map(|(_, value)| value.trim())
}

fn parse_span_query(pairs: &[(String, String)]) -> Result<SpanQuery> {
    let (service, start, end, limit) = parse_shared(pairs)?;
    Ok(SpanQuery {
        service,
        start,
        end,
        limit,
        attr_filters: parse_attr_filters(pairs)?,
        status: parse_status(pairs)?,
    })
}

fn parse_trace_query(pairs: &[(String, String)]) -> Result<TraceQuery> {
    let (service, start, end, limit) = parse_shared(pairs)?;

    let order = match first_param(pairs, "order") {
        Some(raw) if !raw.is_empty() => TraceOrder::from_str(raw)?,
        _ => TraceOrder::default(),
    };

    let has_error = match first_param(pairs, "has_error") {
        Some(raw) if !raw.is_empty() => raw.parse::<bool>().map_err(|_| {
            TraceVaultError::InvalidArgument("has_error must be true or false".to_string())
        })?,
        _ => false,
    };

    Ok(TraceQuery {
        service,
        start,
        end,
        limit,
        attr_filters: parse_attr_filters(pairs)?,
        status: parse_status(pairs)?,
        order,
        has_error,
    })
}

fn parse_shared(pairs: &[(String, String)]) -> Result<(String, i64, i64, usize)> {
    let service = first_param(pairs, "service")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TraceVaultError::InvalidArgument("service is required".to_string()))?
        .to_string();

    let start = parse_i64(pairs, "start")?;
    let end = parse_i64(pairs, "end")?;

    let limit = match first_param(pairs, "limit") {
        Some(raw) if !raw.is_empty() => {
            let parsed = raw.parse::<i64>().map_err(|_| {
                TraceVaultError::InvalidArgument("limit must be an int".to_string())
            })?;
            if parsed <= 0 {
                return Err(TraceVaultError::InvalidArgument(
                    "limit must be > 0".to_string(),
                ));
            }
            parsed as usize
        }
        _ => DEFAULT_LIMIT,
    };

    Ok((service, start, end, limit))
}

fn parse_i64(pairs: &[(String, String)], field: &str) -> Result<i64> {
    let raw = first_param(pairs, field)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TraceVaultError::InvalidArgument(format!("{field} is required")))?;
    raw.parse::<i64>()
        .map_err(|_| TraceVaultError::InvalidArgument(format!("{field} must be an int64")))
}

fn parse_attr_filters(pairs: &[(String, String)]) -> Result<Vec<AttrFilter>> {
    let mut filters = Vec::new();
    for (_, raw) in pairs.iter().filter(|(key, _)| key.as_str() == "attr") {
        let Some((attr_key, attr_value)) = raw.split_once('=') else {
            return Err(TraceVaultError::InvalidArgument(
                "attr must be key=value".to_string(),
            ));
        };
        let attr_key = attr_key.trim();
        let attr_value = attr_value.trim();
        if attr_key.is_empty() || attr_value.is_empty() {
            return Err(TraceVaultError::InvalidArgument(
                "attr must be key=value".to_string(),
            ));
        }
        filters.push(AttrFilter {
            key: attr_key.to_string(),
            value: attr_value.to_string(),
        });
    }
    Ok(filters)
}

fn parse_status(pairs: &[(String, String)]) -> Result<Option<SpanStatus>> {
    match first_param(pairs, "status") {
        Some(raw) if !raw.is_empty() => Ok(Some(SpanStatus::from_str(raw)?)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(entries: &[(&str, &str)]) -> Vec<(String, String)> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_full_span_query() {
        let params = parse_span_query(&pairs(&[
            ("service", " api "),
            ("start", "100"),
            ("end", "200"),
            ("limit", "5"),
            ("attr", "http.method=GET"),
            ("attr", "http.route=/v1/orders"),
            ("status", "error"),
        ]))
        .unwrap();

        assert_eq!(params.service, "api");
        assert_eq!(params.start, 100);
        assert_eq!(params.end, 200);
        assert_eq!(params.limit, 5);
        assert_eq!(params.attr_filters.len(), 2);
        assert_eq!(params.attr_filters[0].key, "http.method");
        assert_eq!(params.attr_filters[0].value, "GET");
        assert_eq!(params.status, Some(SpanStatus::Error));
    }

    #[test]
    fn requires_service_start_end() {
        assert!(parse_span_query(&pairs(&[("start", "1"), ("end", "2")])).is_err());
        assert!(parse_span_query(&pairs(&[("service", "  "), ("start", "1"), ("end", "2")])).is_err());
        assert!(parse_span_query(&pairs(&[("service", "api"), ("end", "2")])).is_err());
        assert!(
            parse_span_query(&pairs(&[("service", "api"), ("start", "x"), ("end", "2")])).is_err()
        );
    }

    #[test]
    fn limit_defaults_and_validates() {
        let params =
            parse_span_query(&pairs(&[("service", "api"), ("start", "1"), ("end", "2")])).unwrap();
        assert_eq!(params.limit, DEFAULT_LIMIT);

        for bad in ["0", "-3", "ten"] {
            assert!(
                parse_span_query(&pairs(&[
                    ("service", "api"),
                    ("start", "1"),
                    ("end", "2"),
                    ("limit", bad),
                ]))
                .is_err()
            );
        }
    }

    #[test]
    fn attr_splits_on_first_equals() {
        let params = parse_span_query(&pairs(&[
            ("service", "api"),
            ("start", "1"),
            ("end", "2"),
            ("attr", "query=a=b"),
        ]))
        .unwrap();
        assert_eq!(params.attr_filters[0].key, "query");
        assert_eq!(params.attr_filters[0].value, "a=b");

        for bad in ["no-equals", "=value", "key="] {
            assert!(
                parse_span_query(&pairs(&[
                    ("service", "api"),
                    ("start", "1"),
                    ("end", "2"),
                    ("attr", bad),
                ]))
                .is_err()
            );
        }
    }

    #[test]
    fn rejects_unknown_status_and_order() {
        assert!(
            parse_span_query(&pairs(&[
                ("service", "api"),
                ("start", "1"),
                ("end", "2"),
                ("status", "warn"),
            ]))
            .is_err()
        );
        assert!(
            parse_trace_query(&pairs(&[
                ("service", "api"),
                ("start", "1"),
                ("end", "2"),
                ("order", "fastest"),
            ]))
            .is_err()
        );
    }

    #[test]
    fn trace_query_defaults() {
        let params =
            parse_trace_query(&pairs(&[("service", "api"), ("start", "1"), ("end", "2")])).unwrap();
        assert_eq!(params.order, TraceOrder::StartDesc);
        assert!(!params.has_error);
    }

    #[test]
    fn trace_query_parses_order_and_has_error() {
        let params = parse_trace_query(&pairs(&[
            ("service", "api"),
            ("start", "1"),
            ("end", "2"),
            ("order", "duration_desc"),
            ("has_error", "true"),
        ]))
        .unwrap();
        assert_eq!(params.order, TraceOrder::DurationDesc);
        assert!(params.has_error);

        assert!(
            parse_trace_query(&pairs(&[
                ("service", "api"),
                ("start", "1"),
                ("end", "2"),
                ("has_error", "yes"),
            ]))
            .is_err()
        );
    }
}

#[cfg(test)]
mod handler_tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;

    async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn empty_store_returns_empty_lists() {
        let app = router(Store::open_in_memory().unwrap());
        let (status, body) = get(app.clone(), "/api/spans?service=api&start=0&end=10").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["spans"], serde_json::json!([]));

        let (status, body) = get(app, "/api/traces?service=api&start=0&end=10").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["traces"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn missing_service_is_a_client_error() {
        let app = router(Store::open_in_memory().unwrap());
        let (status, _) = get(app, "/api/spans?start=0&end=10").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bad_order_is_a_client_error() {
        let app = router(Store::open_in_memory().unwrap());
        let (status, _) =
            get(app, "/api/traces?service=api&start=0&end=10&order=fastest").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn wrong_method_advertises_get() {
        let app = router(Store::open_in_memory().unwrap());
        let resp = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/spans?service=api&start=0&end=10")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers()[header::ALLOW], "GET");
    }

    #[tokio::test]
    async fn trace_detail_requires_trace_id() {
        let app = router(Store::open_in_memory().unwrap());
        let (status, _) = get(app, "/api/traces/%20?service=api").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn trace_detail_returns_trace_shape() {
        let app = router(Store::open_in_memory().unwrap());
        let trace_id = "ab".repeat(16);
        let (status, body) = get(app, &format!("/api/traces/{trace_id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["trace_id"], serde_json::json!(trace_id));
        assert_eq!(body["spans"], serde_json::json!([]));
    }
}
