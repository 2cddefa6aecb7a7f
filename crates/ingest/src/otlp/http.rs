use std::io::Read;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use flate2::read::GzDecoder;
use futures::StreamExt;
use opentelemetry_proto::tonic::collector::trace::v1::{
    ExportTraceServiceRequest, ExportTraceServiceResponse,
};
use prost::Message;
use tracing::warn;

use crate::otlp::decode::decode_export;
use crate::sink::TraceSink;

const PROTOBUF_MIME: &str = "application/x-protobuf";

#[derive(Clone)]
struct ReceiverState {
    sink: Arc<dyn TraceSink>,
    max_body_bytes: usize,
}

/// OTLP/HTTP trace receiver mounted at `POST /v1/traces`.
pub fn router(sink: Arc<dyn TraceSink>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/v1/traces", any(export_traces))
        .with_state(ReceiverState {
            sink,
            max_body_bytes,
        })
}

async fn export_traces(State(state): State<ReceiverState>, req: Request) -> Response {
    let log = RequestLog {
        method: req.method().clone(),
        path: req.uri().path().to_string(),
        content_type: header_value(&req, header::CONTENT_TYPE),
        content_encoding: header_value(&req, header::CONTENT_ENCODING),
        start: Instant::now(),
    };

    if log.method != Method::POST {
        return log.fail_with_headers(
            StatusCode::METHOD_NOT_ALLOWED,
            "method not allowed",
            0,
            [(header::ALLOW, "POST")],
        );
    }
    if !log.content_type.starts_with(PROTOBUF_MIME) {
        return log.fail(StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported content type", 0);
    }

    let is_gzip = log.content_encoding.eq_ignore_ascii_case("gzip");
    let limit = state.max_body_bytes;

    // Read at most limit+1 bytes of (decoded) body; the extra byte is
    // what proves the cap was exceeded.
    let raw = match read_capped(req.into_body(), limit + 1).await {
        Ok(raw) => raw,
        Err(err) => {
            return log.fail(
                StatusCode::BAD_REQUEST,
                &format!("failed to read body: {err}"),
                0,
            );
        }
    };

    let body = if is_gzip {
        let mut decoded = Vec::new();
        let mut reader = GzDecoder::new(raw.as_slice()).take(limit as u64 + 1);
        if reader.read_to_end(&mut decoded).is_err() {
            return log.fail(StatusCode::BAD_REQUEST, "invalid gzip body", raw.len());
        }
        decoded
    } else {
        raw
    };

    if body.len() > limit {
        return log.fail(
            StatusCode::PAYLOAD_TOO_LARGE,
            "request body too large",
            body.len(),
        );
    }

    let export = match ExportTraceServiceRequest::decode(body.as_slice()) {
        Ok(decoded) => decode_export(&decoded),
        Err(err) => {
            return log.fail(
                StatusCode::BAD_REQUEST,
                &format!("invalid protobuf: {err}"),
                body.len(),
            );
        }
    };

    if let Err(err) = state.sink.consume(export).await {
        return log.fail(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("failed to consume trace: {err}"),
            body.len(),
        );
    }

    let payload = ExportTraceServiceResponse::default().encode_to_vec();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, PROTOBUF_MIME)],
        payload,
    )
        .into_response()
}

struct RequestLog {
    method: Method,
    path: String,
    content_type: String,
    content_encoding: String,
    start: Instant,
}

impl RequestLog {
    fn fail(&self, status: StatusCode, error: &str, body_bytes: usize) -> Response {
        self.emit(status, error, body_bytes);
        (status, error.to_string()).into_response()
    }

    fn fail_with_headers<const N: usize>(
        &self,
        status: StatusCode,
        error: &str,
        body_bytes: usize,
        headers: [(header::HeaderName, &'static str); N],
    ) -> Response {
        self.emit(status, error, body_bytes);
        (status, headers, error.to_string()).into_response()
    }

    fn emit(&self, status: StatusCode, error: &str, body_bytes: usize) {
        warn!(
            handler = "otlp",
            method = %self.method,
            path = %self.path,
            status = status.as_u16(),
            duration_ms = self.start.elapsed().as_millis() as u64,
            error,
            content_type = %self.content_type,
            content_encoding = %self.content_encoding,
            body_bytes,
            "request failed"
        );
    }
}

fn header_value(req: &Request, name: header::HeaderName) -> String {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn read_capped(body: Body, cap: usize) -> Result<Vec<u8>, axum::Error> {
    let mut stream = body.into_data_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        buf.extend_from_slice(&chunk);
        if buf.len() >= cap {
            break;
        }
    }
    Ok(buf)
}
