use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracevault_core::error::{Result, TraceVaultError};
use tracevault_core::model::{ExportRequest, SpanRecord};

use crate::sink::TraceSink;

/// Diagnostic sink: renders one line per span to a byte sink instead of
/// persisting anything. Useful for smoke-testing an exporter against the
/// receiver without a database.
pub struct StdoutSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl StdoutSink {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }
}

#[async_trait]
impl TraceSink for StdoutSink {
    async fn consume(&self, req: ExportRequest) -> Result<()> {
        let mut out = self.out.lock().expect("stdout sink mutex poisoned");
        for resource in &req.resources {
            let service = resource.service_name();
            for scope in &resource.scopes {
                for span in &scope.spans {
                    writeln!(
                        out,
                        "span service={service} trace_id={} span_id={} parent_id={} name={} kind={} duration={} attrs={}",
                        span.trace_id,
                        span.span_id,
                        span.parent_span_id,
                        span.name,
                        span.kind,
                        span_duration(span),
                        span.attributes.len(),
                    )
                    .map_err(|e| TraceVaultError::Io(format!("write span line failed: {e}")))?;
                }
            }
        }
        Ok(())
    }
}

fn span_duration(span: &SpanRecord) -> String {
    if span.end_time_unix_nano <= span.start_time_unix_nano {
        return "0s".to_string();
    }
    let nanos = (span.end_time_unix_nano - span.start_time_unix_nano) as u64;
    format!("{:?}", Duration::from_nanos(nanos))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::otlp::decode::decode_export;
    use tracevault_testkit::sample_export_request;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn writes_one_line_per_span() {
        let buf = SharedBuf::default();
        let sink = StdoutSink::new(Box::new(buf.clone()));
        let export = decode_export(&sample_export_request("api", 0x01, 0x02));

        sink.consume(export).await.unwrap();

        let written = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(written.lines().count(), 1);
        assert!(written.contains("service=api"));
        assert!(written.contains(&format!("trace_id={}", "01".repeat(16))));
        assert!(written.contains("attrs=1"));
    }

    #[test]
    fn duration_clamps_inverted_ranges() {
        let mut span = SpanRecord::default();
        span.start_time_unix_nano = 10;
        span.end_time_unix_nano = 5;
        assert_eq!(span_duration(&span), "0s");
    }
}
