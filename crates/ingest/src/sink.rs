use async_trait::async_trait;
use tracevault_core::Result;
use tracevault_core::model::ExportRequest;
use tracevault_store::Store;

/// Narrow capability the receiver depends on: accept one decoded export
/// request or fail. Concrete sinks compose by wrapping (the queue sink
/// wraps any other sink).
#[async_trait]
pub trait TraceSink: Send + Sync {
    async fn consume(&self, req: ExportRequest) -> Result<()>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl TraceSink for Store {
    async fn consume(&self, req: ExportRequest) -> Result<()> {
        self.insert_export(&req).await
    }
}
