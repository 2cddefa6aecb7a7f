use duckdb::{Transaction, params};
use tracevault_core::error::{Result, TraceVaultError};
use tracevault_core::ids::ZERO_SPAN_ID;
use tracevault_core::model::{Attribute, EventRecord, LinkRecord, ResourceSpans, ScopeSpans, SpanRecord};
use uuid::Uuid;

use crate::Store;

impl Store {
    /// Persists one export request atomically. Every resource and scope
    /// gets fresh rows; spans dedup on `(trace_id, span_id)` inside the
    /// transaction, so a replayed span (and its children) is skipped
    /// without error.
    pub async fn insert_export(&self, req: &tracevault_core::model::ExportRequest) -> Result<()> {
        let mut conn = self.acquire().await?;
        let tx = conn
            .transaction()
            .map_err(|e| TraceVaultError::Store(format!("begin transaction failed: {e}")))?;

        for resource in &req.resources {
            let service = resource.service_name();
            let resource_id = insert_resource(&tx, resource)?;
            for scope in &resource.scopes {
                let scope_id = insert_scope(&tx, scope)?;
                for span in &scope.spans {
                    insert_span(&tx, span, &service, &resource_id, &scope_id)?;
                }
            }
        }

        tx.commit()
            .map_err(|e| TraceVaultError::Store(format!("commit transaction failed: {e}")))
    }
}

fn insert_resource(tx: &Transaction, resource: &ResourceSpans) -> Result<String> {
    let resource_id = new_row_id();
    tx.execute(
        "INSERT INTO resources (id, schema_url) VALUES (?, ?)",
        params![resource_id, resource.schema_url],
    )
    .map_err(|e| TraceVaultError::Store(format!("insert resource failed: {e}")))?;
    insert_attributes(tx, "resource_attributes", "resource_id", &resource_id, &resource.attributes)?;
    Ok(resource_id)
}

fn insert_scope(tx: &Transaction, scope: &ScopeSpans) -> Result<String> {
    let scope_id = new_row_id();
    tx.execute(
        "INSERT INTO scopes (id, name, version, schema_url) VALUES (?, ?, ?, ?)",
        params![scope_id, scope.name, scope.version, scope.schema_url],
    )
    .map_err(|e| TraceVaultError::Store(format!("insert scope failed: {e}")))?;
    insert_attributes(tx, "scope_attributes", "scope_id", &scope_id, &scope.attributes)?;
    Ok(scope_id)
}

fn insert_span(
    tx: &Transaction,
    span: &SpanRecord,
    service: &str,
    resource_id: &str,
    scope_id: &str,
) -> Result<()> {
    let span_id = if span.span_id.is_empty() {
        ZERO_SPAN_ID
    } else {
        span.span_id.as_str()
    };

    if span_exists(tx, &span.trace_id, span_id)? {
        return Ok(());
    }

    let span_row_id = new_row_id();
    tx.execute(
        "INSERT INTO spans (id, trace_id, span_id, parent_span_id, name, kind, start_time_unix_nano, end_time_unix_nano, status_code, status_message, service_name, flags, resource_id, scope_id)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            span_row_id,
            span.trace_id,
            span_id,
            span.parent_span_id,
            span.name,
            span.kind,
            span.start_time_unix_nano,
            span.end_time_unix_nano,
            span.status_code,
            span.status_message,
            service,
            span.flags as i64,
            resource_id,
            scope_id,
        ],
    )
    .map_err(|e| TraceVaultError::Store(format!("insert span failed: {e}")))?;

    insert_attributes(tx, "span_attributes", "span_id", &span_row_id, &span.attributes)?;
    insert_events(tx, &span_row_id, &span.events)?;
    insert_links(tx, &span_row_id, &span.links)?;
    Ok(())
}

fn span_exists(tx: &Transaction, trace_id: &str, span_id: &str) -> Result<bool> {
    let count = tx
        .query_row(
            "SELECT COUNT(*) FROM spans WHERE trace_id = ? AND span_id = ?",
            params![trace_id, span_id],
            |row| row.get::<_, i64>(0),
        )
        .map_err(|e| TraceVaultError::Store(format!("lookup span failed: {e}")))?;
    Ok(count > 0)
}

fn insert_events(tx: &Transaction, span_row_id: &str, events: &[EventRecord]) -> Result<()> {
    for event in events {
        let event_id = new_row_id();
        tx.execute(
            "INSERT INTO span_events (id, span_id, name, time_unix_nano, dropped_attributes_count) VALUES (?, ?, ?, ?, ?)",
            params![
                event_id,
                span_row_id,
                event.name,
                event.time_unix_nano,
                event.dropped_attributes_count as i64,
            ],
        )
        .map_err(|e| TraceVaultError::Store(format!("insert event failed: {e}")))?;
        insert_attributes(tx, "span_event_attributes", "event_id", &event_id, &event.attributes)?;
    }
    Ok(())
}

fn insert_links(tx: &Transaction, span_row_id: &str, links: &[LinkRecord]) -> Result<()> {
    for link in links {
        let link_id = new_row_id();
        tx.execute(
            "INSERT INTO span_links (id, span_id, trace_id, linked_span_id, trace_state, dropped_attributes_count, flags) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                link_id,
                span_row_id,
                link.trace_id,
                link.span_id,
                link.trace_state,
                link.dropped_attributes_count as i64,
                link.flags as i64,
            ],
        )
        .map_err(|e| TraceVaultError::Store(format!("insert link failed: {e}")))?;
        insert_attributes(tx, "span_link_attributes", "link_id", &link_id, &link.attributes)?;
    }
    Ok(())
}

fn insert_attributes(
    tx: &Transaction,
    table: &str,
    id_column: &str,
    id: &str,
    attrs: &[Attribute],
) -> Result<()> {
    for attr in attrs {
        let (attr_type, attr_value) = attr.value.encode();
        tx.execute(
            &format!("INSERT INTO {table} ({id_column}, key, type, value) VALUES (?, ?, ?, ?)"),
            params![id, attr.key, attr_type, attr_value],
        )
        .map_err(|e| TraceVaultError::Store(format!("insert attribute failed: {e}")))?;
    }
    Ok(())
}

fn new_row_id() -> String {
    Uuid::now_v7().to_string()
}

#[cfg(test)]
mod tests {
    use tracevault_core::ids::ZERO_SPAN_ID;

    use crate::Store;
    use crate::testutil::{export_of, sample_export, span_record};

    async fn span_count(store: &Store, trace_id: &str) -> i64 {
        let conn = store.acquire().await.unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM spans WHERE trace_id = ?",
            duckdb::params![trace_id],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn insert_persists_span_with_children() {
        let store = Store::open_in_memory().unwrap();
        let export = sample_export("demo", 0x01, 0x0a);
        store.insert_export(&export).await.unwrap();

        let conn = store.acquire().await.unwrap();
        let spans: i64 = conn
            .query_row("SELECT COUNT(*) FROM spans", [], |row| row.get(0))
            .unwrap();
        let events: i64 = conn
            .query_row("SELECT COUNT(*) FROM span_events", [], |row| row.get(0))
            .unwrap();
        let links: i64 = conn
            .query_row("SELECT COUNT(*) FROM span_links", [], |row| row.get(0))
            .unwrap();
        assert_eq!(spans, 1);
        assert_eq!(events, 1);
        assert_eq!(links, 1);
    }

    #[tokio::test]
    async fn second_export_of_same_span_is_skipped() {
        let store = Store::open_in_memory().unwrap();
        let export = sample_export("demo", 0x01, 0x0a);
        store.insert_export(&export).await.unwrap();
        store.insert_export(&export).await.unwrap();

        let trace_id = &export.resources[0].scopes[0].spans[0].trace_id;
        assert_eq!(span_count(&store, trace_id).await, 1);

        let conn = store.acquire().await.unwrap();
        let events: i64 = conn
            .query_row("SELECT COUNT(*) FROM span_events", [], |row| row.get(0))
            .unwrap();
        assert_eq!(events, 1, "duplicate span must not re-insert children");
    }

    #[tokio::test]
    async fn duplicate_pair_within_one_export_collapses() {
        let store = Store::open_in_memory().unwrap();
        let trace = "11".repeat(16);
        let span = "22".repeat(8);
        let export = export_of(
            "demo",
            vec![
                span_record(&trace, &span, ZERO_SPAN_ID, "first", 100, 200, 0),
                span_record(&trace, &span, ZERO_SPAN_ID, "second", 100, 200, 0),
            ],
        );
        store.insert_export(&export).await.unwrap();
        assert_eq!(span_count(&store, &trace).await, 1);
    }

    #[tokio::test]
    async fn span_rows_reference_existing_resource_and_scope() {
        let store = Store::open_in_memory().unwrap();
        store
            .insert_export(&sample_export("demo", 0x01, 0x0a))
            .await
            .unwrap();

        let conn = store.acquire().await.unwrap();
        let dangling: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM spans s
                 WHERE NOT EXISTS (SELECT 1 FROM resources r WHERE r.id = s.resource_id)
                    OR NOT EXISTS (SELECT 1 FROM scopes sc WHERE sc.id = s.scope_id)",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(dangling, 0);
    }

    #[tokio::test]
    async fn empty_span_id_normalizes_to_zero_id() {
        let store = Store::open_in_memory().unwrap();
        let trace = "ab".repeat(16);
        let mut record = span_record(&trace, "", ZERO_SPAN_ID, "orphan", 1, 2, 0);
        record.span_id = String::new();
        store
            .insert_export(&export_of("demo", vec![record]))
            .await
            .unwrap();

        let conn = store.acquire().await.unwrap();
        let stored: String = conn
            .query_row(
                "SELECT span_id FROM spans WHERE trace_id = ?",
                duckdb::params![trace],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(stored, ZERO_SPAN_ID);
    }
}
