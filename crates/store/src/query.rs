use std::collections::HashMap;

use duckdb::types::Value;
use duckdb::{Connection, params_from_iter};
use tracevault_core::error::{Result, TraceVaultError};
use tracevault_core::ids::ZERO_SPAN_ID;
use tracevault_core::model::value::decode_attribute;
use tracevault_core::query::{
    AttrMap, DEFAULT_LIMIT, EventView, LinkView, ResourceView, ScopeView, SpanQuery, SpanView,
    StatusCode, TraceOrder, TraceQuery, TraceSummary,
};

use crate::Store;
use crate::db::PooledConn;

/// Hydration lookups batch row ids into IN clauses of at most this many
/// placeholders per statement.
const HYDRATE_BATCH: usize = 200;

const SPAN_COLUMNS: &str = "id, trace_id, span_id, parent_span_id, name, kind, start_time_unix_nano, end_time_unix_nano, status_code, status_message, service_name, flags, resource_id, scope_id";

struct SpanRowIds {
    span: String,
    resource: String,
    scope: String,
}

impl Store {
    /// Spans matching service + time window + attribute/status filters,
    /// newest first, fully hydrated.
    pub async fn query_spans(&self, params: &SpanQuery) -> Result<Vec<SpanView>> {
        let (sql, args) = build_span_query(params);
        let conn = self.acquire().await?;
        let (mut spans, ids) = fetch_spans(&conn, &sql, &args)?;
        hydrate_spans(&conn, &mut spans, &ids)?;
        Ok(spans)
    }

    /// Per-trace summaries for traces that have at least one span
    /// matching the filters. Aggregates run over *all* spans of each
    /// candidate trace, not only the matching ones.
    pub async fn query_traces(&self, params: &TraceQuery) -> Result<Vec<TraceSummary>> {
        let (sql, args) = build_trace_summary_query(params);
        let conn = self.acquire().await?;

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| TraceVaultError::Store(format!("prepare traces failed: {e}")))?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                Ok(TraceSummary {
                    trace_id: row.get(0)?,
                    root_name: row.get(1)?,
                    start_time_unix_nano: row.get(2)?,
                    end_time_unix_nano: row.get(3)?,
                    duration_unix_nano: row.get(4)?,
                    span_count: row.get(5)?,
                    error_count: row.get(6)?,
                    service_name: row.get(7)?,
                })
            })
            .map_err(|e| TraceVaultError::Store(format!("query traces failed: {e}")))?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries
                .push(row.map_err(|e| TraceVaultError::Store(format!("map trace row failed: {e}")))?);
        }
        Ok(summaries)
    }

    /// Every span of one trace in waterfall order (start ascending),
    /// optionally narrowed by service and status, fully hydrated.
    pub async fn query_trace_spans(
        &self,
        trace_id: &str,
        service: Option<&str>,
        status: Option<StatusCode>,
    ) -> Result<Vec<SpanView>> {
        let trace_id = trace_id.trim();
        if trace_id.is_empty() {
            return Err(TraceVaultError::InvalidArgument(
                "trace_id is required".to_string(),
            ));
        }

        let (sql, args) = build_trace_spans_query(trace_id, service, status);
        let conn = self.acquire().await?;
        let (mut spans, ids) = fetch_spans(&conn, &sql, &args)?;
        hydrate_spans(&conn, &mut spans, &ids)?;
        Ok(spans)
    }
}

fn effective_limit(limit: usize) -> usize {
    if limit == 0 { DEFAULT_LIMIT } else { limit }
}

fn build_span_query(params: &SpanQuery) -> (String, Vec<Value>) {
    let mut sql = format!(
        "SELECT {SPAN_COLUMNS} FROM spans
         WHERE service_name = ? AND start_time_unix_nano >= ? AND start_time_unix_nano <= ?"
    );
    let mut args = vec![
        Value::Text(params.service.clone()),
        Value::BigInt(params.start),
        Value::BigInt(params.end),
    ];

    push_attr_filters(&mut sql, &mut args, &params.attr_filters);
    if let Some(status) = params.status {
        sql.push_str(" AND status_code = ?");
        args.push(Value::Int(status.code()));
    }

    sql.push_str(" ORDER BY start_time_unix_nano DESC LIMIT ?");
    args.push(Value::BigInt(effective_limit(params.limit) as i64));
    (sql, args)
}

fn build_trace_summary_query(params: &TraceQuery) -> (String, Vec<Value>) {
    let mut sql = String::from(
        "WITH candidate_traces AS (
           SELECT DISTINCT trace_id FROM spans
           WHERE service_name = ? AND start_time_unix_nano >= ? AND start_time_unix_nano <= ?",
    );
    let mut args = vec![
        Value::Text(params.service.clone()),
        Value::BigInt(params.start),
        Value::BigInt(params.end),
    ];

    push_attr_filters(&mut sql, &mut args, &params.attr_filters);
    if let Some(status) = params.status {
        sql.push_str(" AND status_code = ?");
        args.push(Value::Int(status.code()));
    }

    sql.push_str(
        ")
         SELECT s.trace_id,
           (SELECT name FROM spans root WHERE root.trace_id = s.trace_id AND root.parent_span_id = ? ORDER BY root.start_time_unix_nano ASC LIMIT 1) AS root_name,
           MIN(s.start_time_unix_nano) AS start_time_unix_nano,
           MAX(s.end_time_unix_nano) AS end_time_unix_nano,
           MAX(s.end_time_unix_nano) - MIN(s.start_time_unix_nano) AS duration_unix_nano,
           CAST(COUNT(*) AS BIGINT) AS span_count,
           CAST(SUM(CASE WHEN s.status_code = 2 THEN 1 ELSE 0 END) AS BIGINT) AS error_count,
           CAST(? AS VARCHAR) AS service_name
         FROM spans s
         JOIN candidate_traces ct ON ct.trace_id = s.trace_id
         GROUP BY s.trace_id",
    );
    args.push(Value::Text(ZERO_SPAN_ID.to_string()));
    args.push(Value::Text(params.service.clone()));

    if params.has_error {
        sql.push_str(" HAVING SUM(CASE WHEN s.status_code = 2 THEN 1 ELSE 0 END) > 0");
    }

    sql.push_str(order_clause(params.order));
    sql.push_str(" LIMIT ?");
    args.push(Value::BigInt(effective_limit(params.limit) as i64));

    (sql, args)
}

// Every ordering ends in trace_id DESC so pagination stays deterministic
// when traces share a sort key.
fn order_clause(order: TraceOrder) -> &'static str {
    match order {
        TraceOrder::StartDesc => " ORDER BY start_time_unix_nano DESC, s.trace_id DESC",
        TraceOrder::StartAsc => " ORDER BY start_time_unix_nano ASC, s.trace_id DESC",
        TraceOrder::DurationDesc => {
            " ORDER BY duration_unix_nano DESC, start_time_unix_nano DESC, s.trace_id DESC"
        }
        TraceOrder::DurationAsc => {
            " ORDER BY duration_unix_nano ASC, start_time_unix_nano DESC, s.trace_id DESC"
        }
    }
}

fn build_trace_spans_query(
    trace_id: &str,
    service: Option<&str>,
    status: Option<StatusCode>,
) -> (String, Vec<Value>) {
    let mut sql = format!("SELECT {SPAN_COLUMNS} FROM spans WHERE trace_id = ?");
    let mut args = vec![Value::Text(trace_id.to_string())];

    if let Some(service) = service {
        if !service.trim().is_empty() {
            sql.push_str(" AND service_name = ?");
            args.push(Value::Text(service.trim().to_string()));
        }
    }
    if let Some(status) = status {
        sql.push_str(" AND status_code = ?");
        args.push(Value::Int(status.code()));
    }

    sql.push_str(" ORDER BY start_time_unix_nano ASC");
    (sql, args)
}

fn push_attr_filters(
    sql: &mut String,
    args: &mut Vec<Value>,
    filters: &[tracevault_core::query::AttrFilter],
) {
    for filter in filters {
        sql.push_str(
            " AND EXISTS (SELECT 1 FROM span_attributes sa WHERE sa.span_id = spans.id AND sa.key = ? AND sa.value = ?)",
        );
        args.push(Value::Text(filter.key.clone()));
        args.push(Value::Text(filter.value.clone()));
    }
}

fn fetch_spans(
    conn: &PooledConn,
    sql: &str,
    args: &[Value],
) -> Result<(Vec<SpanView>, Vec<SpanRowIds>)> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| TraceVaultError::Store(format!("prepare spans failed: {e}")))?;

    let rows = stmt
        .query_map(params_from_iter(args.iter()), |row| {
            let ids = SpanRowIds {
                span: row.get(0)?,
                resource: row.get(12)?,
                scope: row.get(13)?,
            };
            let span = SpanView {
                trace_id: row.get(1)?,
                span_id: row.get(2)?,
                parent_span_id: row.get(3)?,
                name: row.get(4)?,
                kind: row.get(5)?,
                start_time_unix_nano: row.get(6)?,
                end_time_unix_nano: row.get(7)?,
                status_code: row.get(8)?,
                status_message: row.get(9)?,
                service_name: row.get(10)?,
                flags: row.get::<_, i64>(11)? as u32,
                resource: ResourceView::default(),
                scope: ScopeView::default(),
                attributes: AttrMap::new(),
                events: Vec::new(),
                links: Vec::new(),
            };
            Ok((span, ids))
        })
        .map_err(|e| TraceVaultError::Store(format!("query spans failed: {e}")))?;

    let mut spans = Vec::new();
    let mut ids = Vec::new();
    for row in rows {
        let (span, row_ids) =
            row.map_err(|e| TraceVaultError::Store(format!("map span row failed: {e}")))?;
        spans.push(span);
        ids.push(row_ids);
    }
    Ok((spans, ids))
}

fn hydrate_spans(conn: &Connection, spans: &mut [SpanView], ids: &[SpanRowIds]) -> Result<()> {
    if spans.is_empty() {
        return Ok(());
    }

    let span_ids: Vec<String> = ids.iter().map(|i| i.span.clone()).collect();
    let resource_ids: Vec<String> = ids.iter().map(|i| i.resource.clone()).collect();
    let scope_ids: Vec<String> = ids.iter().map(|i| i.scope.clone()).collect();

    let attrs = load_attributes_batch(conn, "span_attributes", "span_id", &span_ids)?;
    let resources = load_resources_batch(conn, &resource_ids)?;
    let scopes = load_scopes_batch(conn, &scope_ids)?;
    let mut events = load_events_batch(conn, &span_ids)?;
    let mut links = load_links_batch(conn, &span_ids)?;

    for (span, row_ids) in spans.iter_mut().zip(ids) {
        if let Some(map) = attrs.get(&row_ids.span) {
            span.attributes = map.clone();
        }
        if let Some(resource) = resources.get(&row_ids.resource) {
            span.resource = resource.clone();
        }
        if let Some(scope) = scopes.get(&row_ids.scope) {
            span.scope = scope.clone();
        }
        span.events = events.remove(&row_ids.span).unwrap_or_default();
        span.links = links.remove(&row_ids.span).unwrap_or_default();
    }
    Ok(())
}

fn in_placeholders(n: usize) -> String {
    let mut out = String::with_capacity(n * 2);
    for i in 0..n {
        if i > 0 {
            out.push(',');
        }
        out.push('?');
    }
    out
}

fn load_attributes_batch(
    conn: &Connection,
    table: &str,
    id_column: &str,
    ids: &[String],
) -> Result<HashMap<String, AttrMap>> {
    let mut result: HashMap<String, AttrMap> = HashMap::with_capacity(ids.len());
    for batch in ids.chunks(HYDRATE_BATCH) {
        let sql = format!(
            "SELECT {id_column}, key, type, value FROM {table} WHERE {id_column} IN ({})",
            in_placeholders(batch.len())
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| TraceVaultError::Store(format!("prepare attributes failed: {e}")))?;
        let rows = stmt
            .query_map(params_from_iter(batch.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })
            .map_err(|e| TraceVaultError::Store(format!("load attributes failed: {e}")))?;

        for row in rows {
            let (id, key, attr_type, value) =
                row.map_err(|e| TraceVaultError::Store(format!("map attribute failed: {e}")))?;
            let value = value.unwrap_or_default();
            result
                .entry(id)
                .or_default()
                .insert(key, decode_attribute(&attr_type, &value));
        }
    }
    Ok(result)
}

fn load_resources_batch(
    conn: &Connection,
    resource_ids: &[String],
) -> Result<HashMap<String, ResourceView>> {
    let mut result: HashMap<String, ResourceView> = HashMap::with_capacity(resource_ids.len());
    for batch in resource_ids.chunks(HYDRATE_BATCH) {
        let sql = format!(
            "SELECT id, schema_url FROM resources WHERE id IN ({})",
            in_placeholders(batch.len())
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| TraceVaultError::Store(format!("prepare resources failed: {e}")))?;
        let rows = stmt
            .query_map(params_from_iter(batch.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                ))
            })
            .map_err(|e| TraceVaultError::Store(format!("load resources failed: {e}")))?;
        for row in rows {
            let (id, schema_url) =
                row.map_err(|e| TraceVaultError::Store(format!("map resource failed: {e}")))?;
            result.insert(
                id,
                ResourceView {
                    schema_url,
                    attributes: AttrMap::new(),
                },
            );
        }
    }

    let attrs = load_attributes_batch(conn, "resource_attributes", "resource_id", resource_ids)?;
    for (id, resource) in result.iter_mut() {
        if let Some(map) = attrs.get(id) {
            resource.attributes = map.clone();
        }
    }
    Ok(result)
}

fn load_scopes_batch(conn: &Connection, scope_ids: &[String]) -> Result<HashMap<String, ScopeView>> {
    let mut result: HashMap<String, ScopeView> = HashMap::with_capacity(scope_ids.len());
    for batch in scope_ids.chunks(HYDRATE_BATCH) {
        let sql = format!(
            "SELECT id, name, version, schema_url FROM scopes WHERE id IN ({})",
            in_placeholders(batch.len())
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| TraceVaultError::Store(format!("prepare scopes failed: {e}")))?;
        let rows = stmt
            .query_map(params_from_iter(batch.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    ScopeView {
                        name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        version: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        schema_url: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                        attributes: AttrMap::new(),
                    },
                ))
            })
            .map_err(|e| TraceVaultError::Store(format!("load scopes failed: {e}")))?;
        for row in rows {
            let (id, scope) =
                row.map_err(|e| TraceVaultError::Store(format!("map scope failed: {e}")))?;
            result.insert(id, scope);
        }
    }

    let attrs = load_attributes_batch(conn, "scope_attributes", "scope_id", scope_ids)?;
    for (id, scope) in result.iter_mut() {
        if let Some(map) = attrs.get(id) {
            scope.attributes = map.clone();
        }
    }
    Ok(result)
}

fn load_events_batch(
    conn: &Connection,
    span_ids: &[String],
) -> Result<HashMap<String, Vec<EventView>>> {
    let mut event_ids = Vec::new();
    let mut events: Vec<(String, String, EventView)> = Vec::new();

    for batch in span_ids.chunks(HYDRATE_BATCH) {
        let sql = format!(
            "SELECT id, span_id, name, time_unix_nano, dropped_attributes_count FROM span_events WHERE span_id IN ({})",
            in_placeholders(batch.len())
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| TraceVaultError::Store(format!("prepare events failed: {e}")))?;
        let rows = stmt
            .query_map(params_from_iter(batch.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    EventView {
                        name: row.get(2)?,
                        time_unix_nano: row.get(3)?,
                        dropped_attributes_count: row.get::<_, i64>(4)? as u32,
                        attributes: AttrMap::new(),
                    },
                ))
            })
            .map_err(|e| TraceVaultError::Store(format!("load events failed: {e}")))?;
        for row in rows {
            let (event_id, span_id, event) =
                row.map_err(|e| TraceVaultError::Store(format!("map event failed: {e}")))?;
            event_ids.push(event_id.clone());
            events.push((event_id, span_id, event));
        }
    }

    let attrs = load_attributes_batch(conn, "span_event_attributes", "event_id", &event_ids)?;
    let mut result: HashMap<String, Vec<EventView>> = HashMap::new();
    for (event_id, span_id, mut event) in events {
        if let Some(map) = attrs.get(&event_id) {
            event.attributes = map.clone();
        }
        result.entry(span_id).or_default().push(event);
    }
    for list in result.values_mut() {
        list.sort_by(|a, b| {
            a.time_unix_nano
                .cmp(&b.time_unix_nano)
                .then_with(|| a.name.cmp(&b.name))
        });
    }
    Ok(result)
}

fn load_links_batch(
    conn: &Connection,
    span_ids: &[String],
) -> Result<HashMap<String, Vec<LinkView>>> {
    let mut link_ids = Vec::new();
    let mut links: Vec<(String, String, LinkView)> = Vec::new();

    for batch in span_ids.chunks(HYDRATE_BATCH) {
        let sql = format!(
            "SELECT id, span_id, trace_id, linked_span_id, trace_state, dropped_attributes_count, flags FROM span_links WHERE span_id IN ({})",
            in_placeholders(batch.len())
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| TraceVaultError::Store(format!("prepare links failed: {e}")))?;
        let rows = stmt
            .query_map(params_from_iter(batch.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    LinkView {
                        trace_id: row.get(2)?,
                        span_id: row.get(3)?,
                        trace_state: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                        dropped_attributes_count: row.get::<_, i64>(5)? as u32,
                        flags: row.get::<_, i64>(6)? as u32,
                        attributes: AttrMap::new(),
                    },
                ))
            })
            .map_err(|e| TraceVaultError::Store(format!("load links failed: {e}")))?;
        for row in rows {
            let (link_id, span_id, link) =
                row.map_err(|e| TraceVaultError::Store(format!("map link failed: {e}")))?;
            link_ids.push(link_id.clone());
            links.push((link_id, span_id, link));
        }
    }

    let attrs = load_attributes_batch(conn, "span_link_attributes", "link_id", &link_ids)?;
    let mut result: HashMap<String, Vec<LinkView>> = HashMap::new();
    for (link_id, span_id, mut link) in links {
        if let Some(map) = attrs.get(&link_id) {
            link.attributes = map.clone();
        }
        result.entry(span_id).or_default().push(link);
    }
    for list in result.values_mut() {
        list.sort_by(|a, b| {
            a.trace_id
                .cmp(&b.trace_id)
                .then_with(|| a.span_id.cmp(&b.span_id))
        });
    }
    Ok(result)
}
