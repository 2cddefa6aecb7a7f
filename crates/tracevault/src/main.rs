mod api;
mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracevault_core::config::Config;
use tracevault_ingest::queue::QueueSink;
use tracevault_ingest::sink::TraceSink;
use tracevault_ingest::stdout::StdoutSink;
use tracevault_store::Store;

#[derive(Parser, Debug)]
#[command(name = "tracevault")]
#[command(about = "OTLP trace collector with a relational query API")]
struct Cli {
    #[arg(long, help = "HTTP listen address for ingest and query")]
    addr: Option<String>,

    #[arg(long, help = "DuckDB database path")]
    db_path: Option<PathBuf>,

    #[arg(long, help = "Max queued export requests before backpressure")]
    queue_capacity: Option<usize>,

    #[arg(long, help = "Max decoded request body size in bytes")]
    max_body_bytes: Option<usize>,

    #[arg(long, help = "Print decoded spans to stdout instead of persisting")]
    stdout: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing();

    let mut cfg = Config::from_env().context("load config from env")?;
    if let Some(v) = cli.addr {
        cfg.http_addr = v;
    }
    if let Some(v) = cli.db_path {
        cfg.db_path = v;
    }
    if let Some(v) = cli.queue_capacity {
        cfg.queue_capacity = v;
    }
    if let Some(v) = cli.max_body_bytes {
        cfg.max_body_bytes = v;
    }

    run_server(cfg, cli.stdout).await
}

async fn run_server(cfg: Config, stdout_sink: bool) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&cfg.http_addr)
        .await
        .with_context(|| format!("bind {}", cfg.http_addr))?;

    if stdout_sink {
        let sink: Arc<dyn TraceSink> = Arc::new(StdoutSink::stdout());
        let app = tracevault_ingest::otlp::http::router(sink, cfg.max_body_bytes);

        eprintln!("tracevault (stdout sink)");
        eprintln!("  ingest: http://{}/v1/traces", cfg.http_addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("serve http")?;
        return Ok(());
    }

    let store = Store::open(&cfg.db_path).context("open span store")?;
    let queue = Arc::new(QueueSink::new(
        Arc::new(store.clone()) as Arc<dyn TraceSink>,
        cfg.queue_capacity,
    ));

    let app = tracevault_ingest::otlp::http::router(queue.clone(), cfg.max_body_bytes)
        .merge(api::router(store));

    eprintln!("tracevault");
    eprintln!("  db: {}", cfg.db_path.display());
    eprintln!("  ingest: http://{}/v1/traces", cfg.http_addr);
    eprintln!("  query:  http://{}/api/spans", cfg.http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve http")?;

    // Drain everything already admitted before exiting.
    queue.close().await.context("close ingest queue")?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("received ctrl-c, shutting down");
}
