use std::fs;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::{Arc, Mutex};

use duckdb::Connection;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracevault_core::error::{Result, TraceVaultError};

use crate::schema::SCHEMA_SQL;

const POOL_SIZE: usize = 4;

/// Handle to the relational span store. Clones share one bounded pool of
/// DuckDB connections; the ingest writer and the query engine both
/// acquire from it.
#[derive(Clone)]
pub struct Store {
    pool: Arc<Pool>,
}

struct Pool {
    conns: Mutex<Vec<Connection>>,
    permits: Arc<Semaphore>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| TraceVaultError::Io(format!("failed to create db dir: {e}")))?;
        }

        let conn = Connection::open(path)
            .map_err(|e| TraceVaultError::Store(format!("failed to open duckdb: {e}")))?;
        Self::with_initial(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| TraceVaultError::Store(format!("failed to open in-memory db: {e}")))?;
        Self::with_initial(conn)
    }

    fn with_initial(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA threads=4;")
            .map_err(|e| TraceVaultError::Store(format!("failed to set pragmas: {e}")))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| TraceVaultError::Store(format!("failed to initialize schema: {e}")))?;

        let mut conns = Vec::with_capacity(POOL_SIZE);
        for _ in 1..POOL_SIZE {
            conns.push(
                conn.try_clone()
                    .map_err(|e| TraceVaultError::Store(format!("failed to clone connection: {e}")))?,
            );
        }
        conns.push(conn);

        Ok(Self {
            pool: Arc::new(Pool {
                conns: Mutex::new(conns),
                permits: Arc::new(Semaphore::new(POOL_SIZE)),
            }),
        })
    }

    /// Checks a connection out of the pool, waiting when all are in use.
    pub(crate) async fn acquire(&self) -> Result<PooledConn> {
        let permit = self
            .pool
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TraceVaultError::Internal("connection pool closed".to_string()))?;

        let conn = self
            .pool
            .conns
            .lock()
            .expect("pool mutex poisoned")
            .pop()
            .expect("pool holds a connection for every permit");

        Ok(PooledConn {
            conn: Some(conn),
            pool: Arc::clone(&self.pool),
            _permit: permit,
        })
    }
}

pub(crate) struct PooledConn {
    conn: Option<Connection>,
    pool: Arc<Pool>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConn {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection checked out")
    }
}

impl DerefMut for PooledConn {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection checked out")
    }
}

impl Drop for PooledConn {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool
                .conns
                .lock()
                .expect("pool mutex poisoned")
                .push(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_initializes() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.acquire().await.unwrap();
        let count = conn
            .query_row("SELECT COUNT(*) FROM spans", [], |row| row.get::<_, i64>(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn acquire_returns_connections_to_pool() {
        let store = Store::open_in_memory().unwrap();
        for _ in 0..POOL_SIZE * 2 {
            let conn = store.acquire().await.unwrap();
            drop(conn);
        }
        let first = store.acquire().await.unwrap();
        let second = store.acquire().await.unwrap();
        drop((first, second));
    }
}
