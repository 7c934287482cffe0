pub mod migrations;
pub mod models;
pub mod queries;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use ta_types::{StoreEvent, Table};
use tokio::sync::broadcast;
use tracing::{debug, info};

const EVENT_CAPACITY: usize = 256;

/// The local store. One connection guarded by a mutex serializes all
/// access; committed writes are announced on a broadcast channel so that
/// observers can re-run their queries.
pub struct Database {
    conn: Mutex<Connection>,
    events: broadcast::Sender<StoreEvent>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let db = Self::with_connection(conn)?;

        info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Self::with_connection(Connection::open_in_memory()?)?;
        debug!("In-memory database opened");
        Ok(db)
    }

    fn with_connection(mut conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&mut conn)?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            events,
        })
    }

    /// Subscribe to table invalidations.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }

    /// Runs `f` inside a transaction. After a successful commit every table
    /// in `tables` is announced as invalidated.
    pub fn with_conn_mut<F, T>(&self, tables: &[Table], f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let value = {
            let mut conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            let tx = conn.transaction()?;
            let value = f(&tx)?;
            tx.commit()?;
            value
        };

        for &table in tables {
            // No receivers is fine: nobody is observing yet
            let _ = self.events.send(StoreEvent::Invalidated { table });
        }
        Ok(value)
    }

    /// Schema version currently applied.
    pub fn schema_version(&self) -> Result<i64> {
        self.with_conn(migrations::current_version)
    }
}
