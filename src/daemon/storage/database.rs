use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use rusqlite::Connection;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::schema::initialize_schema;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum Request {
    Run(Job),
    Close,
}

/// The thread owning the connection. Closed once the last [EventStore] clone goes away.
struct Worker {
    requests: mpsc::Sender<Request>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    fn spawn(mut conn: Connection) -> Result<Self> {
        let (requests, inbox) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("timetrail-db".into())
            .spawn(move || {
                for request in inbox {
                    match request {
                        Request::Run(job) => job(&mut conn),
                        Request::Close => break,
                    }
                }
                debug!("Database thread finished");
            })
            .context("couldn't spawn the database thread")?;

        Ok(Self {
            requests,
            thread: Mutex::new(Some(thread)),
        })
    }

    fn close(&self) {
        let thread = self
            .thread
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(thread) = thread else {
            return;
        };
        // The thread also stops on its own once the channel is gone.
        let _ = self.requests.send(Request::Close);
        if thread.join().is_err() {
            warn!("Database thread panicked");
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_connection(db_path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(db_path)
        .with_context(|| format!("couldn't open database {}", db_path.display()))?;
    if let Err(e) = conn.pragma_update(None, "journal_mode", "WAL") {
        warn!("Staying on the default journal mode {e}");
    }
    conn.busy_timeout(BUSY_TIMEOUT)?;
    initialize_schema(&mut conn).context("couldn't create the database schema")?;
    Ok(conn)
}

/// Durable record store. One SQLite connection lives on a dedicated thread and every statement
/// is queued to it, so writes never interleave.
#[derive(Clone)]
pub struct EventStore {
    worker: Arc<Worker>,
    db_path: Arc<PathBuf>,
}

impl EventStore {
    /// Opens (creating if needed) the database at `db_path` and makes sure the schema exists.
    pub fn open(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|v| !v.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("couldn't create {}", parent.display()))?;
        }

        let worker = Worker::spawn(open_connection(&db_path)?)?;
        info!("Using database {}", db_path.display());
        Ok(Self {
            worker: Arc::new(worker),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    /// Runs `task` on the database thread and waits for its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            // Nobody is waiting anymore when the caller was cancelled.
            let _ = reply.send(task(conn));
        });

        self.worker
            .requests
            .send(Request::Run(job))
            .map_err(|_| anyhow!("database thread is gone"))?;
        result
            .await
            .map_err(|_| anyhow!("database thread dropped the request"))?
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use super::EventStore;

    #[tokio::test]
    async fn creates_missing_directories_and_schema() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("activity.sqlite3");
        let store = EventStore::open(path.clone())?;
        assert_eq!(store.path(), path.as_path());

        let tables: Vec<String> = store
            .execute(|conn| {
                let mut stmt = conn
                    .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await?;
        assert_eq!(tables, vec!["activity_events", "project_mappings"]);
        Ok(())
    }

    #[tokio::test]
    async fn reopening_keeps_existing_schema() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("activity.sqlite3");
        drop(EventStore::open(path.clone())?);
        EventStore::open(path)?;
        Ok(())
    }

    #[tokio::test]
    async fn clones_keep_the_connection_alive() -> Result<()> {
        let dir = tempdir()?;
        let store = EventStore::open(dir.path().join("activity.sqlite3"))?;
        let clone = store.clone();
        drop(store);

        let answer: i64 = clone
            .execute(|conn| Ok(conn.query_row("SELECT 40 + 2", [], |row| row.get(0))?))
            .await?;
        assert_eq!(answer, 42);
        Ok(())
    }
}
