//! SQLite card store
//!
//! One connection lives on a dedicated worker thread; async callers send it
//! closures and await the reply on a oneshot channel. Every upsert runs as a
//! single `IMMEDIATE` transaction: read the pair's newest card still inside the
//! window, grow it in place, or `INSERT` a new card when nothing was open.
//!
//! The single connection serializes writes across all owners. The in-memory
//! store is the backend that only serializes per `(owner, source_node)`.

use crate::error::StoreError;
use crate::store::CardStore;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use insight_core::{Attributes, Card, CardDraft, CardId, Clock, OwnerId, SilenceWindow, SystemClock};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

const CURRENT_SCHEMA_VERSION: i32 = 1;

const CARD_COLUMNS: &str = "id, owner_id, source_node, card_type, priority, data, updated_at";

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct WorkerInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for WorkerInner {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.lock().take() {
            if self.sender.send(DbCommand::Shutdown).is_err() {
                error!("store worker already stopped");
            }
            if handle.join().is_err() {
                error!("store worker panicked");
            }
        }
    }
}

/// Card store persisted in a SQLite database
#[derive(Clone)]
pub struct SqliteCardStore {
    inner: Arc<WorkerInner>,
    path: Option<Arc<PathBuf>>,
    clock: Arc<dyn Clock>,
    window: SilenceWindow,
}

impl fmt::Debug for SqliteCardStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteCardStore")
            .field("path", &self.path)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl SqliteCardStore {
    /// Open (creating if needed) a database file and migrate it
    ///
    /// # Errors
    /// - `StoreError::Io` if the parent directory cannot be created
    /// - `StoreError::Sqlite` / `StoreError::SchemaTooNew` from opening or migrating
    pub fn open(path: impl Into<PathBuf>, window: SilenceWindow) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let opened = path.clone();
        let store = Self::spawn(move || Connection::open(&opened), window)?;
        info!(path = %path.display(), "card database ready");
        Ok(Self {
            path: Some(Arc::new(path)),
            ..store
        })
    }

    /// Private in-memory database, mostly for tests
    pub fn open_in_memory(window: SilenceWindow) -> Result<Self, StoreError> {
        Self::spawn(Connection::open_in_memory, window)
    }

    /// Replace the time source
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref().map(PathBuf::as_path)
    }

    fn spawn<F>(open: F, window: SilenceWindow) -> Result<Self, StoreError>
    where
        F: FnOnce() -> rusqlite::Result<Connection> + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), StoreError>>();

        let worker = thread::Builder::new()
            .name("insight-store".into())
            .spawn(move || {
                let mut conn = match open() {
                    Ok(conn) => conn,
                    Err(e) => {
                        if ready_tx.send(Err(e.into())).is_err() {
                            debug!("store opener gone before open failure was reported");
                        }
                        return;
                    }
                };
                if let Err(e) = conn.pragma_update(None, "journal_mode", "WAL") {
                    debug!(error = %e, "WAL mode unavailable");
                }
                if ready_tx.send(run_migrations(&mut conn)).is_err() {
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => task(&mut conn),
                        DbCommand::Shutdown => break,
                    }
                }
                debug!("store worker shutting down");
            })?;

        ready_rx.recv().map_err(|_| StoreError::WorkerGone)??;

        Ok(Self {
            inner: Arc::new(WorkerInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            path: None,
            clock: Arc::new(SystemClock),
            window,
        })
    }

    async fn execute<F, T>(&self, task: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = DbCommand::Execute(Box::new(move |conn| {
            if reply_tx.send(task(conn)).is_err() {
                debug!("store caller dropped before reply");
            }
        }));

        self.inner
            .sender
            .send(command)
            .map_err(|_| StoreError::WorkerGone)?;
        reply_rx.await.map_err(|_| StoreError::WorkerGone)?
    }
}

fn run_migrations(conn: &mut Connection) -> Result<(), StoreError> {
    let mut version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if version > CURRENT_SCHEMA_VERSION {
        return Err(StoreError::SchemaTooNew {
            found: version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }
    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    while version < CURRENT_SCHEMA_VERSION {
        version += 1;
        apply_migration(&tx, version)?;
    }
    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
    tx.commit()?;
    info!(version, "card schema migrated");
    Ok(())
}

fn apply_migration(tx: &Transaction<'_>, version: i32) -> Result<(), StoreError> {
    match version {
        1 => tx.execute_batch(include_str!("schemas/schema_v1.sql"))?,
        other => {
            return Err(StoreError::Corrupt(format!("no migration to version {other}")));
        }
    }
    Ok(())
}

/// Fixed-width UTC timestamps so text ordering matches time ordering
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_card(row: &Row<'_>) -> Result<Card, StoreError> {
    let id: String = row.get("id")?;
    let card_type: String = row.get("card_type")?;
    let priority: String = row.get("priority")?;
    let data: String = row.get("data")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Card {
        id: id
            .parse::<CardId>()
            .map_err(|e| StoreError::Corrupt(format!("id '{id}': {e}")))?,
        owner: OwnerId::new(row.get::<_, String>("owner_id")?),
        card_type: card_type.parse().map_err(StoreError::Corrupt)?,
        priority: priority.parse().map_err(StoreError::Corrupt)?,
        source_node: row.get("source_node")?,
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::Corrupt(format!("updated_at '{updated_at}': {e}")))?,
        attributes: serde_json::from_str::<Attributes>(&data)?,
    })
}

fn latest_card(
    conn: &Connection,
    owner: &str,
    source_node: &str,
    cutoff: &str,
) -> Result<Option<Card>, StoreError> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {CARD_COLUMNS} FROM feed_cards
         WHERE owner_id = ?1 AND source_node = ?2
         ORDER BY updated_at DESC, id DESC
         LIMIT 1"
    ))?;
    let card = stmt
        .query_row(params![owner, source_node], |row| Ok(row_to_card(row)))
        .optional()?
        .transpose()?;
    Ok(card.filter(|c| timestamp(c.updated_at).as_str() >= cutoff))
}

#[async_trait]
impl CardStore for SqliteCardStore {
    async fn upsert(&self, owner: &OwnerId, draft: CardDraft) -> Result<Card, StoreError> {
        // stored precision, so returned cards compare equal to re-read ones
        let now = self.clock.now().trunc_subsecs(6);
        let cutoff = timestamp(self.window.cutoff(now));
        let owner = owner.clone();

        self.execute(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let stamp = timestamp(now);

            let open = latest_card(&tx, owner.as_str(), &draft.source_node, &cutoff)?;
            let created = open.is_none();
            let card = match open {
                Some(mut card) => {
                    card.apply(draft, now);
                    tx.execute(
                        "UPDATE feed_cards
                         SET card_type = ?1, priority = ?2, data = ?3, updated_at = ?4
                         WHERE id = ?5",
                        params![
                            card.card_type.as_str(),
                            card.priority.as_str(),
                            serde_json::to_string(&card.attributes)?,
                            stamp,
                            card.id.to_string(),
                        ],
                    )?;
                    card
                }
                None => {
                    let card = draft.into_card(owner.clone(), now);
                    tx.execute(
                        "INSERT INTO feed_cards
                         (id, owner_id, source_node, card_type, priority, data, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                        params![
                            card.id.to_string(),
                            owner.as_str(),
                            card.source_node,
                            card.card_type.as_str(),
                            card.priority.as_str(),
                            serde_json::to_string(&card.attributes)?,
                            stamp,
                        ],
                    )?;
                    card
                }
            };
            tx.commit()?;

            debug!(
                %owner,
                node = %card.source_node,
                card_id = %card.id,
                created,
                "card upserted"
            );
            Ok(card)
        })
        .await
    }

    async fn open_card(
        &self,
        owner: &OwnerId,
        source_node: &str,
    ) -> Result<Option<Card>, StoreError> {
        let cutoff = timestamp(self.window.cutoff(self.clock.now()));
        let owner = owner.clone();
        let source_node = source_node.to_string();
        self.execute(move |conn| latest_card(conn, owner.as_str(), &source_node, &cutoff))
            .await
    }

    async fn get_feed(&self, owner: &OwnerId, limit: usize) -> Result<Vec<Card>, StoreError> {
        let owner = owner.clone();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.execute(move |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {CARD_COLUMNS} FROM feed_cards
                 WHERE owner_id = ?1
                 ORDER BY updated_at DESC, id DESC
                 LIMIT ?2"
            ))?;
            let mut rows = stmt.query(params![owner.as_str(), limit])?;
            let mut cards = Vec::new();
            while let Some(row) = rows.next()? {
                cards.push(row_to_card(row)?);
            }
            Ok(cards)
        })
        .await
    }

    async fn delete_feed(&self, owner: &OwnerId) -> Result<usize, StoreError> {
        let owner = owner.clone();
        self.execute(move |conn| {
            let removed = conn.execute(
                "DELETE FROM feed_cards WHERE owner_id = ?1",
                params![owner.as_str()],
            )?;
            debug!(%owner, removed, "feed cleared");
            Ok(removed)
        })
        .await
    }
}
