use bytes::Bytes;
use glob_match::glob_match;
use std::collections::{BTreeSet, HashMap};
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error as ThisError;
use tokio::sync::Notify;
use tokio::time::{sleep, Duration};

pub const DEFAULT_DATABASES: usize = 16;

#[derive(Debug, ThisError, PartialEq)]
pub enum StoreError {
    #[error("ERR DB index is out of range")]
    InvalidDatabaseIndex,
}

/// Milliseconds since the UNIX epoch. All expiries are absolute timestamps in
/// this clock so they survive a snapshot/restore cycle.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_millis() as u64
}

/// The Store holds N independent logical databases, each mapping keys to
/// values with optional absolute expiry timestamps. Expired entries are
/// treated as absent on every read; a background task additionally removes
/// them to bound memory. The store is thread-safe and cheap to clone, sharing
/// state via reference counting.
#[derive(Clone)]
pub struct Store {
    inner: Arc<InnerStore>,
}

impl Store {
    pub fn new(num_databases: usize) -> Store {
        let state = State {
            databases: (0..num_databases).map(|_| Database::default()).collect(),
            ttls: BTreeSet::new(),
        };

        let inner = Arc::new(InnerStore {
            state: Mutex::new(state),
            waker: Notify::new(),
            num_databases,
        });

        tokio::spawn({
            let inner = inner.clone();
            async move { remove_expired_keys(inner).await }
        });

        Self { inner }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASES)
    }
}

impl Deref for Store {
    type Target = InnerStore;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

pub struct InnerStore {
    state: Mutex<State>,
    waker: Notify,
    num_databases: usize,
}

impl InnerStore {
    pub fn lock(&self) -> InnerStoreLocked<'_> {
        let state = self.state.lock().unwrap();
        InnerStoreLocked {
            state,
            waker: &self.waker,
        }
    }

    pub fn num_databases(&self) -> usize {
        self.num_databases
    }

    pub fn is_valid_index(&self, index: usize) -> bool {
        index < self.num_databases
    }
}

struct State {
    databases: Vec<Database>,
    /// Expiry index ordered by deadline, so the sweeper only inspects the
    /// front of the set.
    ttls: BTreeSet<(u64, usize, String)>,
}

#[derive(Default)]
struct Database {
    entries: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub data: Bytes,
    pub expires_at: Option<u64>,
}

impl Value {
    fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

pub struct InnerStoreLocked<'a> {
    state: MutexGuard<'a, State>,
    waker: &'a Notify,
}

impl InnerStoreLocked<'_> {
    fn check_index(&self, db: usize) -> Result<(), StoreError> {
        if db < self.state.databases.len() {
            Ok(())
        } else {
            Err(StoreError::InvalidDatabaseIndex)
        }
    }

    /// Insert or overwrite a key. A plain overwrite clears any prior expiry;
    /// passing `expires_at` arms a new one.
    pub fn set(
        &mut self,
        db: usize,
        key: String,
        data: Bytes,
        expires_at: Option<u64>,
    ) -> Result<(), StoreError> {
        self.check_index(db)?;
        let state = &mut *self.state;

        let prior = state.databases[db]
            .entries
            .insert(key.clone(), Value { data, expires_at });
        if let Some(at) = prior.and_then(|v| v.expires_at) {
            state.ttls.remove(&(at, db, key.clone()));
        }

        if let Some(at) = expires_at {
            state.ttls.insert((at, db, key.clone()));
            let expires_next = state.ttls.first() == Some(&(at, db, key));
            if expires_next {
                self.waker.notify_one();
            }
        }

        Ok(())
    }

    /// Read a key, treating an expired entry as absent (and dropping it).
    pub fn get(&mut self, db: usize, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.check_index(db)?;
        let now = now_millis();
        let state = &mut *self.state;

        let expired = state.databases[db]
            .entries
            .get(key)
            .is_some_and(|v| v.is_expired(now));
        if expired {
            if let Some(value) = state.databases[db].entries.remove(key) {
                if let Some(at) = value.expires_at {
                    state.ttls.remove(&(at, db, key.to_string()));
                }
            }
            return Ok(None);
        }

        Ok(state.databases[db].entries.get(key).map(|v| v.data.clone()))
    }

    /// Remove a key. Returns whether a live (non-expired) entry was removed.
    pub fn remove(&mut self, db: usize, key: &str) -> Result<bool, StoreError> {
        self.check_index(db)?;
        let now = now_millis();
        let state = &mut *self.state;

        match state.databases[db].entries.remove(key) {
            Some(value) => {
                if let Some(at) = value.expires_at {
                    state.ttls.remove(&(at, db, key.to_string()));
                }
                Ok(!value.is_expired(now))
            }
            None => Ok(false),
        }
    }

    /// All live keys in `db` matching a glob pattern (`*`, `?`).
    pub fn keys(&self, db: usize, pattern: &str) -> Result<Vec<String>, StoreError> {
        self.check_index(db)?;
        let now = now_millis();

        Ok(self.state.databases[db]
            .entries
            .iter()
            .filter(|(_, value)| !value.is_expired(now))
            .filter(|(key, _)| glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect())
    }

    /// Count of live keys in `db`.
    pub fn len(&self, db: usize) -> Result<usize, StoreError> {
        self.check_index(db)?;
        let now = now_millis();

        Ok(self.state.databases[db]
            .entries
            .values()
            .filter(|value| !value.is_expired(now))
            .count())
    }

    /// Point-in-time copy of every database's live entries, for persistence.
    pub fn snapshot(&self) -> Vec<Vec<(String, Vec<u8>, Option<u64>)>> {
        let now = now_millis();

        self.state
            .databases
            .iter()
            .map(|db| {
                db.entries
                    .iter()
                    .filter(|(_, value)| !value.is_expired(now))
                    .map(|(key, value)| (key.clone(), value.data.to_vec(), value.expires_at))
                    .collect()
            })
            .collect()
    }

    /// Drop every entry whose deadline has passed, returning the next
    /// deadline if any entries remain armed.
    pub fn remove_expired_keys(&mut self) -> Option<u64> {
        let now = now_millis();
        let state = &mut *self.state;

        let expired: Vec<(u64, usize, String)> = state
            .ttls
            .iter()
            .take_while(|(at, _, _)| *at <= now)
            .cloned()
            .collect();

        for (at, db, key) in expired {
            state.databases[db].entries.remove(&key);
            state.ttls.remove(&(at, db, key));
        }

        state.ttls.first().map(|&(at, _, _)| at)
    }
}

async fn remove_expired_keys(store: Arc<InnerStore>) {
    loop {
        let next_expiration = store.lock().remove_expired_keys();

        match next_expiration {
            Some(at) => {
                let delay = Duration::from_millis(at.saturating_sub(now_millis()));
                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = store.waker.notified() => {}
                }
            }
            None => store.waker.notified().await,
        }
    }
}
