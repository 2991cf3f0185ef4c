use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error as ThisError;
use tracing::info;

use crate::store::{Store, StoreError};

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("snapshot io error: {0}")]
    Io(#[from] io::Error),
    #[error("snapshot is corrupt: {0}")]
    Corrupt(#[from] bincode::Error),
    #[error("snapshot refers to a database outside the configured range: {0}")]
    Store(#[from] StoreError),
}

/// On-disk image of every database's live entries: (key, value, absolute
/// expiry in epoch milliseconds). The layout is opaque to clients; only this
/// module reads or writes it.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    databases: Vec<Vec<(String, Vec<u8>, Option<u64>)>>,
}

/// Serialize the store's live entries to `path`, atomically via a temp file
/// and rename. The store lock is held only while copying entries to memory,
/// not for the disk write.
pub fn save(store: &Store, path: &Path) -> Result<(), Error> {
    let snapshot = Snapshot {
        databases: store.lock().snapshot(),
    };

    let encoded = bincode::serialize(&snapshot)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &encoded)?;
    fs::rename(&tmp, path)?;

    Ok(())
}

/// Rebuild a store from `path`. A missing file yields an empty store; a
/// corrupt one is an error, and the server must refuse to start rather than
/// run with garbled state.
pub fn load(path: &Path, num_databases: usize) -> Result<Store, Error> {
    let store = Store::new(num_databases);

    let encoded = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("No snapshot at {}, starting empty", path.display());
            return Ok(store);
        }
        Err(e) => return Err(e.into()),
    };

    let snapshot: Snapshot = bincode::deserialize(&encoded)?;

    let mut guard = store.lock();
    for (db, entries) in snapshot
        .databases
        .into_iter()
        .enumerate()
        .take(num_databases)
    {
        for (key, data, expires_at) in entries {
            guard.set(db, key, Bytes::from(data), expires_at)?;
        }
    }
    drop(guard);

    info!("Loaded snapshot from {}", path.display());
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::now_millis;

    #[tokio::test]
    async fn missing_file_yields_empty_store() {
        let dir = tempfile::tempdir().unwrap();

        let store = load(&dir.path().join("absent.snapshot"), 4).unwrap();

        for db in 0..4 {
            assert_eq!(store.lock().len(db).unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn round_trip_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.snapshot");

        save(&Store::new(16), &path).unwrap();
        let restored = load(&path, 16).unwrap();

        for db in 0..16 {
            assert_eq!(restored.lock().len(db).unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn round_trip_populated_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.snapshot");
        let expiry = now_millis() + 60_000;

        let store = Store::new(4);
        {
            let mut guard = store.lock();
            guard
                .set(0, "foo".to_string(), Bytes::from("xy"), None)
                .unwrap();
            guard
                .set(2, "bar".to_string(), Bytes::from("baz"), Some(expiry))
                .unwrap();
        }

        save(&store, &path).unwrap();
        let restored = load(&path, 4).unwrap();
        let mut guard = restored.lock();

        assert_eq!(guard.get(0, "foo").unwrap(), Some(Bytes::from("xy")));
        assert_eq!(guard.get(2, "bar").unwrap(), Some(Bytes::from("baz")));
        assert_eq!(guard.len(1).unwrap(), 0);
        assert_eq!(
            guard.snapshot()[2],
            vec![("bar".to_string(), b"baz".to_vec(), Some(expiry))]
        );
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbled.snapshot");
        fs::write(&path, b"definitely not a snapshot").unwrap();

        assert!(matches!(load(&path, 16), Err(Error::Corrupt(_))));
    }

    #[tokio::test]
    async fn save_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.snapshot");

        let store = Store::new(1);
        store
            .lock()
            .set(0, "a".to_string(), Bytes::from("1"), None)
            .unwrap();
        save(&store, &path).unwrap();

        store.lock().remove(0, "a").unwrap();
        store
            .lock()
            .set(0, "b".to_string(), Bytes::from("2"), None)
            .unwrap();
        save(&store, &path).unwrap();

        let restored = load(&path, 1).unwrap();
        let mut guard = restored.lock();
        assert_eq!(guard.get(0, "a").unwrap(), None);
        assert_eq!(guard.get(0, "b").unwrap(), Some(Bytes::from("2")));
    }
}
