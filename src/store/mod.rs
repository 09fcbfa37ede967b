use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;

use crate::models::delivery::DeliveryRecord;
use crate::sync::{ChangeBus, ChangeNotice};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write collection: {0}")]
    Write(#[from] io::Error),

    #[error("failed to serialize collection: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Canonical home of the delivery collection: one keyed JSON document,
/// rewritten in full on every commit.
///
/// The store caches nothing. `load` always re-reads the document, so any
/// number of stores sharing a path and a bus (one per execution context)
/// converge by reloading when notified. Concurrent commits resolve as last
/// write wins; the store carries no business validation.
pub struct DeliveryStore {
    path: PathBuf,
    key: String,
    bus: ChangeBus,
}

impl DeliveryStore {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>, bus: ChangeBus) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
            bus,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Reads the persisted collection. An absent or malformed document is an
    /// empty collection, never an error: corrupt external state must not
    /// crash a context.
    pub fn load(&self) -> Vec<DeliveryRecord> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                warn!(key = %self.key, error = %err, "unreadable collection document; treating as empty");
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(err) => {
                warn!(key = %self.key, error = %err, "malformed collection document; treating as empty");
                Vec::new()
            }
        }
    }

    /// Persists the whole collection, sorted ascending by `order`, then
    /// notifies every subscriber on the bus. The write goes through a
    /// sibling temp file and a rename so readers never observe a torn
    /// document.
    pub fn commit(&self, mut records: Vec<DeliveryRecord>) -> Result<(), StoreError> {
        records.sort_by_key(|r| r.order);
        let serialized = serde_json::to_vec(&records)?;

        let tmp = temp_path(&self.path);
        fs::write(&tmp, &serialized)?;
        fs::rename(&tmp, &self.path)?;

        self.bus.notify(&self.key);
        Ok(())
    }

    /// Change feed for this store's key. Receivers must reload on every
    /// notice and tolerate redundant ones.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotice> {
        self.bus.subscribe()
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::DeliveryStore;
    use crate::models::delivery::{DeliveryRecord, DeliveryStatus};
    use crate::sync::ChangeBus;

    fn store_at(dir: &tempfile::TempDir, bus: ChangeBus) -> DeliveryStore {
        DeliveryStore::new(dir.path().join("deliveries.json"), "deliveries", bus)
    }

    fn record(order: i64) -> DeliveryRecord {
        DeliveryRecord::new(format!("Stop {order}"), None, None, order)
    }

    #[test]
    fn absent_document_loads_as_empty() {
        let dir = tempdir().unwrap();
        let store = store_at(&dir, ChangeBus::new(16));

        assert!(store.load().is_empty());
    }

    #[test]
    fn malformed_document_loads_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deliveries.json");
        fs::write(&path, "{not json").unwrap();
        let store = DeliveryStore::new(path, "deliveries", ChangeBus::new(16));

        assert!(store.load().is_empty());
    }

    #[test]
    fn commit_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = store_at(&dir, ChangeBus::new(16));

        let records = vec![record(1), record(2)];
        store.commit(records.clone()).unwrap();

        assert_eq!(store.load(), records);
    }

    #[test]
    fn commit_persists_sorted_by_order() {
        let dir = tempdir().unwrap();
        let store = store_at(&dir, ChangeBus::new(16));

        store.commit(vec![record(5), record(2), record(9)]).unwrap();

        let orders: Vec<i64> = store.load().iter().map(|r| r.order).collect();
        assert_eq!(orders, vec![2, 5, 9]);
    }

    #[tokio::test]
    async fn commit_notifies_subscribers_with_the_store_key() {
        let dir = tempdir().unwrap();
        let store = store_at(&dir, ChangeBus::new(16));
        let mut rx = store.subscribe();

        store.commit(vec![record(1)]).unwrap();

        assert_eq!(rx.recv().await.unwrap().key, "deliveries");
    }

    #[tokio::test]
    async fn second_context_converges_after_notification() {
        let dir = tempdir().unwrap();
        let bus = ChangeBus::new(16);
        let dispatcher = store_at(&dir, bus.clone());
        let courier = store_at(&dir, bus);

        let mut records = vec![record(1), record(2)];
        dispatcher.commit(records.clone()).unwrap();
        assert_eq!(courier.load(), records);

        let mut rx = courier.subscribe();
        for r in &mut records {
            r.status = DeliveryStatus::InRoute;
        }
        dispatcher.commit(records.clone()).unwrap();

        rx.recv().await.unwrap();
        let reloaded = courier.load();
        assert!(reloaded.iter().all(|r| r.status == DeliveryStatus::InRoute));
    }
}
