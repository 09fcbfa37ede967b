use tokio::sync::broadcast;
use tracing::debug;

/// Notification that a persisted collection changed. Carries no payload
/// beyond the key; receivers re-load and treat the result as authoritative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotice {
    pub key: String,
}

/// Fan-out channel between execution contexts sharing a persisted key.
///
/// Delivery is best effort: no dedup, nothing survives a restart, and a
/// lagged receiver just resubscribes and reloads. Dropping the receiver is
/// the unsubscribe.
#[derive(Clone)]
pub struct ChangeBus {
    tx: broadcast::Sender<ChangeNotice>,
}

impl ChangeBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _unused_rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Broadcasts a change for `key`. Having no listeners is not an error.
    pub fn notify(&self, key: &str) {
        let notice = ChangeNotice {
            key: key.to_string(),
        };
        if self.tx.send(notice).is_err() {
            debug!(key, "change notice dropped: no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotice> {
        self.tx.subscribe()
    }
}
