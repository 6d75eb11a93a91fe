use crate::error::{Error, Result};
use crate::TransactionId;
use krpc_encoding::Envelope;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::time::Duration;

/// An *optional*, bounded table correlating outbound transaction ids with
/// their eventual response.
///
/// The DHT engine never blocks inbound processing on this — see the module
/// docs on [`crate::SendTransport`]. It exists purely so a caller that wants
/// one (diagnostics, or an outbound `find_node` that wants to know when to
/// give up on a specific peer) can `await` a specific transaction instead of
/// treating every inbound response as anonymous.
#[derive(Clone)]
pub struct ActiveTransactions {
    capacity: usize,
    inner: Arc<Mutex<HashMap<TransactionId, oneshot::Sender<Envelope>>>>,
}

impl ActiveTransactions {
    pub fn new(capacity: usize) -> ActiveTransactions {
        ActiveTransactions {
            capacity,
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Registers interest in `transaction_id`'s response and waits for it,
    /// up to `timeout`. Never holds up any other caller — each registration
    /// is an independent oneshot channel.
    pub async fn wait_for(
        &self,
        transaction_id: TransactionId,
        timeout: Duration,
    ) -> Result<Envelope> {
        let rx = {
            let mut map = self.inner.lock().await;
            if map.len() >= self.capacity {
                return Err(Error::TransactionTableFull);
            }
            let (tx, rx) = oneshot::channel();
            map.insert(transaction_id.clone(), tx);
            rx
        };

        let result = tokio::time::timeout(timeout, rx).await;
        self.inner.lock().await.remove(&transaction_id);

        match result {
            Ok(Ok(envelope)) => Ok(envelope),
            Ok(Err(_)) | Err(_) => Err(Error::TransactionNotFound { transaction_id }),
        }
    }

    /// Delivers `envelope` to whoever is waiting on `transaction_id`, if
    /// anyone. Returns `true` if a waiter was found. Call sites that don't
    /// care about correlation (the common case, per "crawl don't lookup")
    /// simply never call this and every inbound message is processed
    /// uniformly regardless.
    pub async fn resolve(&self, transaction_id: &[u8], envelope: Envelope) -> bool {
        if let Some(tx) = self.inner.lock().await.remove(transaction_id) {
            tx.send(envelope).is_ok()
        } else {
            false
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
