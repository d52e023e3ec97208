use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::core::FrameSink;
use crate::error::JanusError;
use crate::protocol::message_types::ClientResponse;
use crate::protocol::transaction::Transaction;

/// Configuration for the correlation table
#[derive(Debug, Clone)]
pub struct TableConfig {
    pub max_pending_transactions: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            max_pending_transactions: 1000,
        }
    }
}

/// Statistics about pending transactions
#[derive(Debug, Clone)]
pub struct TableStatistics {
    pub pending_count: usize,
    pub oldest_transaction: Option<PendingInfo>,
}

/// Information about a specific pending transaction
#[derive(Debug, Clone)]
pub struct PendingInfo {
    pub id: String,
    pub age: Duration,
}

/// Result of routing a frame by transaction id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Delivered; the transaction is still waiting for more frames
    Pending,
    /// Delivered and the transaction ended, its entry is gone
    Ended,
    /// No such transaction
    Unknown,
}

/// Arena of outstanding transactions keyed by transaction id.
///
/// Entries are removed in exactly one place: right after the operation that
/// drove the transaction into its ended state.
#[derive(Debug)]
pub struct CorrelationTable {
    transactions: HashMap<String, Transaction>,
    config: TableConfig,
}

impl CorrelationTable {
    pub fn new(config: TableConfig) -> Self {
        Self {
            transactions: HashMap::new(),
            config,
        }
    }

    /// Register a transaction that has not been started yet.
    /// A refused transaction is failed through its own observers as well.
    pub fn register(&mut self, mut transaction: Transaction) -> Result<String, JanusError> {
        let id = transaction.id().to_string();
        let refused = if self.transactions.len() >= self.config.max_pending_transactions {
            Some(JanusError::Configuration(format!(
                "too many pending transactions: maximum {} allowed",
                self.config.max_pending_transactions
            )))
        } else if self.transactions.contains_key(&id) {
            Some(JanusError::UnexpectedResponse(format!(
                "transaction already registered: {}",
                id
            )))
        } else {
            None
        };
        if let Some(error) = refused {
            transaction.fail(error.clone());
            return Err(error);
        }
        self.transactions.insert(id.clone(), transaction);
        Ok(id)
    }

    /// Start a registered transaction
    pub fn start(&mut self, id: &str, sink: &dyn FrameSink) -> Result<Delivery, JanusError> {
        let Some(transaction) = self.transactions.get_mut(id) else {
            return Ok(Delivery::Unknown);
        };
        let started = transaction.start(sink);
        let delivery = self.reap(id);
        started.map(|_| delivery)
    }

    /// Route a final or interim frame to its transaction
    pub fn deliver(&mut self, id: &str, frame: Value) -> Delivery {
        let Some(transaction) = self.transactions.get_mut(id) else {
            return Delivery::Unknown;
        };
        let response = ClientResponse::new(transaction.request().clone(), frame);
        transaction.deliver(response);
        self.reap(id)
    }

    /// Route a timer expiry to its transaction
    pub fn timeout(&mut self, id: &str, generation: u64) -> Delivery {
        let Some(transaction) = self.transactions.get_mut(id) else {
            return Delivery::Unknown;
        };
        transaction.on_timeout(generation);
        self.reap(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.transactions.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.transactions.get(id)
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.transactions.keys().cloned().collect()
    }

    pub fn statistics(&self) -> TableStatistics {
        let oldest_transaction = self
            .transactions
            .values()
            .map(|t| PendingInfo {
                id: t.id().to_string(),
                age: t.age(),
            })
            .max_by_key(|info| info.age);

        TableStatistics {
            pending_count: self.transactions.len(),
            oldest_transaction,
        }
    }

    fn reap(&mut self, id: &str) -> Delivery {
        let ended = self
            .transactions
            .get(id)
            .map(Transaction::is_ended)
            .unwrap_or(true);
        if ended {
            self.transactions.remove(id);
            Delivery::Ended
        } else {
            Delivery::Pending
        }
    }
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new(TableConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransportCommand;
    use crate::protocol::message_types::JanusRequest;
    use crate::protocol::transaction::TransactionOptions;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn options(ack: bool) -> TransactionOptions {
        TransactionOptions {
            timeout: Duration::from_millis(200),
            ack,
        }
    }

    #[tokio::test]
    async fn test_entry_removed_when_transaction_ends() {
        let (timers, _timer_rx) = mpsc::unbounded_channel();
        let (sink, _sent) = mpsc::unbounded_channel::<TransportCommand>();
        let mut table = CorrelationTable::default();

        let id = table
            .register(Transaction::new(JanusRequest::new("info"), options(false), timers))
            .unwrap();
        assert_eq!(table.start(&id, &sink).unwrap(), Delivery::Pending);
        assert!(table.contains(&id));

        let delivery = table.deliver(&id, json!({"janus": "server_info", "transaction": id}));
        assert_eq!(delivery, Delivery::Ended);
        assert!(!table.contains(&id));
        assert!(table.is_empty());
        assert_eq!(table.deliver(&id, json!({"janus": "success"})), Delivery::Unknown);
    }

    #[tokio::test]
    async fn test_ack_keeps_entry_pending() {
        let (timers, _timer_rx) = mpsc::unbounded_channel();
        let (sink, _sent) = mpsc::unbounded_channel::<TransportCommand>();
        let mut table = CorrelationTable::default();

        let id = table
            .register(Transaction::new(JanusRequest::new("message"), options(true), timers))
            .unwrap();
        table.start(&id, &sink).unwrap();

        assert_eq!(table.deliver(&id, json!({"janus": "ack"})), Delivery::Pending);
        assert_eq!(table.get(&id).map(Transaction::ack_received), Some(true));
        assert_eq!(table.deliver(&id, json!({"janus": "event"})), Delivery::Ended);
        assert!(!table.contains(&id));
    }

    #[tokio::test]
    async fn test_start_failure_reaps_entry() {
        let (timers, _timer_rx) = mpsc::unbounded_channel();
        let (sink, sent) = mpsc::unbounded_channel::<TransportCommand>();
        drop(sent);
        let mut table = CorrelationTable::default();

        let id = table
            .register(Transaction::new(JanusRequest::new("info"), options(false), timers))
            .unwrap();
        assert_eq!(table.start(&id, &sink).unwrap(), Delivery::Ended);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_pending_limit() {
        let (timers, _timer_rx) = mpsc::unbounded_channel();
        let mut table = CorrelationTable::new(TableConfig {
            max_pending_transactions: 1,
        });

        table
            .register(Transaction::new(JanusRequest::new("info"), options(false), timers.clone()))
            .unwrap();
        let second = table.register(Transaction::new(JanusRequest::new("info"), options(false), timers));
        assert!(second.is_err());
        assert_eq!(table.statistics().pending_count, 1);
        assert!(table.statistics().oldest_transaction.is_some());
    }
}
