pub mod message_types;
pub mod timeout_manager;
pub mod transaction;
pub mod correlation_table;

pub use message_types::{ClientResponse, InboundFrame, JanusEventKind, JanusId, JanusRequest, PluginResponse};
pub use timeout_manager::{TimeoutTimer, TimerEvent};
pub use transaction::{Transaction, TransactionObserver, TransactionOptions, TransactionState, DEFAULT_TRANSACTION_TIMEOUT};
pub use correlation_table::{CorrelationTable, Delivery, PendingInfo, TableConfig, TableStatistics};
