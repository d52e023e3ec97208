use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::FrameSink;
use crate::error::JanusError;
use crate::protocol::message_types::{ClientResponse, JanusRequest};
use crate::protocol::timeout_manager::{TimeoutTimer, TimerEvent};

/// Default window used when a transaction is built without an explicit timeout
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(12);

/// Lifecycle of one correlated request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    New,
    Started,
    Receiving,
    Ended,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionState::New => "new",
            TransactionState::Started => "started",
            TransactionState::Receiving => "receiving",
            TransactionState::Ended => "ended",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOptions {
    pub timeout: Duration,
    /// The server may send an interim `ack` before (or after) the final frame
    pub ack: bool,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TRANSACTION_TIMEOUT,
            ack: false,
        }
    }
}

/// Receives the outcomes of a transaction. All methods default to no-ops.
pub trait TransactionObserver: Send {
    fn on_sent(&mut self, _request: &JanusRequest) {}
    fn on_ack(&mut self, _response: &ClientResponse) {}
    fn on_response(&mut self, _response: &ClientResponse) {}
    fn on_error(&mut self, _error: &JanusError) {}
    fn on_end(&mut self) {}
}

enum Listener {
    Ack(Box<dyn FnMut(&ClientResponse) + Send>),
    Response(Box<dyn FnMut(&ClientResponse) + Send>),
    Error(Box<dyn FnMut(&JanusError) + Send>),
    End(Box<dyn FnMut() + Send>),
}

impl TransactionObserver for Listener {
    fn on_ack(&mut self, response: &ClientResponse) {
        if let Listener::Ack(listener) = self {
            listener(response);
        }
    }

    fn on_response(&mut self, response: &ClientResponse) {
        if let Listener::Response(listener) = self {
            listener(response);
        }
    }

    fn on_error(&mut self, error: &JanusError) {
        if let Listener::Error(listener) = self {
            listener(error);
        }
    }

    fn on_end(&mut self) {
        if let Listener::End(listener) = self {
            listener();
        }
    }
}

/// One outstanding request and the state machine resolving it.
///
/// The ack and the final frame are tracked as independent facts so the
/// outcome does not depend on which of the two arrives first:
///
/// * an `error` frame fails the transaction immediately;
/// * an `ack` (when one is expected) restarts the timeout, or ends the
///   transaction if the final frame was already seen (a "late ack");
/// * any other frame is the final response; the transaction stays open for
///   a pending ack, otherwise it ends.
///
/// The only cancellation path is the timeout.
pub struct Transaction {
    id: String,
    request: JanusRequest,
    state: TransactionState,
    timeout: Duration,
    expects_ack: bool,
    ack_received: bool,
    response_received: bool,
    late_ack: bool,
    created_at: Instant,
    timer: TimeoutTimer,
    observers: Vec<Box<dyn TransactionObserver>>,
}

impl Transaction {
    /// Create a transaction and stamp a fresh id into the request payload
    pub fn new(
        mut request: JanusRequest,
        options: TransactionOptions,
        timers: mpsc::UnboundedSender<TimerEvent>,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        request.set("transaction", id.clone());
        Self {
            id,
            request,
            state: TransactionState::New,
            timeout: options.timeout,
            expects_ack: options.ack,
            ack_received: false,
            response_received: false,
            late_ack: false,
            created_at: Instant::now(),
            timer: TimeoutTimer::new(timers),
            observers: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn request(&self) -> &JanusRequest {
        &self.request
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn expects_ack(&self) -> bool {
        self.expects_ack
    }

    pub fn ack_received(&self) -> bool {
        self.ack_received
    }

    pub fn response_received(&self) -> bool {
        self.response_received
    }

    pub fn is_late_ack(&self) -> bool {
        self.late_ack
    }

    pub fn is_ended(&self) -> bool {
        self.state == TransactionState::Ended
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn observe(&mut self, observer: Box<dyn TransactionObserver>) -> &mut Self {
        self.observers.push(observer);
        self
    }

    pub fn on_ack<F>(&mut self, listener: F) -> &mut Self
    where
        F: FnMut(&ClientResponse) + Send + 'static,
    {
        self.observe(Box::new(Listener::Ack(Box::new(listener))))
    }

    pub fn on_response<F>(&mut self, listener: F) -> &mut Self
    where
        F: FnMut(&ClientResponse) + Send + 'static,
    {
        self.observe(Box::new(Listener::Response(Box::new(listener))))
    }

    pub fn on_error<F>(&mut self, listener: F) -> &mut Self
    where
        F: FnMut(&JanusError) + Send + 'static,
    {
        self.observe(Box::new(Listener::Error(Box::new(listener))))
    }

    pub fn on_end<F>(&mut self, listener: F) -> &mut Self
    where
        F: FnMut() + Send + 'static,
    {
        self.observe(Box::new(Listener::End(Box::new(listener))))
    }

    /// Send the stamped request and open the timeout window.
    ///
    /// A send failure fails the transaction through the error observers;
    /// calling `start` twice is rejected without touching the running one.
    pub fn start(&mut self, sink: &dyn FrameSink) -> Result<(), JanusError> {
        if self.state != TransactionState::New {
            return Err(JanusError::InvalidTransactionState(self.state));
        }
        self.state = TransactionState::Started;
        self.start_timeout();

        let sent = self
            .request
            .to_json()
            .and_then(|text| sink.send_text(text));
        match sent {
            Ok(()) => {
                log::debug!("Sent transaction={} janus={:?}", self.id, self.request.verb());
                let request = self.request.clone();
                for observer in self.observers.iter_mut() {
                    observer.on_sent(&request);
                }
            }
            Err(error) => self.error(error),
        }
        Ok(())
    }

    /// Feed an inbound frame that carries this transaction's id
    pub fn deliver(&mut self, response: ClientResponse) {
        match self.state {
            TransactionState::Started | TransactionState::Receiving => {}
            TransactionState::Ended => {
                log::debug!(
                    "Ignored frame janus={:?} for ended transaction={}",
                    response.response_type(),
                    self.id
                );
                return;
            }
            TransactionState::New => {
                self.error(JanusError::InvalidTransactionState(self.state));
                return;
            }
        }
        self.state = TransactionState::Receiving;

        if response.is_error() {
            self.error(JanusError::from_response(response));
        } else if self.expects_ack && response.is_ack() {
            self.ack_received = true;
            for observer in self.observers.iter_mut() {
                observer.on_ack(&response);
            }
            if self.response_received {
                self.late_ack = true;
                self.end();
            } else {
                self.start_timeout();
            }
        } else {
            self.response_received = true;
            let response = response.with_acknowledged(self.ack_received);
            for observer in self.observers.iter_mut() {
                observer.on_response(&response);
            }
            if self.expects_ack && !self.ack_received {
                self.start_timeout();
            } else {
                self.end();
            }
        }
    }

    /// Handle an expiry from the timer; stale generations are ignored
    pub fn on_timeout(&mut self, generation: u64) {
        if !self.timer.fire(generation) || self.is_ended() {
            return;
        }
        self.error(JanusError::TransactionTimeout {
            transaction_id: self.id.clone(),
            timeout: self.timeout,
        });
    }

    /// Terminal transition; idempotent
    pub fn end(&mut self) {
        self.timer.cancel();
        if self.state != TransactionState::Ended {
            self.state = TransactionState::Ended;
            log::debug!("Ended transaction={}", self.id);
            for observer in self.observers.iter_mut() {
                observer.on_end();
            }
        }
    }

    /// Fail a transaction that never made it onto the wire
    pub(crate) fn fail(&mut self, error: JanusError) {
        self.error(error);
    }

    fn error(&mut self, error: JanusError) {
        if self.is_ended() {
            log::debug!("Dropped error for ended transaction={}: {}", self.id, error);
            return;
        }
        self.end();
        for observer in self.observers.iter_mut() {
            observer.on_error(&error);
        }
    }

    fn start_timeout(&mut self) {
        let id = self.id.clone();
        self.timer
            .arm(self.timeout, move |generation| TimerEvent::Transaction { id, generation });
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("expects_ack", &self.expects_ack)
            .field("ack_received", &self.ack_received)
            .field("response_received", &self.response_received)
            .field("late_ack", &self.late_ack)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransportCommand;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn transaction(ack: bool) -> (Transaction, mpsc::UnboundedReceiver<TimerEvent>) {
        let (timers, timer_rx) = mpsc::unbounded_channel();
        let options = TransactionOptions {
            timeout: Duration::from_millis(100),
            ack,
        };
        (Transaction::new(JanusRequest::new("message"), options, timers), timer_rx)
    }

    fn frame(tx: &Transaction, janus: &str) -> ClientResponse {
        ClientResponse::new(tx.request().clone(), json!({"janus": janus, "transaction": tx.id()}))
    }

    #[tokio::test]
    async fn test_id_is_stamped_into_request() {
        let (tx, _timers) = transaction(false);
        assert_eq!(tx.request().transaction(), Some(tx.id()));
        assert_eq!(tx.state(), TransactionState::New);
    }

    #[tokio::test]
    async fn test_start_sends_and_rejects_restart() {
        let (mut tx, _timers) = transaction(false);
        let (sink, mut sent) = mpsc::unbounded_channel();

        tx.start(&sink).unwrap();
        assert_eq!(tx.state(), TransactionState::Started);
        match sent.try_recv().unwrap() {
            TransportCommand::Send(text) => assert!(text.contains(tx.id())),
            other => panic!("Expected Send, got {:?}", other),
        }

        let again = tx.start(&sink);
        assert!(matches!(again, Err(JanusError::InvalidTransactionState(TransactionState::Started))));
        assert_eq!(tx.state(), TransactionState::Started);
    }

    #[tokio::test]
    async fn test_ack_on_non_ack_transaction_is_final() {
        let (mut tx, _timers) = transaction(false);
        let (sink, _sent) = mpsc::unbounded_channel();
        let responses = Arc::new(AtomicUsize::new(0));
        let counter = responses.clone();
        tx.on_response(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tx.start(&sink).unwrap();
        let ack = frame(&tx, "ack");
        tx.deliver(ack);

        assert!(tx.is_ended());
        assert!(!tx.ack_received());
        assert_eq!(responses.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_send_failure_fails_transaction() {
        let (mut tx, _timers) = transaction(false);
        let (sink, sent) = mpsc::unbounded_channel::<TransportCommand>();
        drop(sent);
        let errors = Arc::new(AtomicUsize::new(0));
        let counter = errors.clone();
        tx.on_error(move |error| {
            assert!(matches!(error, JanusError::Transport(_)));
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tx.start(&sink).unwrap();
        assert!(tx.is_ended());
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_frame_before_start_is_invalid() {
        let (mut tx, _timers) = transaction(false);
        let errors = Arc::new(AtomicUsize::new(0));
        let counter = errors.clone();
        tx.on_error(move |error| {
            assert!(matches!(error, JanusError::InvalidTransactionState(TransactionState::New)));
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let success = frame(&tx, "success");
        tx.deliver(success);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert!(tx.is_ended());
    }

    #[derive(Default)]
    struct Outcomes {
        responses: Arc<AtomicUsize>,
        errors: Arc<AtomicUsize>,
        ends: Arc<AtomicUsize>,
    }

    /// Start a transaction and feed it `frames` in order
    fn drive(ack: bool, frames: &[&str]) -> (Transaction, Outcomes) {
        let (mut tx, _timers) = transaction(ack);
        let (sink, _sent) = mpsc::unbounded_channel::<TransportCommand>();
        let outcomes = Outcomes::default();

        let responses = outcomes.responses.clone();
        tx.on_response(move |_| {
            responses.fetch_add(1, Ordering::SeqCst);
        });
        let errors = outcomes.errors.clone();
        tx.on_error(move |_| {
            errors.fetch_add(1, Ordering::SeqCst);
        });
        let ends = outcomes.ends.clone();
        tx.on_end(move || {
            ends.fetch_add(1, Ordering::SeqCst);
        });

        tx.start(&sink).unwrap();
        for janus in frames {
            let response = frame(&tx, janus);
            tx.deliver(response);
        }
        (tx, outcomes)
    }

    #[tokio::test]
    async fn test_every_ordering_ends_exactly_once() {
        // (expects ack, frames, late ack, responses, errors)
        let cases: [(bool, &[&str], bool, usize, usize); 6] = [
            (true, &["ack", "success"], false, 1, 0),
            (true, &["success", "ack"], true, 1, 0),
            (true, &["error", "ack"], false, 0, 1),
            (false, &["ack", "success"], false, 1, 0),
            (false, &["success", "ack"], false, 1, 0),
            (false, &["error", "ack"], false, 0, 1),
        ];

        for (ack, frames, late_ack, responses, errors) in cases {
            let (mut tx, outcomes) = drive(ack, frames);
            let case = format!("ack={} frames={:?}", ack, frames);

            assert!(tx.is_ended(), "{}", case);
            assert_eq!(tx.is_late_ack(), late_ack, "{}", case);
            assert_eq!(outcomes.responses.load(Ordering::SeqCst), responses, "{}", case);
            assert_eq!(outcomes.errors.load(Ordering::SeqCst), errors, "{}", case);
            assert_eq!(outcomes.ends.load(Ordering::SeqCst), 1, "{}", case);

            // ending again, or a timer that already lost the race, fires nothing
            tx.end();
            let generation = tx.timer.generation();
            tx.on_timeout(generation);
            assert_eq!(outcomes.ends.load(Ordering::SeqCst), 1, "{}", case);
            assert_eq!(outcomes.errors.load(Ordering::SeqCst), errors, "{}", case);
        }
    }

    #[tokio::test]
    async fn test_ack_then_final_is_not_late() {
        let (tx, _) = drive(true, &["ack", "success"]);
        assert!(tx.ack_received());
        assert!(tx.response_received());
        assert!(!tx.is_late_ack());
    }

    #[tokio::test]
    async fn test_final_without_ack_keeps_waiting() {
        let (tx, outcomes) = drive(true, &["success"]);
        assert_eq!(tx.state(), TransactionState::Receiving);
        assert!(!tx.is_late_ack());
        assert_eq!(outcomes.responses.load(Ordering::SeqCst), 1);
        assert_eq!(outcomes.ends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_generation_is_ignored() {
        let (mut tx, mut timers) = transaction(true);
        let (sink, _sent) = mpsc::unbounded_channel();
        tx.start(&sink).unwrap();

        let ack = frame(&tx, "ack");
        tx.deliver(ack);

        // the first arm was superseded by the ack restart
        tx.on_timeout(1);
        assert!(!tx.is_ended());

        match timers.recv().await.unwrap() {
            TimerEvent::Transaction { generation, .. } => tx.on_timeout(generation),
            other => panic!("Expected transaction timer, got {:?}", other),
        }
        assert!(tx.is_ended());
    }
}
