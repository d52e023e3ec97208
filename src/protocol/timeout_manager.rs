use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::protocol::message_types::JanusId;

/// Expiry notification posted back into the owning event loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    Transaction { id: String, generation: u64 },
    Idle { generation: u64 },
    Heartbeat { session_id: JanusId, generation: u64 },
}

/// A single re-armable timer.
///
/// Arming always aborts the previously armed sleep. Every arm bumps a
/// generation counter that travels with the expiry event, so an event that
/// was already queued before a re-arm or cancel is recognized as stale by
/// [`TimeoutTimer::fire`] and ignored.
#[derive(Debug)]
pub struct TimeoutTimer {
    events: mpsc::UnboundedSender<TimerEvent>,
    task: Option<JoinHandle<()>>,
    generation: u64,
}

impl TimeoutTimer {
    pub fn new(events: mpsc::UnboundedSender<TimerEvent>) -> Self {
        Self {
            events,
            task: None,
            generation: 0,
        }
    }

    /// Arm (or re-arm) the timer; `make_event` receives the new generation
    pub fn arm<F>(&mut self, delay: Duration, make_event: F) -> u64
    where
        F: FnOnce(u64) -> TimerEvent,
    {
        self.cancel();
        self.generation += 1;
        let event = make_event(self.generation);
        let events = self.events.clone();
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(event);
        }));
        self.generation
    }

    /// Cancel the pending expiry, returns whether one was armed
    pub fn cancel(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                // Anything already queued for this generation is now stale
                self.generation += 1;
                true
            }
            None => false,
        }
    }

    /// Consume an expiry event; false when it belongs to a superseded arm
    pub fn fire(&mut self, generation: u64) -> bool {
        if self.task.is_some() && generation == self.generation {
            self.task = None;
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self) -> bool {
        self.task.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for TimeoutTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
