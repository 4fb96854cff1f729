//! # Event Bus
//!
//! Broadcasts sync lifecycle events to any number of listeners using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: [`CoreEvent`] wraps the per-domain enums [`SyncEvent`]
//!   (scan and upload batches) and [`QueueEvent`] (bulk status changes)
//! - **EventBus**: cloneable publisher handle
//! - **EventStream**: receiver wrapper with an optional filter
//!
//! ```text
//! ┌──────────────────┐    emit     ┌───────────┐   subscribe   ┌────────────┐
//! │ SyncCoordinator  ├────────────>│ EventBus  ├──────────────>│ UI / host  │
//! └──────────────────┘             └───────────┘               └────────────┘
//! ```
//!
//! Per-file upload progress does not go through the bus. It is delivered on
//! the channel handed to the upload call, so slow bus subscribers never see
//! a flood of progress ticks.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(32);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Sync(SyncEvent::ScanCompleted {
//!     repo: "dcim".to_string(),
//!     discovered: 3,
//!     queued: 2,
//! }))
//! .ok();
//!
//! let event = rx.recv().await.unwrap();
//! assert_eq!(event.description(), "Media scan completed");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - `RecvError::Lagged(n)`: the subscriber fell behind and missed `n` events.
//!   It can keep receiving.
//! - `RecvError::Closed`: every sender is gone.
//!
//! Publishers treat "no subscribers" as normal and call `.ok()` on
//! [`EventBus::emit`].

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the bus
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Scan and upload batch lifecycle
    Sync(SyncEvent),
    /// Bulk changes to queued records
    Queue(QueueEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Queue(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::BatchFailed { .. }) => EventSeverity::Error,
            CoreEvent::Queue(QueueEvent::Escalated { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::FileCompleted { success: false, .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Sync(SyncEvent::BatchCompleted { .. })
            | CoreEvent::Sync(SyncEvent::ScanCompleted { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Sync Events
// ============================================================================

/// Scan and upload batch lifecycle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// The media store was scanned and new files were queued.
    ScanCompleted {
        repo: String,
        /// Files returned by the scanner
        discovered: u64,
        /// Files that were new and got a pending record
        queued: u64,
    },
    /// An upload batch picked its records.
    BatchStarted {
        batch_id: String,
        repo: String,
        /// Number of records selected for the batch
        files: u64,
    },
    /// One file in a batch reached a terminal outcome for this attempt.
    FileCompleted {
        batch_id: String,
        record_id: i64,
        file_name: String,
        success: bool,
        error: Option<String>,
    },
    /// The batch processed every selected record.
    BatchCompleted {
        batch_id: String,
        attempted: u64,
        succeeded: u64,
        failed: u64,
        duration_ms: u64,
    },
    /// The batch stopped because the store or runtime failed.
    BatchFailed { batch_id: String, message: String },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::ScanCompleted { .. } => "Media scan completed",
            SyncEvent::BatchStarted { .. } => "Upload batch started",
            SyncEvent::FileCompleted { success: true, .. } => "File uploaded",
            SyncEvent::FileCompleted { success: false, .. } => "File upload failed",
            SyncEvent::BatchCompleted { .. } => "Upload batch completed",
            SyncEvent::BatchFailed { .. } => "Upload batch failed",
        }
    }
}

// ============================================================================
// Queue Events
// ============================================================================

/// Bulk changes to the upload queue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum QueueEvent {
    /// Records were moved back to pending.
    Requeued {
        /// Status the records left
        from: String,
        count: u64,
    },
    /// A record exhausted its retries and now needs a manual reset.
    Escalated { record_id: i64, retry_count: u32 },
    /// Records were deleted from the queue.
    Removed { count: u64 },
}

impl QueueEvent {
    fn description(&self) -> &str {
        match self {
            QueueEvent::Requeued { .. } => "Records re-queued",
            QueueEvent::Escalated { .. } => "Record gave up after repeated failures",
            QueueEvent::Removed { .. } => "Records removed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Cloneable handle to a broadcast channel of [`CoreEvent`]s.
///
/// Every clone publishes into the same channel. Subscribers only see events
/// emitted after they subscribed.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus.
    ///
    /// A subscriber that falls more than `capacity` events behind receives
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error when nobody is listening.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional filter.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(16);
/// let queue_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Queue(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned from now on.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n`
    /// events and `RecvError::Closed` once all senders are dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv); `None` when nothing is
    /// buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
