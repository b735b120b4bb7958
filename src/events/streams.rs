use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, trace};

/// Events that carry a stable name, used for per-type statistics
pub trait NamedEvent {
    fn name(&self) -> &'static str;
}

/// Generic event stream for publish/subscribe notification
pub struct EventStream<T: Clone + Send + Sync + NamedEvent + 'static> {
    sender: broadcast::Sender<T>,
    buffer: Arc<RwLock<VecDeque<T>>>,
    buffer_size: usize,
    stats: Arc<RwLock<EventStreamStats>>,
}

/// Statistics for monitoring stream activity
#[derive(Debug, Clone, Default)]
pub struct EventStreamStats {
    pub events_published: u64,
    pub events_dropped: u64,
    pub type_counts: HashMap<String, u64>,
}

impl<T: Clone + Send + Sync + NamedEvent + 'static> EventStream<T> {
    /// Create a new event stream with specified capacity
    pub fn new(capacity: usize, buffer_size: usize) -> Self {
        info!(capacity, buffer_size, "Creating new event stream");
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            buffer: Arc::new(RwLock::new(VecDeque::with_capacity(buffer_size))),
            buffer_size,
            stats: Arc::new(RwLock::new(EventStreamStats::default())),
        }
    }

    /// Subscribe to the event stream
    pub fn subscribe(&self) -> Subscriber<T> {
        debug!("New subscriber registered to event stream");
        Subscriber {
            receiver: self.sender.subscribe(),
            buffer: Arc::clone(&self.buffer),
        }
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of receivers reached. Having no receivers is not an
    /// error: the event is buffered and counted as dropped.
    pub async fn publish(&self, event: T) -> usize {
        let name = event.name();
        let result = self.sender.send(event.clone());
        self.buffer_event(event).await;

        let mut stats = self.stats.write().await;
        *stats.type_counts.entry(name.to_string()).or_insert(0) += 1;
        match result {
            Ok(receivers) => {
                stats.events_published += 1;
                trace!(event = name, receivers, "Event published");
                receivers
            }
            Err(_) => {
                stats.events_dropped += 1;
                debug!(event = name, "No receivers for event, message buffered");
                0
            }
        }
    }

    /// Store an event in the buffer for replay
    async fn buffer_event(&self, event: T) {
        let mut buffer = self.buffer.write().await;
        buffer.push_back(event);

        while buffer.len() > self.buffer_size {
            buffer.pop_front();
        }
    }

    /// Get current statistics
    pub async fn get_stats(&self) -> EventStreamStats {
        self.stats.read().await.clone()
    }

    /// Reset statistics counters
    pub async fn reset_stats(&self) {
        *self.stats.write().await = EventStreamStats::default();
        debug!("Event stream statistics reset to defaults");
    }

    /// Get the replay buffer capacity
    pub fn capacity(&self) -> usize {
        self.buffer_size
    }

    /// Get the current number of subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Subscriber for receiving events from a stream
pub struct Subscriber<T: Clone + Send + 'static> {
    receiver: broadcast::Receiver<T>,
    buffer: Arc<RwLock<VecDeque<T>>>,
}

impl<T: Clone + Send + 'static> Subscriber<T> {
    /// Receive the next event
    pub async fn recv(&mut self) -> Result<T, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Receive an event if one is already queued
    pub fn try_recv(&mut self) -> Result<T, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Replay events from the buffer
    pub async fn replay_buffer(&self) -> Vec<T> {
        let buffer = self.buffer.read().await;
        buffer.iter().cloned().collect()
    }
}

impl<T: Clone + Send + Sync + NamedEvent + 'static> Clone for EventStream<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            buffer: Arc::clone(&self.buffer),
            buffer_size: self.buffer_size,
            stats: Arc::clone(&self.stats),
        }
    }
}
