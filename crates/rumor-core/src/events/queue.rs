//! Event Queue
//!
//! Lifecycle events accumulate here until a collaborator drains them.
//! Subscribers additionally receive a copy of each event over a channel as
//! it is published.

use rumor_events::{generate_event_id, RumorEvent, RumorEventKind, SimTimestamp};
use std::sync::mpsc::{channel, Receiver, Sender};

/// Pending events plus live subscribers.
#[derive(Debug)]
pub struct EventQueue {
    events: Vec<RumorEvent>,
    subscribers: Vec<Sender<RumorEvent>>,
    next_event_id: u64,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            subscribers: Vec::new(),
            next_event_id: 1,
        }
    }

    /// Stamps the event with the next id, queues it, and fans it out.
    pub fn publish(&mut self, timestamp: SimTimestamp, kind: RumorEventKind) -> &RumorEvent {
        let event = RumorEvent::new(generate_event_id(self.next_event_id), timestamp, kind);
        self.next_event_id += 1;

        // Receivers that hung up are dropped
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());

        self.events.push(event);
        &self.events[self.events.len() - 1]
    }

    /// New channel that receives every event published from now on.
    pub fn subscribe(&mut self) -> Receiver<RumorEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn drain(&mut self) -> Vec<RumorEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn pending(&self) -> &[RumorEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Total events published so far
    pub fn published(&self) -> u64 {
        self.next_event_id - 1
    }
}
