//! Event publishing: an in-process queue collaborators drain or subscribe
//! to, and an append-only JSONL logger.

pub mod logger;
pub mod queue;

pub use logger::EventLogger;
pub use queue::EventQueue;
