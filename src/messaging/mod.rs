// src/messaging/mod.rs
// =============================================================================
// This module is the plumbing that every other part of the crawler talks to.
//
// Submodules:
// - queue: the bounded job queue, split into a Dispatcher and a Backlog half
// - dispatcher: the Dispatcher trait plus the decorators that wrap it
//   (deduplication, validation, preprocessing)
// - fork: duplicates a Backlog so a second consumer sees every job
//
// Data flow:
//   dispatch -> PreProcessor -> Validator -> DeDuplicator -> queue
//            -> fork -> { swarm backlog, report backlog }
// =============================================================================

pub mod dispatcher;
pub mod fork;
pub mod queue;

pub use dispatcher::{DeDuplicator, Dispatcher, PreProcessor, Validator};
pub use fork::fork;
pub use queue::Backlog;
