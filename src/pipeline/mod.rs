//! Query processing pipeline.
//!
//! Every polling cycle runs:
//! 1. `Inbox::connect()` and `list_unread()`: IMAP I/O
//! 2. `ResponseGenerator::generate()`: LLM reply, or the fixed fallback
//! 3. `ReplySender::send()`: SMTP delivery
//! 4. `mark_read()`: only after delivery succeeded
//!
//! `run_poll_loop` repeats the cycle on a fixed interval.

pub mod poller;
pub mod processor;
pub mod types;

pub use poller::{PollCycle, run_poll_loop};
pub use processor::QueryPipeline;
pub use types::{CycleReport, MessageOutcome};
