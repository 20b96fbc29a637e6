//! Poll → dedup → bounded queue → sequential playback.
//!
//! This module contains:
//! - SeenLedger: call ids observed this run
//! - queue: fixed-capacity, drop-oldest call queue
//! - CallFetcher: producer loop
//! - CallPlayer: consumer loop
//! - Shutdown: cancellation signal plus grace period
//! - Pipeline: wires the pieces together

pub mod fetcher;
pub mod ledger;
pub mod pipeline;
pub mod player;
pub mod queue;
pub mod shutdown;

pub use fetcher::{CallFetcher, CycleReport, FetchMode};
pub use ledger::SeenLedger;
pub use pipeline::{Pipeline, PipelineOptions};
pub use player::CallPlayer;
pub use queue::{bounded, CallReceiver, CallSender, EnqueueOutcome, QueueError};
pub use shutdown::Shutdown;
