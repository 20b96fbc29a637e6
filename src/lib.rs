//! openmhz-player - play new scanner calls from an OpenMHz feed
//!
//! Polls one OpenMHz system for its recent calls, skips anything already
//! seen, and plays the new ones one after another.
//!
//! # Architecture
//!
//! ```text
//! OpenMHz (via FlareSolverr) → CallFetcher → bounded queue → CallPlayer → mpg123
//!                                   ↓
//!                              SeenLedger
//! ```
//!
//! - The first fetch only records a baseline; calls already listed at startup
//!   are never played
//! - The queue has a fixed capacity and drops its oldest entry when full
//! - SIGINT/SIGTERM cancel both loops, with a short grace period for in-flight work
//!
//! # Modules
//!
//! - `adapters`: External systems (FlareSolverr, OpenMHz API, media binaries)
//! - `core`: Ledger, queue, fetcher, player, shutdown
//! - `domain`: Data structures (Call, System)
//! - `config`: Layered configuration
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Pick a system interactively
//! openmhz-player
//!
//! # Skip the prompt
//! openmhz-player --shortname metrofire --debug
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use crate::adapters::{AudioPlayer, CallSource};
pub use crate::core::{bounded, CallFetcher, CallPlayer, EnqueueOutcome, Pipeline, SeenLedger, Shutdown};
pub use crate::domain::{Call, System};
