//! Adapter interfaces for external systems.
//!
//! The pipeline only sees two seams: a [`CallSource`] that lists systems and
//! calls, and an [`AudioPlayer`] that plays one call to completion. Concrete
//! adapters reach OpenMHz through a FlareSolverr proxy and play audio through
//! ffmpeg/ffprobe/mpg123.

pub mod flaresolverr;
pub mod media;
pub mod openmhz;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{Call, System};

pub use flaresolverr::{FlareSolverrClient, ProxyError};
pub use media::{MediaError, MediaPlayer};
pub use openmhz::OpenMhzClient;

/// Source of systems and their recorded calls
#[async_trait]
pub trait CallSource: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// List every system the source knows about
    async fn list_systems(&self) -> Result<Vec<System>>;

    /// Current call listing for one system, in the order the source returns it
    async fn list_calls(&self, short_name: &str) -> Result<Vec<Call>>;

    /// Check the source is reachable
    async fn health_check(&self) -> Result<()>;
}

/// Plays a call's audio, returning once playback has finished
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Download, convert and play one call.
    ///
    /// Any temporary files are removed before this returns, on success or failure.
    async fn play(&self, call: &Call) -> Result<()>;
}
