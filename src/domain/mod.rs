//! Domain types for openmhz-player.
//!
//! - Call: one recorded transmission, identified by its upstream id
//! - System: a scanner feed

pub mod call;
pub mod system;

pub use call::{Call, CallsResponse};
pub use system::{find_system, System, SystemsResponse};

use serde::{Deserialize, Deserializer};

/// Read an explicit `null` the same as a missing field
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
