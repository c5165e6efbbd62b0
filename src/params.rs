//! System parameter cache: typed, concurrently readable access to the
//! network-wide tunables kept in storage.

pub mod cache;
pub mod keys;

pub use cache::{ParameterCache, ParameterSnapshot};
