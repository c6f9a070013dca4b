//! The oxcarbon agent: a fixed-cadence loop that collects plugin samples,
//! pushes them to a Carbon line-protocol endpoint and hot-reloads its
//! configuration between ticks.

pub mod cli;
pub mod error;
pub mod scheduler;
pub mod transmitter;
