//! Shared types for the oxcarbon agent: the validated [`config::Configuration`],
//! the hot-reload aware [`config::ConfigStore`], and the per-tick
//! [`types::MetricBatch`].

pub mod config;
pub mod error;
pub mod types;
