//! offcache - adaptive offline asset cache
//!
//! Stages every critical asset of a deployment into a temporary
//! generation, promotes it to live only when complete, and serves
//! requests network-first with a caller-dependent timeout and cache
//! fallback.

pub mod arbiter;
pub mod cli;
pub mod clients;
pub mod config;
pub mod context;
pub mod error;
pub mod generation;
pub mod inject;
pub mod install;
pub mod manifest;
pub mod network;
pub mod store;
pub mod ui;
pub mod worker;

pub use error::{OffcacheError, OffcacheResult};
