//! marksync: real-time bookmark sync between concurrently open sessions.
//!
//! This library crate exposes all modules for use by the binaries and integration tests.

pub mod app;
pub mod channels;
pub mod database;
pub mod managers;
pub mod platform;
pub mod rpc_handler;
pub mod services;
pub mod store;
pub mod telemetry;
pub mod types;
