//! waypost - a self-hosted URL redirection (go links) service
//!
//! Authenticated owners register short paths that resolve to target URLs;
//! anonymous or authenticated clients dereference a short path and are
//! redirected. Path resolution runs through a two-tier cache-aside layer
//! in front of the SQLite store.

pub mod auth;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod redirect;
pub mod server;
pub mod telemetry;
