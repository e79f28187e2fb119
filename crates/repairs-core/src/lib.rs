//! repairs-core library.
//!
//! # Conventions
//!
//! - **Errors**: store and config code returns `anyhow::Result`; the ticket
//!   operations in [`tickets`] return [`error::RepairError`] so the transport
//!   layer can tell a lookup miss from a store failure.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod authorship;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod store;
pub mod tickets;
