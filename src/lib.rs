//! CloudSpool - cloud print bridge for local spoolers
//!
//! This library keeps a local print subsystem and a remote cloud print
//! service in sync. It continuously reconciles the printers known to each
//! side, pulls print jobs from the cloud, submits them to the local spooler,
//! and mirrors job progress back to the cloud until the job reaches a
//! terminal state.
//!
//! # High-Level API
//!
//! The [`manager`] module provides the connector core. Callers supply the
//! two adapter implementations and a configuration:
//!
//! ```ignore
//! use std::sync::Arc;
//! use cloudspool::config::ConnectorConfig;
//! use cloudspool::manager::PrinterManager;
//!
//! let config = ConnectorConfig::default();
//! let manager = PrinterManager::start(cloud, spooler, &config).await?;
//!
//! // Counters for monitoring
//! let stats = manager.job_stats();
//!
//! // Graceful shutdown
//! manager.quit().await;
//! ```

pub mod cloud;
pub mod config;
pub mod limit;
pub mod manager;
pub mod printer;
pub mod spooler;

/// Version of the CloudSpool library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
