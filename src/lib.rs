//! # txn_engine
//!
//! A priority scheduling and retry engine for monetary transactions.
//!
//! Submitted transactions wait on a main queue ordered by amount (largest
//! first, oldest first among equals) and are processed by a fixed pool of
//! worker threads. Failed attempts move to a separate retry queue served by
//! its own, smaller pool after a delay, until a retry limit is reached.
//! Every status change is persisted through a [`core::Store`] and reported
//! through a [`core::Notifier`]; on startup, unfinished work is reloaded and
//! placed back on the right queue before new submissions are accepted.
//!
//! ## Lifecycle
//!
//! ```text
//! NEW ──▶ PROCESSING ──▶ COMPLETED
//!  ▲          │
//!  │          ├──▶ RETRY ──▶ PROCESSING ...
//!  │          └──▶ FAILED   (retry_count == max_retry)
//!  └── PROCESSING found on restart
//! ```
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use txn_engine::builders::EngineBuilder;
//! use txn_engine::config::EngineConfig;
//! use txn_engine::core::processor_fn;
//! use txn_engine::infra::JsonlStore;
//!
//! txn_engine::util::init_tracing();
//!
//! let engine = EngineBuilder::new(
//!     JsonlStore::open("./data", "transactions")?,
//!     processor_fn(|item, _ctx| (item.amount() <= 5_000.0).into()),
//! )
//! .with_config(EngineConfig::from_env()?)
//! .start()?;
//!
//! engine.submit(1_000.0)?;
//! engine.submit(500.0)?;
//!
//! let report = engine.shutdown();
//! ```
//!
//! ## Modules
//!
//! - [`core`]: items, queues, retry policy, the engine and its ports
//! - [`config`]: `EngineConfig` with JSON and environment loading
//! - [`infra`]: bundled stores (memory, JSON lines) and notifiers (log, channel, recording)
//! - [`builders`]: `EngineBuilder`
//! - [`util`]: clock helpers and tracing setup

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Items, queues, retry policy, worker pools and the engine.
pub mod core;
/// Engine configuration.
pub mod config;
/// Builders wiring ports and configuration into a running engine.
pub mod builders;
/// Bundled store and notifier adapters.
pub mod infra;
/// Shared utilities.
pub mod util;
