// src/logging.rs

//! Reloadable `tracing` subscriber setup for embedding binaries.
//!
//! Wiring a CLI and the concrete `Agent`/`TmClient`/`TopoServer`
//! collaborators is the surrounding binary's job; this crate only exposes
//! the subscriber construction so embedders get the same reload-capable
//! logging the rest of this codebase uses, without re-deriving it.

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::{prelude::*, reload};

/// A handle that lets the embedding binary change the active log filter at
/// runtime, e.g. in response to a SIGHUP or an admin RPC.
pub type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

/// Initializes the global `tracing` subscriber with a reloadable
/// `EnvFilter`, honoring `RUST_LOG` over `default_log_level` when set.
///
/// Must be called at most once per process.
pub fn init(default_log_level: &str) -> ReloadHandle {
    let initial = std::env::var("RUST_LOG").unwrap_or_else(|_| default_log_level.to_string());
    let (filter, reload_handle) = reload::Layer::new(EnvFilter::new(initial));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact().with_ansi(true))
        .init();

    reload_handle
}
