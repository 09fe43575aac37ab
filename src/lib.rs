//! Personal expense tracking: expenses filed under a category tree and
//! compared with day, week and month budgets.

#[macro_use]
extern crate rocket;

pub mod books;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod money;
pub mod periods;
pub mod repository;
pub mod web;

use std::sync::Once;

pub use error::{Error, Result};

static INIT_TRACING: Once = Once::new();

/// Installs the global tracing subscriber. `RUST_LOG` overrides the default
/// `bookkeeper=info` filter.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("bookkeeper=info"));
        if fmt().with_env_filter(filter).try_init().is_ok() {
            tracing::info!("bookkeeper tracing initialized");
        }
    });
}
