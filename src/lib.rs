//! # anno-fetch
//!
//! Automation over an annotation-platform API: retrieve annotation export
//! archives reliably, and weed out near-duplicate images before they are
//! sent for labeling.
//!
//! ## Core Guarantees
//! - **No server-side litter** - an export job the manager creates is always
//!   deleted, even when retrieval fails, and a cleanup failure never masks
//!   the failure that preceded it
//! - **No partial extraction** - annotation files land in the destination
//!   only after the archive downloaded completely
//!
//! ## Architecture
//! The library is split into a core engine (UI-agnostic) and presentation
//! layers:
//! - `core` - export lifecycle manager and duplicate detector
//! - `events` - event-driven progress reporting (GUI-ready)
//! - `config` - remote API configuration
//! - `error` - error taxonomy
//! - `cli` - command-line interface

pub mod config;
pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{AnnoFetchError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point (CLI or GUI).
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default tracing subscriber");
}
