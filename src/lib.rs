//! # Media Sweeper
//!
//! A plan/apply engine for cleaning up media trees: duplicate removal,
//! junk-file and folder cleanup, sequential renaming, and date/location
//! sorting.
//!
//! ## Core Philosophy
//! - **Plan first** - Every command produces an inspectable plan with
//!   zero side effects; mutation happens only on an explicit apply
//! - **Re-check before acting** - Each operation re-validates its
//!   preconditions at apply time, so a stale plan degrades to skips
//!   instead of damage
//! - **Never lose the original** - The canonical member of a duplicate
//!   group is never touched
//!
//! ## Architecture
//! The library is split into a core engine (UI-agnostic) and a
//! presentation layer:
//! - `core` - Walking, fingerprinting, grouping, planning, applying
//! - `events` - Event-driven progress reporting
//! - `error` - Error types

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{Result, SweepError};

/// Initialize tracing for the library
///
/// This should be called by the application entry point.
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default tracing subscriber");
}
