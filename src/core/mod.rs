//! Engine internals: snapshotting, identity, grouping, planning, applying.

pub mod config;
pub mod fingerprint;
pub mod grouper;
pub mod metadata;
pub mod naming;
pub mod plan;
pub mod walker;
