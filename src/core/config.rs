//! Engine configuration.
//!
//! Passed explicitly into the components that need it so that runs are
//! independently testable; there is no process-global state.

/// Configuration shared by the walker and fingerprint engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Size of the worker pool used for I/O-bound work (stat calls,
    /// chunked hashing). Bounds the number of concurrently open files.
    pub workers: usize,
    /// Byte-for-byte verification of each duplicate against its group's
    /// canonical member before a delete operation is finalized. Guards
    /// against a hash collision destroying a unique file.
    pub verify_bytes: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: suggested_workers(),
            verify_bytes: true,
        }
    }
}

/// Heuristic pool size for I/O-bound work: 4x the CPU count, clamped to
/// 4..=64 so very large machines do not exhaust file handles.
pub fn suggested_workers() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    (cpus * 4).clamp(4, 64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggested_workers_stays_within_budget() {
        let n = suggested_workers();
        assert!((4..=64).contains(&n));
    }

    #[test]
    fn default_config_verifies_bytes() {
        assert!(EngineConfig::default().verify_bytes);
    }
}
