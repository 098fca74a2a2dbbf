//! CPU launch implementation
//!
//! With the `rayon` feature (default) work items are spread over the global
//! thread pool; otherwise they run as a plain sequential loop. Either way
//! the launch is synchronous: `for_each` returns only after the full range
//! completed.

use super::Launcher;

/// Identifies a CPU execution context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuDevice {
    id: usize,
}

impl CpuDevice {
    /// Create the default CPU device
    pub fn new() -> Self {
        Self { id: 0 }
    }

    /// Unique identifier for this device
    pub fn id(&self) -> usize {
        self.id
    }
}

/// CPU client for kernel dispatch
///
/// Holds the device handle and carries the launch facility. Update entry
/// points take the client as their execution-context argument.
#[derive(Debug, Clone, Default)]
pub struct CpuClient {
    device: CpuDevice,
}

impl CpuClient {
    /// Create a new CPU client
    pub fn new(device: CpuDevice) -> Self {
        Self { device }
    }

    /// The device this client operates on
    pub fn device(&self) -> &CpuDevice {
        &self.device
    }

    /// Wait for pending operations to complete. CPU launches are
    /// synchronous, so this is a no-op.
    pub fn synchronize(&self) {}
}

impl Launcher for CpuClient {
    #[cfg(feature = "rayon")]
    fn for_each<F>(&self, n: usize, f: F)
    where
        F: Fn(usize) + Send + Sync,
    {
        use rayon::prelude::*;
        (0..n).into_par_iter().for_each(f);
    }

    #[cfg(not(feature = "rayon"))]
    fn for_each<F>(&self, n: usize, f: F)
    where
        F: Fn(usize) + Send + Sync,
    {
        for i in 0..n {
            f(i);
        }
    }
}
