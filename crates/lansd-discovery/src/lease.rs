//! Reference-counted multicast lease
//!
//! Advertising and discovery both need the network interface in a
//! multicast-capable mode. On some platforms that mode is power-costly
//! and must be held for as long as any operation needs it, and not a
//! moment longer. [`MulticastLease`] counts holders and toggles the
//! underlying mode on the 0→1 and 1→0 transitions only.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Platform hook toggled when the lease transitions between idle and held.
///
/// The default implementation is a no-op for platforms where multicast
/// traffic needs no explicit opt-in.
pub trait MulticastMode: Send + Sync + 'static {
    fn enable(&self);
    fn disable(&self);
}

struct NoopMode;

impl MulticastMode for NoopMode {
    fn enable(&self) {}
    fn disable(&self) {}
}

struct LeaseInner {
    count: Mutex<u64>,
    mode: Box<dyn MulticastMode>,
}

/// Reference-counted handle to the multicast network mode.
///
/// Cheap to clone; all clones share one counter. Acquisition returns an
/// RAII [`LeaseGuard`] so every acquisition is matched by exactly one
/// release.
#[derive(Clone)]
pub struct MulticastLease {
    inner: Arc<LeaseInner>,
}

impl MulticastLease {
    /// Creates a lease with a no-op platform mode.
    pub fn new() -> Self {
        Self::with_mode(NoopMode)
    }

    /// Creates a lease toggling `mode` on idle/held transitions.
    pub fn with_mode(mode: impl MulticastMode) -> Self {
        Self {
            inner: Arc::new(LeaseInner {
                count: Mutex::new(0),
                mode: Box::new(mode),
            }),
        }
    }

    /// Acquires the lease. The underlying mode is enabled on the first
    /// acquisition and stays enabled while any guard is alive.
    pub fn acquire(&self) -> LeaseGuard {
        let mut count = self.inner.count.lock();
        *count += 1;
        if *count == 1 {
            self.inner.mode.enable();
            debug!("multicast mode enabled");
        }
        LeaseGuard {
            inner: self.inner.clone(),
        }
    }

    /// Current number of holders.
    pub fn holders(&self) -> u64 {
        *self.inner.count.lock()
    }
}

impl Default for MulticastLease {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases one acquisition on drop.
pub struct LeaseGuard {
    inner: Arc<LeaseInner>,
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        let mut count = self.inner.count.lock();
        *count -= 1;
        if *count == 0 {
            self.inner.mode.disable();
            debug!("multicast mode disabled");
        }
    }
}
