//! Advertisement manager
//!
//! Owns at most one active registration with the service directory.
//! Starting a new advertisement tears the previous one down first, and
//! success is reported only once the directory confirms the registration
//! asynchronously.

use crate::directory::{RegistrationEvent, RegistrationHandle, ServiceDirectory};
use crate::error::{DiscoveryError, Result};
use crate::lease::{LeaseGuard, MulticastLease};
use lansd_core::ServiceDescriptor;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

struct ActiveRegistration {
    generation: u64,
    handle: RegistrationHandle,
    _lease: LeaseGuard,
}

/// Advertises this process as a named, typed service on the local network.
pub struct Advertiser<D: ServiceDirectory> {
    directory: Arc<D>,
    lease: MulticastLease,
    active: Mutex<Option<ActiveRegistration>>,
    next_generation: AtomicU64,
}

impl<D: ServiceDirectory> Advertiser<D> {
    pub fn new(directory: Arc<D>, lease: MulticastLease) -> Self {
        Self {
            directory,
            lease,
            active: Mutex::new(None),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Starts advertising, replacing any prior advertisement.
    ///
    /// Attribute keys are lowercased, and an `ip` attribute is mirrored
    /// into the advertised name (see [`ServiceDescriptor`]). Resolves once
    /// the directory confirms the registration.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::RegistrationFailed`] with the platform
    /// code when the directory rejects the registration.
    pub async fn start_advertising(
        &self,
        name: &str,
        service_type: &str,
        port: u16,
        attributes: HashMap<String, String>,
    ) -> Result<()> {
        // Idempotent teardown of whatever was advertised before.
        self.teardown();

        let guard = self.lease.acquire();
        let descriptor = ServiceDescriptor::builder(name, service_type, port)
            .attributes(attributes)
            .build();

        debug!(
            name = %descriptor.display_name,
            service_type = %descriptor.service_type,
            port = descriptor.port,
            "submitting registration"
        );

        let handle = self
            .directory
            .register(&descriptor)
            .map_err(|e| DiscoveryError::RegistrationFailed { code: e.code })?;
        let events = handle.events.clone();

        // Install before awaiting confirmation so a concurrent stop can
        // cancel a registration that is still in flight.
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        *self.active.lock() = Some(ActiveRegistration {
            generation,
            handle,
            _lease: guard,
        });

        match events.recv().await {
            Ok(RegistrationEvent::Registered) => {
                info!(
                    name = %descriptor.display_name,
                    service_type = %descriptor.service_type,
                    port = descriptor.port,
                    "advertising"
                );
                Ok(())
            }
            Ok(RegistrationEvent::Failed { code }) => {
                self.remove_generation(generation);
                Err(DiscoveryError::RegistrationFailed { code })
            }
            Err(_) => {
                self.remove_generation(generation);
                Err(DiscoveryError::DirectoryClosed)
            }
        }
    }

    /// Stops the active advertisement.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NoActiveAdvertisement`] when nothing is
    /// being advertised.
    pub fn stop_advertising(&self) -> Result<()> {
        let taken = self.active.lock().take();
        match taken {
            Some(active) => {
                self.unregister(&active.handle);
                info!("advertising stopped");
                Ok(())
            }
            None => Err(DiscoveryError::NoActiveAdvertisement),
        }
    }

    /// Whether a registration is currently held.
    pub fn is_advertising(&self) -> bool {
        self.active.lock().is_some()
    }

    fn teardown(&self) {
        if let Some(active) = self.active.lock().take() {
            self.unregister(&active.handle);
            debug!("previous advertisement torn down");
        }
    }

    fn unregister(&self, handle: &RegistrationHandle) {
        if let Err(e) = self.directory.unregister(handle) {
            warn!(error = %e, key = %handle.key, "unregister failed");
        }
    }

    // Drops the registration for `generation` if it is still the active
    // one. A failed registration never reached the directory, so there is
    // nothing to unregister; the lease guard is released here.
    fn remove_generation(&self, generation: u64) {
        let mut active = self.active.lock();
        if matches!(&*active, Some(a) if a.generation == generation) {
            *active = None;
        }
    }
}
