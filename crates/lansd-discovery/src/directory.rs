//! Service directory contract
//!
//! The discovery core never speaks mDNS itself. It drives a
//! [`ServiceDirectory`] backend (the platform's DNS-SD primitive) through
//! five operations, each delivering its outcome asynchronously over an
//! `async-channel` receiver. Backends live in separate crates
//! (e.g. `lansd-mdns`); tests use an in-memory scripted directory.

use crate::error::DirectoryError;
use async_channel::Receiver;
use lansd_core::{FoundService, ResolvedInfo, ServiceDescriptor, ServiceIdentity};

/// Terminal event of a registration. Exactly one is delivered per
/// successful `register` call.
#[derive(Debug, Clone)]
pub enum RegistrationEvent {
    /// The directory confirmed the registration
    Registered,

    /// The directory rejected the registration
    Failed { code: i32 },
}

/// Events emitted by an active browse session.
#[derive(Debug, Clone)]
pub enum BrowseEvent {
    /// A service of the browsed type appeared. Not yet resolved.
    Found(FoundService),

    /// A previously found service disappeared
    Lost(ServiceIdentity),
}

/// Terminal event of a resolve request. Exactly one is delivered per
/// successful `resolve` call, unless the browse session is torn down
/// first (the channel then closes without an event).
#[derive(Debug, Clone)]
pub enum ResolveEvent {
    /// The candidate resolved to an address and port
    Resolved(ResolvedInfo),

    /// The candidate could not be resolved. Non-fatal; a later event for
    /// the same or another candidate may still succeed.
    Failed { code: i32 },
}

/// Token for an active registration.
#[derive(Debug, Clone)]
pub struct RegistrationHandle {
    /// Backend-scoped key of the registration (for mDNS backends, the
    /// full service name)
    pub key: String,

    /// Delivers exactly one [`RegistrationEvent`]
    pub events: Receiver<RegistrationEvent>,
}

/// Token for an active browse session.
#[derive(Debug, Clone)]
pub struct BrowseHandle {
    /// Normalized service type the session was started with
    pub service_type: String,

    /// Found/lost events, until the session is stopped
    pub events: Receiver<BrowseEvent>,
}

/// The platform's DNS-SD primitive.
///
/// All five operations are non-blocking; outcomes arrive on the returned
/// channels. Implementations must close a browse handle's event channel
/// once `stop_browse` has taken effect; session teardown in the core
/// relies on that to let event pumps run to completion.
pub trait ServiceDirectory: Send + Sync + 'static {
    /// Submits a registration. The handle's channel delivers exactly one
    /// terminal [`RegistrationEvent`].
    fn register(&self, descriptor: &ServiceDescriptor)
        -> Result<RegistrationHandle, DirectoryError>;

    /// Withdraws a registration previously returned by [`register`](Self::register).
    fn unregister(&self, handle: &RegistrationHandle) -> Result<(), DirectoryError>;

    /// Starts browsing for `service_type`. Found/lost events flow on the
    /// handle's channel until [`stop_browse`](Self::stop_browse).
    fn browse(&self, service_type: &str) -> Result<BrowseHandle, DirectoryError>;

    /// Stops a browse session and closes its event channel.
    fn stop_browse(&self, handle: &BrowseHandle) -> Result<(), DirectoryError>;

    /// Requests resolution of a found candidate. The receiver delivers
    /// exactly one terminal [`ResolveEvent`].
    fn resolve(&self, service: &FoundService) -> Result<Receiver<ResolveEvent>, DirectoryError>;
}
