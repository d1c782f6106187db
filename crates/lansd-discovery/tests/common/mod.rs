//! Scripted in-memory service directory for driving the core in tests

#![allow(dead_code)]

use async_channel::Sender;
use lansd_core::{FoundService, ResolvedInfo, ServiceDescriptor, ServiceIdentity};
use lansd_discovery::{
    BrowseEvent, BrowseHandle, DirectoryError, RegistrationEvent, RegistrationHandle,
    ResolveEvent, ServiceDirectory,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

#[derive(Default)]
struct Inner {
    registration_failure: Option<i32>,
    browse_failure: Option<i32>,
    // Per instance name, the terminal events to hand out for successive
    // resolve requests. Unscripted requests are held open until the test
    // completes them, or forever.
    resolve_scripts: HashMap<String, VecDeque<ResolveEvent>>,
    held_resolves: Vec<(String, Sender<ResolveEvent>)>,

    browse_tx: Option<Sender<BrowseEvent>>,
    browse_type: Option<String>,
    active_browses: usize,
    browse_count: usize,

    registered: Vec<ServiceDescriptor>,
    unregistered: Vec<String>,
    resolve_requests: usize,
}

/// A `ServiceDirectory` whose asynchronous events are injected by the
/// test instead of arriving from a network.
#[derive(Default)]
pub struct MockDirectory {
    inner: Mutex<Inner>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `browse` call fails with `code`.
    pub fn fail_next_browse(&self, code: i32) {
        self.inner.lock().browse_failure = Some(code);
    }

    /// The next registration delivers a failed event with `code`.
    pub fn fail_registration(&self, code: i32) {
        self.inner.lock().registration_failure = Some(code);
    }

    /// Delivers the terminal event to a resolve of `name` that is being
    /// held open. Returns false when no such request is in flight.
    pub fn complete_resolve(&self, name: &str, event: ResolveEvent) -> bool {
        let mut inner = self.inner.lock();
        let Some(index) = inner.held_resolves.iter().position(|(n, _)| n == name) else {
            return false;
        };
        let (_, tx) = inner.held_resolves.remove(index);
        tx.try_send(event).is_ok()
    }

    /// Queues the terminal event for a future resolve of `name`.
    pub fn script_resolve(&self, name: &str, event: ResolveEvent) {
        self.inner
            .lock()
            .resolve_scripts
            .entry(name.to_string())
            .or_default()
            .push_back(event);
    }

    /// Injects a found-event into the active browse. Returns false when no
    /// browse is active (e.g. the session was already torn down).
    pub fn push_found(&self, name: &str) -> bool {
        let inner = self.inner.lock();
        let (Some(tx), Some(ty)) = (&inner.browse_tx, &inner.browse_type) else {
            return false;
        };
        let found = FoundService {
            name: name.to_string(),
            service_type: ty.clone(),
            fullname: format!("{}.{}.local.", name, ty),
        };
        tx.try_send(BrowseEvent::Found(found)).is_ok()
    }

    /// Injects a lost-event into the active browse.
    pub fn push_lost(&self, name: &str) -> bool {
        let inner = self.inner.lock();
        let (Some(tx), Some(ty)) = (&inner.browse_tx, &inner.browse_type) else {
            return false;
        };
        let identity = ServiceIdentity {
            name: name.to_string(),
            service_type: ty.clone(),
        };
        tx.try_send(BrowseEvent::Lost(identity)).is_ok()
    }

    pub fn active_browses(&self) -> usize {
        self.inner.lock().active_browses
    }

    pub fn browse_count(&self) -> usize {
        self.inner.lock().browse_count
    }

    pub fn registered(&self) -> Vec<ServiceDescriptor> {
        self.inner.lock().registered.clone()
    }

    pub fn unregistered(&self) -> Vec<String> {
        self.inner.lock().unregistered.clone()
    }

    pub fn resolve_requests(&self) -> usize {
        self.inner.lock().resolve_requests
    }
}

impl ServiceDirectory for MockDirectory {
    fn register(
        &self,
        descriptor: &ServiceDescriptor,
    ) -> Result<RegistrationHandle, DirectoryError> {
        let mut inner = self.inner.lock();
        inner.registered.push(descriptor.clone());

        let (tx, rx) = async_channel::bounded(1);
        let event = match inner.registration_failure.take() {
            Some(code) => RegistrationEvent::Failed { code },
            None => RegistrationEvent::Registered,
        };
        let _ = tx.try_send(event);

        Ok(RegistrationHandle {
            key: descriptor.display_name.clone(),
            events: rx,
        })
    }

    fn unregister(&self, handle: &RegistrationHandle) -> Result<(), DirectoryError> {
        self.inner.lock().unregistered.push(handle.key.clone());
        Ok(())
    }

    fn browse(&self, service_type: &str) -> Result<BrowseHandle, DirectoryError> {
        let mut inner = self.inner.lock();
        if let Some(code) = inner.browse_failure.take() {
            return Err(DirectoryError::new(code, "scripted browse failure"));
        }

        let (tx, rx) = async_channel::bounded(64);
        inner.browse_tx = Some(tx);
        inner.browse_type = Some(service_type.to_string());
        inner.active_browses += 1;
        inner.browse_count += 1;

        Ok(BrowseHandle {
            service_type: service_type.to_string(),
            events: rx,
        })
    }

    fn stop_browse(&self, _handle: &BrowseHandle) -> Result<(), DirectoryError> {
        let mut inner = self.inner.lock();
        // Dropping the sender closes the handle's event channel, per the
        // directory contract.
        inner.browse_tx = None;
        inner.browse_type = None;
        inner.active_browses = inner.active_browses.saturating_sub(1);
        Ok(())
    }

    fn resolve(
        &self,
        service: &FoundService,
    ) -> Result<async_channel::Receiver<ResolveEvent>, DirectoryError> {
        let mut inner = self.inner.lock();
        inner.resolve_requests += 1;

        let (tx, rx) = async_channel::bounded(1);
        match inner
            .resolve_scripts
            .get_mut(&service.name)
            .and_then(VecDeque::pop_front)
        {
            Some(event) => {
                let _ = tx.try_send(event);
            }
            None => {
                // No script: hold the channel open until the test
                // completes the request, if it ever does.
                inner.held_resolves.push((service.name.clone(), tx));
            }
        }

        Ok(rx)
    }
}

/// Convenience for a successful resolution event.
pub fn resolved(name: &str, address: &str, port: u16) -> ResolveEvent {
    ResolveEvent::Resolved(ResolvedInfo {
        name: name.to_string(),
        address: address.to_string(),
        addresses: vec![address.to_string()],
        port,
        attributes: HashMap::new(),
    })
}

/// Polls `cond` until it holds, advancing (paused) time.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached in time");
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .with_test_writer()
        .try_init();
}
