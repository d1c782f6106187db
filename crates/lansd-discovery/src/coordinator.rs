//! Discovery coordinator
//!
//! Owns at most one browse session at a time and runs it in one of two
//! modes:
//!
//! - **single-shot** ([`DiscoveryCoordinator::find_service`]): browse,
//!   filter candidates by name prefix, resolve, apply the anti-ghosting
//!   address policy, and deliver exactly one outcome: a resolved
//!   service, a timeout, or a start failure.
//! - **continuous** ([`DiscoveryCoordinator::start_discovery`]): resolve
//!   every found service and stream found/lost items until stopped,
//!   trusting the directory's resolution as-is.
//!
//! Directory callbacks arrive on their own tasks, so terminal delivery in
//! single-shot mode is guarded by a one-shot completion flag: whichever
//! of a late resolution and the timeout fires first wins and performs the
//! teardown, exactly once.

use crate::address::select_address;
use crate::directory::{BrowseEvent, BrowseHandle, ResolveEvent, ServiceDirectory};
use crate::error::{DiscoveryError, Result};
use crate::lease::{LeaseGuard, MulticastLease};
use async_channel::{Receiver, Sender};
use dashmap::DashMap;
use lansd_core::{
    normalize_service_type, DiscoveryConfig, FoundService, ResolvedInfo, ResolvedService,
    ServiceIdentity,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

// How long the timer waits for an in-flight delivery that set the
// completion flag just before the deadline.
const RESULT_GRACE: Duration = Duration::from_millis(50);

/// Item of a continuous discovery stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DiscoveryEvent {
    /// A service appeared and resolved
    Found {
        identity: ServiceIdentity,
        service: ResolvedService,
    },

    /// A service disappeared. Carries only the advertised identity; the
    /// service need never have resolved.
    Lost(ServiceIdentity),
}

// One browse session. Owns its handle, completion flag, and lease
// acquisition; discarded as a unit on teardown.
struct Session {
    id: u64,
    handle: BrowseHandle,
    finished: Arc<AtomicBool>,
    _lease: LeaseGuard,
}

struct CoordinatorInner<D> {
    directory: Arc<D>,
    lease: MulticastLease,
    config: DiscoveryConfig,
    session: Mutex<Option<Session>>,
    next_session: AtomicU64,
    // Snapshot of currently discovered services while a continuous
    // session is active, keyed by instance name.
    registry: DashMap<String, (ServiceIdentity, ResolvedService)>,
}

impl<D: ServiceDirectory> CoordinatorInner<D> {
    // Tears down the session `id` if it is still the active one. Safe to
    // race: the mutex decides a single winner, and the lease guard drops
    // with the session, so the release happens exactly once.
    fn close_session(&self, id: u64) {
        let taken = {
            let mut session = self.session.lock();
            match &*session {
                Some(active) if active.id == id => session.take(),
                _ => None,
            }
        };

        if let Some(session) = taken {
            session.finished.store(true, Ordering::SeqCst);
            if let Err(e) = self.directory.stop_browse(&session.handle) {
                warn!(error = %e, session = id, "stop browse failed");
            }
            self.registry.clear();
            debug!(session = id, "browse session closed");
        }
    }
}

/// Coordinates browse sessions against a [`ServiceDirectory`].
pub struct DiscoveryCoordinator<D: ServiceDirectory> {
    inner: Arc<CoordinatorInner<D>>,
}

impl<D: ServiceDirectory> Clone for DiscoveryCoordinator<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: ServiceDirectory> DiscoveryCoordinator<D> {
    pub fn new(directory: Arc<D>, lease: MulticastLease, config: DiscoveryConfig) -> Result<Self> {
        config.validate().map_err(DiscoveryError::InvalidConfig)?;

        Ok(Self {
            inner: Arc::new(CoordinatorInner {
                directory,
                lease,
                config,
                session: Mutex::new(None),
                next_session: AtomicU64::new(0),
                registry: DashMap::new(),
            }),
        })
    }

    /// Single-shot discovery: finds one service whose advertised name
    /// starts with `name_prefix`, resolves it, and returns it.
    ///
    /// `timeout` defaults to the configured find timeout. Candidates that
    /// fail to resolve, or resolve to an unspecified address, are skipped;
    /// the session keeps waiting for a better event until the deadline.
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::StartFailed`] when the browse cannot begin,
    /// [`DiscoveryError::Timeout`] when the deadline passes with no valid
    /// resolution. Either way no browse session remains active afterwards.
    pub async fn find_service(
        &self,
        name_prefix: &str,
        service_type: &str,
        timeout: Option<Duration>,
    ) -> Result<ResolvedService> {
        let timeout = timeout.unwrap_or_else(|| self.inner.config.find_timeout());
        let started = tokio::time::Instant::now();

        let service_type = normalize_service_type(service_type);
        let (id, finished, result_rx) = self.open_single_shot(name_prefix, &service_type)?;

        info!(
            prefix = name_prefix,
            service_type = %service_type,
            timeout_ms = timeout.as_millis() as u64,
            session = id,
            "single-shot discovery started"
        );

        match tokio::time::timeout(timeout, result_rx.recv()).await {
            Ok(Ok(service)) => {
                debug!(address = %service.address, session = id, "service delivered");
                Ok(service)
            }
            // The session was torn down externally before anything
            // resolved. Nothing may be delivered after a stop, so hold
            // the caller to the original deadline and report a timeout.
            Ok(Err(_closed)) => {
                let remaining = timeout.saturating_sub(started.elapsed());
                tokio::time::sleep(remaining).await;
                Err(DiscoveryError::Timeout)
            }
            Err(_elapsed) => {
                if !finished.swap(true, Ordering::SeqCst) {
                    self.inner.close_session(id);
                    debug!(session = id, "single-shot discovery timed out");
                    return Err(DiscoveryError::Timeout);
                }
                // The flag was already set: either a resolution won the
                // race against the timer and its send is imminent, or an
                // external stop beat us and nothing will arrive. A short
                // grace wait distinguishes the two without hanging.
                match tokio::time::timeout(RESULT_GRACE, result_rx.recv()).await {
                    Ok(Ok(service)) => Ok(service),
                    _ => Err(DiscoveryError::Timeout),
                }
            }
        }
    }

    /// Continuous discovery: resolves every found service of
    /// `service_type` and streams [`DiscoveryEvent`]s until
    /// [`stop_discovery`](Self::stop_discovery).
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::StartFailed`] when the browse cannot begin; the
    /// stream is not opened in that case.
    pub fn start_discovery(&self, service_type: &str) -> Result<Receiver<DiscoveryEvent>> {
        let service_type = normalize_service_type(service_type);

        // Single active session invariant.
        self.stop_discovery();

        let guard = self.inner.lease.acquire();
        let handle = self
            .inner
            .directory
            .browse(&service_type)
            .map_err(DiscoveryError::StartFailed)?;

        let id = self.inner.next_session.fetch_add(1, Ordering::Relaxed);
        let finished = Arc::new(AtomicBool::new(false));
        let events = handle.events.clone();
        let (tx, rx) = async_channel::bounded(self.inner.config.channel_capacity);

        *self.inner.session.lock() = Some(Session {
            id,
            handle,
            finished: finished.clone(),
            _lease: guard,
        });

        tokio::spawn(continuous_pump(
            self.inner.clone(),
            id,
            events,
            finished,
            tx,
        ));

        info!(service_type = %service_type, session = id, "continuous discovery started");
        Ok(rx)
    }

    /// Stops the active browse session, if any. Idempotent: calling with
    /// no session active is a no-op and never double-releases the
    /// multicast lease.
    pub fn stop_discovery(&self) {
        let current = self.inner.session.lock().as_ref().map(|s| s.id);
        if let Some(id) = current {
            self.inner.close_session(id);
            info!(session = id, "discovery stopped");
        }
    }

    /// Whether a browse session is currently active.
    pub fn is_discovering(&self) -> bool {
        self.inner.session.lock().is_some()
    }

    /// Snapshot of services discovered by the active continuous session.
    pub fn discovered_services(&self) -> Vec<(ServiceIdentity, ResolvedService)> {
        self.inner
            .registry
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    // Starts the browse + pump for a single-shot session and returns the
    // session id, its completion flag, and the one-slot result channel.
    fn open_single_shot(
        &self,
        name_prefix: &str,
        service_type: &str,
    ) -> Result<(u64, Arc<AtomicBool>, Receiver<ResolvedService>)> {
        self.stop_discovery();

        let guard = self.inner.lease.acquire();
        let handle = self
            .inner
            .directory
            .browse(service_type)
            .map_err(DiscoveryError::StartFailed)?;

        let id = self.inner.next_session.fetch_add(1, Ordering::Relaxed);
        let finished = Arc::new(AtomicBool::new(false));
        let events = handle.events.clone();
        let (result_tx, result_rx) = async_channel::bounded(1);

        // Install before spawning the pump so a delivery racing ahead of
        // us still finds the session it must tear down.
        *self.inner.session.lock() = Some(Session {
            id,
            handle,
            finished: finished.clone(),
            _lease: guard,
        });

        tokio::spawn(single_shot_pump(
            self.inner.clone(),
            id,
            name_prefix.to_string(),
            events,
            finished.clone(),
            result_tx,
        ));

        Ok((id, finished, result_rx))
    }
}

// Drains browse events for a single-shot session, resolving candidates
// that match the name prefix. Exits when the browse channel closes
// (stop_browse) or the session completes.
async fn single_shot_pump<D: ServiceDirectory>(
    inner: Arc<CoordinatorInner<D>>,
    id: u64,
    name_prefix: String,
    events: Receiver<BrowseEvent>,
    finished: Arc<AtomicBool>,
    result_tx: Sender<ResolvedService>,
) {
    while let Ok(event) = events.recv().await {
        if finished.load(Ordering::SeqCst) {
            break;
        }

        match event {
            BrowseEvent::Found(found) => {
                debug!(name = %found.name, session = id, "service found");

                // Strict prefix filter; non-matching candidates are
                // ignored, not errors.
                if !found.name.starts_with(&name_prefix) {
                    continue;
                }

                let resolve_rx = match inner.directory.resolve(&found) {
                    Ok(rx) => rx,
                    Err(e) => {
                        debug!(error = %e, name = %found.name, "resolve request failed");
                        continue;
                    }
                };

                tokio::spawn(await_resolution(
                    inner.clone(),
                    id,
                    found,
                    resolve_rx,
                    finished.clone(),
                    result_tx.clone(),
                ));
            }
            BrowseEvent::Lost(identity) => {
                debug!(name = %identity.name, session = id, "service lost");
            }
        }
    }

    debug!(session = id, "single-shot pump stopped");
}

// Awaits the terminal resolve event for one candidate and, if it yields a
// valid address, performs the one-shot delivery.
async fn await_resolution<D: ServiceDirectory>(
    inner: Arc<CoordinatorInner<D>>,
    id: u64,
    found: FoundService,
    resolve_rx: Receiver<ResolveEvent>,
    finished: Arc<AtomicBool>,
    result_tx: Sender<ResolvedService>,
) {
    match resolve_rx.recv().await {
        Ok(ResolveEvent::Resolved(info)) => {
            let Some(address) = select_address(&info.name, &info.address) else {
                debug!(
                    name = %info.name,
                    reported = %info.address,
                    "resolved address not yet valid, waiting for a better event"
                );
                return;
            };

            // One-shot completion: first valid resolution wins, every
            // later event (and the timer) sees the flag and backs off.
            if finished.swap(true, Ordering::SeqCst) {
                return;
            }
            inner.close_session(id);

            let service = ResolvedService {
                addresses: vec![address.clone()],
                address,
                port: info.port,
                attributes: info.attributes,
            };
            let _ = result_tx.send(service).await;
        }
        Ok(ResolveEvent::Failed { code }) => {
            // Non-fatal: another candidate or a later event may succeed.
            debug!(code, name = %found.name, "candidate failed to resolve");
        }
        Err(_) => {
            // Session torn down before the resolve completed.
        }
    }
}

// Drains browse events for a continuous session, resolving every found
// service and forwarding found/lost items downstream.
//
// Resolutions complete on spawned waiter tasks but are routed back here,
// so the registry and the downstream stream are only ever touched by this
// task. A resolution that completes after its service's lost event finds
// the candidate gone from the live set and is discarded instead of
// re-inserting a stale entry.
async fn continuous_pump<D: ServiceDirectory>(
    inner: Arc<CoordinatorInner<D>>,
    id: u64,
    events: Receiver<BrowseEvent>,
    finished: Arc<AtomicBool>,
    tx: Sender<DiscoveryEvent>,
) {
    let (resolved_tx, resolved_rx) =
        async_channel::bounded::<(FoundService, ResolvedInfo)>(inner.config.channel_capacity);
    let mut live: HashSet<String> = HashSet::new();

    loop {
        let event = tokio::select! {
            event = events.recv() => match event {
                Ok(event) => event,
                // Browse channel closed: the session was stopped.
                Err(_) => break,
            },
            completed = resolved_rx.recv() => {
                // The pump holds `resolved_tx`, so this recv cannot fail.
                if let Ok((found, info)) = completed {
                    if finished.load(Ordering::SeqCst) {
                        break;
                    }
                    if !live.contains(&found.name) {
                        debug!(name = %found.name, session = id, "resolution for lost service discarded");
                        continue;
                    }

                    // This mode trusts the directory's resolution as
                    // reported; no name-suffix fallback.
                    let identity = found.identity();
                    let service = ResolvedService {
                        address: info.address,
                        addresses: info.addresses,
                        port: info.port,
                        attributes: info.attributes,
                    };

                    inner
                        .registry
                        .insert(identity.name.clone(), (identity.clone(), service.clone()));

                    if let Err(e) = tx.send(DiscoveryEvent::Found { identity, service }).await {
                        warn!(error = %e, session = id, "failed to forward found event");
                    }
                }
                continue;
            }
        };

        if finished.load(Ordering::SeqCst) {
            break;
        }

        match event {
            BrowseEvent::Found(found) => {
                debug!(name = %found.name, session = id, "service found");
                live.insert(found.name.clone());

                let resolve_rx = match inner.directory.resolve(&found) {
                    Ok(rx) => rx,
                    Err(e) => {
                        debug!(error = %e, name = %found.name, "resolve request failed");
                        continue;
                    }
                };

                let resolved_tx = resolved_tx.clone();
                tokio::spawn(async move {
                    match resolve_rx.recv().await {
                        Ok(ResolveEvent::Resolved(info)) => {
                            let _ = resolved_tx.send((found, info)).await;
                        }
                        Ok(ResolveEvent::Failed { code }) => {
                            debug!(code, name = %found.name, "candidate failed to resolve");
                        }
                        Err(_) => {}
                    }
                });
            }
            BrowseEvent::Lost(identity) => {
                debug!(name = %identity.name, session = id, "service lost");
                live.remove(&identity.name);
                inner.registry.remove(&identity.name);
                if let Err(e) = tx.send(DiscoveryEvent::Lost(identity)).await {
                    warn!(error = %e, session = id, "failed to forward lost event");
                }
            }
        }
    }

    debug!(session = id, "continuous pump stopped");
}
