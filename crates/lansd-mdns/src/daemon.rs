//! `ServiceDirectory` over the mdns-sd daemon

use async_channel::{Receiver, Sender};
use dashmap::DashMap;
use lansd_core::{FoundService, ResolvedInfo, ServiceDescriptor, ServiceIdentity};
use lansd_discovery::{
    BrowseEvent, BrowseHandle, DirectoryError, RegistrationEvent, RegistrationHandle,
    ResolveEvent, ServiceDirectory,
};
use mdns_sd::{ServiceDaemon, ServiceEvent as MdnsEvent, ServiceInfo};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Maximum number of events to buffer per browse session
const EVENT_CHANNEL_CAPACITY: usize = 256;

// Appends the ".local." domain the daemon expects.
fn mdns_type(service_type: &str) -> String {
    if service_type.ends_with(".local.") {
        service_type.to_string()
    } else {
        format!("{}.local.", service_type)
    }
}

// Extracts the instance name from a full service name
// ("Printer._ipp._tcp.local." with type "_ipp._tcp.local." -> "Printer").
fn instance_name(fullname: &str, ty_domain: &str) -> String {
    fullname
        .strip_suffix(ty_domain)
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or(fullname)
        .to_string()
}

fn directory_error(e: mdns_sd::Error) -> DirectoryError {
    // mdns-sd has no numeric platform codes.
    DirectoryError::new(-1, e.to_string())
}

// Resolutions observed by browse sessions, shared with `resolve` calls.
#[derive(Default)]
struct ResolveTable {
    resolved: DashMap<String, ResolvedInfo>,
    pending: DashMap<String, Vec<Sender<ResolveEvent>>>,
}

impl ResolveTable {
    fn record(&self, fullname: String, info: ResolvedInfo) {
        if let Some((_, waiters)) = self.pending.remove(&fullname) {
            for waiter in waiters {
                let _ = waiter.try_send(ResolveEvent::Resolved(info.clone()));
            }
        }
        self.resolved.insert(fullname, info);
    }

    // Drops everything belonging to a stopped browse. Pending waiters see
    // their channel close without a terminal event, which the core treats
    // as a discarded candidate.
    fn clear_type(&self, ty_domain: &str) {
        self.resolved.retain(|fullname, _| !fullname.ends_with(ty_domain));
        self.pending.retain(|fullname, _| !fullname.ends_with(ty_domain));
    }
}

/// Service directory backed by an `mdns-sd` [`ServiceDaemon`].
pub struct MdnsDirectory {
    daemon: ServiceDaemon,
    table: Arc<ResolveTable>,
}

impl MdnsDirectory {
    pub fn new() -> Result<Self, DirectoryError> {
        let daemon = ServiceDaemon::new().map_err(directory_error)?;
        Ok(Self {
            daemon,
            table: Arc::new(ResolveTable::default()),
        })
    }
}

impl ServiceDirectory for MdnsDirectory {
    fn register(
        &self,
        descriptor: &ServiceDescriptor,
    ) -> Result<RegistrationHandle, DirectoryError> {
        let ty_domain = mdns_type(&descriptor.service_type);
        let host = format!(
            "{}.local.",
            hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "localhost".to_string())
        );

        let info = ServiceInfo::new(
            &ty_domain,
            &descriptor.display_name,
            &host,
            "",
            descriptor.port,
            descriptor.attributes.clone(),
        )
        .map_err(directory_error)?
        .enable_addr_auto();

        let fullname = info.get_fullname().to_string();
        self.daemon.register(info).map_err(directory_error)?;

        // The daemon accepts registrations synchronously; synthesize the
        // terminal confirmation event the contract promises.
        let (tx, rx) = async_channel::bounded(1);
        let _ = tx.try_send(RegistrationEvent::Registered);

        debug!(fullname = %fullname, port = descriptor.port, "service registered");
        Ok(RegistrationHandle {
            key: fullname,
            events: rx,
        })
    }

    fn unregister(&self, handle: &RegistrationHandle) -> Result<(), DirectoryError> {
        // The status receiver is dropped; withdrawal is best-effort.
        self.daemon
            .unregister(&handle.key)
            .map(|_status| ())
            .map_err(directory_error)
    }

    fn browse(&self, service_type: &str) -> Result<BrowseHandle, DirectoryError> {
        let ty_domain = mdns_type(service_type);
        let receiver = self.daemon.browse(&ty_domain).map_err(directory_error)?;

        let (tx, rx) = async_channel::bounded(EVENT_CHANNEL_CAPACITY);
        let table = self.table.clone();
        let browse_type = service_type.to_string();

        tokio::spawn(async move {
            while let Ok(event) = receiver.recv_async().await {
                match event {
                    MdnsEvent::ServiceFound(ty, fullname) => {
                        let found = FoundService {
                            name: instance_name(&fullname, &ty),
                            service_type: browse_type.clone(),
                            fullname,
                        };
                        if tx.send(BrowseEvent::Found(found)).await.is_err() {
                            break;
                        }
                    }
                    MdnsEvent::ServiceResolved(info) => {
                        let fullname = info.get_fullname().to_string();
                        let resolved = convert_service_info(&info, &ty_domain);
                        debug!(
                            fullname = %fullname,
                            address = %resolved.address,
                            port = resolved.port,
                            "service resolved"
                        );
                        table.record(fullname, resolved);
                    }
                    MdnsEvent::ServiceRemoved(ty, fullname) => {
                        table.resolved.remove(&fullname);
                        let identity = ServiceIdentity {
                            name: instance_name(&fullname, &ty),
                            service_type: browse_type.clone(),
                        };
                        if tx.send(BrowseEvent::Lost(identity)).await.is_err() {
                            break;
                        }
                    }
                    MdnsEvent::SearchStarted(ty) => {
                        debug!(ty = %ty, "search started");
                    }
                    MdnsEvent::SearchStopped(_) => break,
                    _ => {}
                }
            }

            table.clear_type(&ty_domain);
            debug!("browse pump stopped");
        });

        Ok(BrowseHandle {
            service_type: service_type.to_string(),
            events: rx,
        })
    }

    fn stop_browse(&self, handle: &BrowseHandle) -> Result<(), DirectoryError> {
        self.daemon
            .stop_browse(&mdns_type(&handle.service_type))
            .map_err(directory_error)
    }

    fn resolve(&self, service: &FoundService) -> Result<Receiver<ResolveEvent>, DirectoryError> {
        let (tx, rx) = async_channel::bounded(1);

        // The daemon resolves every found service on its own; either the
        // resolution already arrived, or the browse pump completes the
        // waiter when it does. There is no resolve-failed signal from the
        // daemon: a candidate that never resolves simply sees its channel
        // close when the browse stops.
        if let Some(info) = self.table.resolved.get(&service.fullname) {
            let _ = tx.try_send(ResolveEvent::Resolved(info.clone()));
        } else {
            self.table
                .pending
                .entry(service.fullname.clone())
                .or_default()
                .push(tx);
        }

        Ok(rx)
    }
}

impl Drop for MdnsDirectory {
    fn drop(&mut self) {
        if let Err(e) = self.daemon.shutdown() {
            warn!(error = %e, "mdns daemon shutdown failed");
        }
    }
}

// Converts the daemon's resolution into the contract's raw form. The
// full address list is carried through; `address` prefers an IPv4 entry,
// and the anti-ghosting policy upstream handles the rest.
fn convert_service_info(info: &ServiceInfo, ty_domain: &str) -> ResolvedInfo {
    let raw: Vec<IpAddr> = info.get_addresses().iter().copied().collect();
    let address = raw
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| raw.first())
        .map(|addr| addr.to_string())
        .unwrap_or_default();
    let addresses = raw.iter().map(|addr| addr.to_string()).collect();

    let mut attributes = std::collections::HashMap::new();
    for property in info.get_properties().iter() {
        attributes.insert(property.key().to_string(), property.val_str().to_string());
    }

    ResolvedInfo {
        name: instance_name(info.get_fullname(), ty_domain),
        address,
        addresses,
        port: info.get_port(),
        attributes,
    }
}
