//! # lansd Discovery
//!
//! Local-network service advertisement and discovery with DNS-SD/mDNS
//! semantics. This crate is the coordination core: it turns the
//! unreliable, asynchronous event streams of a platform DNS-SD primitive
//! into deterministic outcomes.
//!
//! - **[`Advertiser`]**: publishes this process as a named, typed,
//!   addressable service with TXT-style attributes. At most one
//!   registration at a time.
//! - **[`DiscoveryCoordinator`]**: finds services published by peers.
//!   Single-shot mode resolves one matching service or times out;
//!   continuous mode streams found/lost events until stopped.
//! - **[`MulticastLease`]**: reference-counted hold on the
//!   multicast-capable network mode both operations need.
//! - **[`ServiceDirectory`]**: the backend contract. `lansd-mdns`
//!   implements it over an mDNS daemon; tests script it in memory.
//!
//! ## Example
//!
//! ```no_run
//! use lansd_core::DiscoveryConfig;
//! use lansd_discovery::{Advertiser, DiscoveryCoordinator, MulticastLease, ServiceDirectory};
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! async fn run<D: ServiceDirectory>(directory: Arc<D>) -> lansd_discovery::Result<()> {
//!     let lease = MulticastLease::new();
//!     let advertiser = Advertiser::new(directory.clone(), lease.clone());
//!     let coordinator =
//!         DiscoveryCoordinator::new(directory, lease, DiscoveryConfig::default())?;
//!
//!     let mut attributes = HashMap::new();
//!     attributes.insert("ip".to_string(), "192.168.1.5".to_string());
//!     advertiser
//!         .start_advertising("Printer", "_ipp._tcp", 8081, attributes)
//!         .await?;
//!
//!     let peer = coordinator
//!         .find_service("Printer", "_ipp._tcp", Some(Duration::from_secs(5)))
//!         .await?;
//!     println!("found peer at {}:{}", peer.address, peer.port);
//!     Ok(())
//! }
//! ```

pub mod address;
pub mod advertiser;
pub mod coordinator;
pub mod directory;
pub mod error;
pub mod lease;

pub use advertiser::Advertiser;
pub use coordinator::{DiscoveryCoordinator, DiscoveryEvent};
pub use directory::{
    BrowseEvent, BrowseHandle, RegistrationEvent, RegistrationHandle, ResolveEvent,
    ServiceDirectory,
};
pub use error::{DirectoryError, DiscoveryError, Result};
pub use lease::{LeaseGuard, MulticastLease, MulticastMode};
