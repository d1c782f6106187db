//! mDNS backend for the lansd service directory contract
//!
//! Implements [`lansd_discovery::ServiceDirectory`] over the `mdns-sd`
//! daemon. The wire protocol (multicast sockets, DNS message encoding,
//! record caching) is entirely the daemon's business; this crate only
//! translates between its event stream and the directory contract.

pub mod daemon;

pub use daemon::MdnsDirectory;
