//! # lansd Core
//!
//! Shared data model and configuration for the lansd local-network
//! service discovery stack.
//!
//! This crate provides the foundational building blocks used by
//! `lansd-discovery` and its directory backends:
//!
//! - **Types**: `ServiceDescriptor` for advertising, `FoundService` for
//!   unresolved browse candidates, `ResolvedInfo`/`ResolvedService` for
//!   resolution results, and `ServiceIdentity` for naming a service
//!   without an address.
//! - **Configuration**: `DiscoveryConfig` with serde-friendly defaults
//!   and validation.
//!
//! ## Example
//!
//! ```
//! use lansd_core::types::ServiceDescriptor;
//!
//! let descriptor = ServiceDescriptor::builder("Printer", "_ipp._tcp", 8081)
//!     .attribute("Version", "1.0")
//!     .attribute("ip", "192.168.1.5")
//!     .build();
//!
//! // Attribute keys are lowercased, and an explicit "ip" attribute is
//! // mirrored into the display name for peers that drop TXT records.
//! assert_eq!(descriptor.display_name, "Printer-192.168.1.5");
//! assert_eq!(descriptor.attributes.get("version").map(String::as_str), Some("1.0"));
//! ```

pub mod config;
pub mod types;

pub use config::DiscoveryConfig;
pub use types::{
    normalize_service_type, FoundService, ResolvedInfo, ResolvedService, ServiceDescriptor,
    ServiceIdentity,
};
