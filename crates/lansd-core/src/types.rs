//! Types for advertised and discovered services

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Normalizes a DNS-SD service type to carry the leading protocol-prefix
/// underscore (e.g. `ipp._tcp` becomes `_ipp._tcp`).
pub fn normalize_service_type(service_type: &str) -> String {
    if service_type.starts_with('_') {
        service_type.to_string()
    } else {
        format!("_{}", service_type)
    }
}

/// A service to be advertised on the local network.
///
/// Built once by the advertisement manager and submitted to the service
/// directory; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Instance name as requested by the caller (e.g. "Printer")
    pub name: String,

    /// Name actually advertised on the wire. When the attributes carry an
    /// explicit `ip`, it is appended as a hyphen-separated suffix
    /// ("Printer-192.168.1.5") so the name itself works as a fallback
    /// address carrier on peers that drop TXT data.
    pub display_name: String,

    /// Service type with the protocol-prefix underscore (e.g. "_ipp._tcp")
    pub service_type: String,

    /// Port the advertised service listens on
    pub port: u16,

    /// TXT-record attributes; keys are lowercased
    pub attributes: HashMap<String, String>,
}

impl ServiceDescriptor {
    /// Starts building a descriptor. `service_type` is normalized to carry
    /// the leading underscore.
    pub fn builder(
        name: impl Into<String>,
        service_type: &str,
        port: u16,
    ) -> ServiceDescriptorBuilder {
        ServiceDescriptorBuilder {
            name: name.into(),
            service_type: normalize_service_type(service_type),
            port,
            attributes: HashMap::new(),
        }
    }
}

/// Builder for [`ServiceDescriptor`]
#[derive(Debug, Clone)]
pub struct ServiceDescriptorBuilder {
    name: String,
    service_type: String,
    port: u16,
    attributes: HashMap<String, String>,
}

impl ServiceDescriptorBuilder {
    /// Adds a single TXT attribute. The key is lowercased.
    pub fn attribute(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.attributes
            .insert(key.as_ref().to_lowercase(), value.into());
        self
    }

    /// Adds every entry of `attributes`, lowercasing the keys.
    pub fn attributes<K, V>(mut self, attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in attributes {
            self.attributes
                .insert(key.as_ref().to_lowercase(), value.into());
        }
        self
    }

    pub fn build(self) -> ServiceDescriptor {
        let display_name = match self.attributes.get("ip") {
            Some(ip) if !ip.is_empty() => format!("{}-{}", self.name, ip),
            _ => self.name.clone(),
        };

        ServiceDescriptor {
            name: self.name,
            display_name,
            service_type: self.service_type,
            port: self.port,
            attributes: self.attributes,
        }
    }
}

/// Name and type of a service, without any address information.
///
/// Carried by lost-events, where the service may never have been resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceIdentity {
    pub name: String,
    pub service_type: String,
}

/// An unresolved candidate emitted by a browse session.
///
/// Lives from its found-event until it is either resolved or lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundService {
    /// Advertised instance name (e.g. "Printer-192.168.1.5")
    pub name: String,

    /// Service type this candidate was found under
    pub service_type: String,

    /// Directory-scoped key identifying the candidate for resolution
    /// (for mDNS backends this is the full service name)
    pub fullname: String,
}

impl FoundService {
    pub fn identity(&self) -> ServiceIdentity {
        ServiceIdentity {
            name: self.name.clone(),
            service_type: self.service_type.clone(),
        }
    }
}

/// Raw output of a directory resolve, before any address disambiguation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedInfo {
    /// Resolved instance name, which may carry a hyphen-separated address
    /// suffix (see [`ServiceDescriptor::display_name`])
    pub name: String,

    /// Address as reported by the resolution primitive. Some platforms
    /// prepend a path-style slash ("/10.0.0.2").
    pub address: String,

    /// Every address the resolution reported, `address` included.
    /// Multi-homed hosts typically yield one entry per interface and
    /// address family.
    pub addresses: Vec<String>,

    /// Resolved port
    pub port: u16,

    /// TXT-record attributes as reported
    pub attributes: HashMap<String, String>,
}

/// A fully resolved service, handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedService {
    /// IPv4/IPv6 literal, after address disambiguation
    pub address: String,

    /// Every address reported for the service. Single-shot delivery
    /// narrows this to the disambiguated `address`; continuous streams
    /// carry the full reported list.
    pub addresses: Vec<String>,

    /// Service port
    pub port: u16,

    /// TXT-record attributes
    pub attributes: HashMap<String, String>,
}
