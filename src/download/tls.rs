/*
 * blockmirror - multi-mirror, block-parallel downloader.
 * Copyright (C) 2025  blockmirror contributors
 */

//! TLS host-name policy and client configuration.
//!
//! Mirrors addressed by IP literal (common for ad-hoc or disaster-recovery
//! mirrors) can't present a certificate naming the literal address, so the
//! TLS verification name is overridden to a fixed string for those hosts.
//! Certificate trust is always anchored at the bundled CA bundle, never at
//! the system trust store.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, RootCertStore};

/// Fixed verification name substituted for IP-literal mirror hosts.
pub const IP_LITERAL_SERVER_NAME: &str = "cockpit-tests";

/// True if `host` is an IP literal (has a `:` — IPv6 — or has no ASCII
/// alphabetic character at all — IPv4).
pub fn is_ip_literal(host: &str) -> bool {
    host.contains(':') || !host.chars().any(|c| c.is_ascii_alphabetic())
}

/// The TLS verification name to use for `host`: the fixed override for IP
/// literals, the host itself otherwise.
pub fn verification_name(host: &str) -> ServerName<'static> {
    let name = if is_ip_literal(host) {
        IP_LITERAL_SERVER_NAME
    } else {
        host
    };

    ServerName::try_from(name.to_string())
        .unwrap_or_else(|_| ServerName::try_from(IP_LITERAL_SERVER_NAME.to_string()).unwrap())
}

/// Build a `rustls::ClientConfig` trusting only the certificates in the
/// bundled CA bundle at `ca_bundle_path`.
pub fn client_config(ca_bundle_path: &Path) -> std::io::Result<Arc<ClientConfig>> {
    let mut roots = RootCertStore::empty();

    let file = File::open(ca_bundle_path)?;
    let mut reader = BufReader::new(file);

    for cert in rustls_pemfile::certs(&mut reader) {
        let cert: CertificateDer<'static> = cert?;
        roots
            .add(cert)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    }

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_literal_needs_override() {
        assert!(is_ip_literal("10.29.163.169"));
    }

    #[test]
    fn ipv6_literal_needs_override() {
        assert!(is_ip_literal("::1"));
        assert!(is_ip_literal("fe80::1"));
    }

    #[test]
    fn hostname_does_not_need_override() {
        assert!(!is_ip_literal("images-cockpit.apps.ci.centos.org"));
        assert!(!is_ip_literal("cockpit-11.e2e.bos.redhat.com"));
    }

    #[test]
    fn verification_name_overrides_only_for_literals() {
        let literal = verification_name("10.29.163.169");
        let expected = ServerName::try_from(IP_LITERAL_SERVER_NAME.to_string()).unwrap();
        assert_eq!(literal, expected);

        let hostname = verification_name("example.com");
        let expected = ServerName::try_from("example.com".to_string()).unwrap();
        assert_eq!(hostname, expected);
    }
}
