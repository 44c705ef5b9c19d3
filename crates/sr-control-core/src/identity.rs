//! Host identity: this machine's hostname and address, reverse lookups.

use crate::error::{ControlError, Result};
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr};
use tracing::debug;

/// Parse a well-formed dotted-quad IPv4 address.
pub fn parse_ipv4(input: &str) -> Result<Ipv4Addr> {
    input
        .parse::<Ipv4Addr>()
        .map_err(|_| ControlError::InvalidAddress {
            address: input.to_string(),
        })
}

/// Resolves host names and addresses.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Hostname of this machine.
    async fn local_hostname(&self) -> Result<String>;

    /// IPv4 address this machine's hostname resolves to.
    async fn local_ip(&self) -> Result<Ipv4Addr>;

    /// Hostname registered for `ip`.
    async fn reverse_lookup(&self, ip: Ipv4Addr) -> Result<String>;
}

/// Resolver backed by the operating system's name service.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn local_hostname(&self) -> Result<String> {
        sysinfo::System::host_name().ok_or_else(|| ControlError::NameResolution {
            query: "local hostname".to_string(),
            message: "hostname unavailable".to_string(),
        })
    }

    async fn local_ip(&self) -> Result<Ipv4Addr> {
        let hostname = self.local_hostname().await?;
        let query = hostname.clone();
        let addrs = tokio::task::spawn_blocking(move || dns_lookup::lookup_host(&query))
            .await
            .map_err(|e| ControlError::Other(format!("Lookup task failed: {}", e)))?
            .map_err(|e| ControlError::NameResolution {
                query: hostname.clone(),
                message: e.to_string(),
            })?;

        addrs
            .into_iter()
            .find_map(|addr| match addr {
                IpAddr::V4(v4) => Some(v4),
                IpAddr::V6(_) => None,
            })
            .ok_or_else(|| ControlError::NameResolution {
                query: hostname,
                message: "no IPv4 address".to_string(),
            })
    }

    async fn reverse_lookup(&self, ip: Ipv4Addr) -> Result<String> {
        let name = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&IpAddr::V4(ip)))
            .await
            .map_err(|e| ControlError::Other(format!("Lookup task failed: {}", e)))?
            .map_err(|e| ControlError::NameResolution {
                query: ip.to_string(),
                message: e.to_string(),
            })?;
        debug!("{} resolves to {}", ip, name);
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_addresses() {
        for input in ["127.0.0.1", "10.0.0.2", "192.168.1.254", "0.0.0.0", "255.255.255.255"] {
            assert!(parse_ipv4(input).is_ok(), "{input} should parse");
        }
    }

    #[test]
    fn test_parse_malformed_addresses() {
        for input in ["999.1.1.1", "abc", "", "10.0.0", "10.0.0.1.5", " 10.0.0.1", "::1"] {
            match parse_ipv4(input) {
                Err(ControlError::InvalidAddress { address }) => assert_eq!(address, input),
                other => panic!("{input:?} should be rejected, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_loopback_reverse_lookup_does_not_panic() {
        // Resolution depends on the host's name service; only the call path is checked.
        let _ = SystemResolver.reverse_lookup(Ipv4Addr::LOCALHOST).await;
    }
}
