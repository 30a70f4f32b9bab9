use anyhow::{bail, Context, Result};
use ipnet::Ipv4Net;
use std::collections::HashSet;
use std::net::Ipv4Addr;

use crate::error::MonitorError;

/// Upper bound on how many hosts one CIDR entry may expand to.
pub const MAX_EXPANDED_HOSTS: usize = 1024;

/// Validate a single target address as typed by the user.
pub fn parse_address(s: &str) -> Result<Ipv4Addr, MonitorError> {
    let trimmed = s.trim();
    trimmed
        .parse::<Ipv4Addr>()
        .map_err(|_| MonitorError::InvalidAddress(trimmed.to_string()))
}

/// Parse a comma and/or whitespace separated list of IPv4 addresses and CIDR ranges.
///
/// CIDRs expand to their host addresses (network and broadcast excluded, `/31`
/// and `/32` kept whole). Duplicates are removed, first occurrence wins.
pub fn parse_target_list(s: &str) -> Result<Vec<Ipv4Addr>> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();

    for item in s.split(|c: char| c == ',' || c.is_whitespace()) {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }

        let hosts = if item.contains('/') {
            let net: Ipv4Net = item
                .parse()
                .with_context(|| format!("invalid CIDR: {item}"))?;
            expand_ipv4net_hosts(net)?
        } else {
            vec![parse_address(item)?]
        };

        for ip in hosts {
            if seen.insert(ip) {
                out.push(ip);
            }
        }
    }

    Ok(out)
}

fn expand_ipv4net_hosts(net: Ipv4Net) -> Result<Vec<Ipv4Addr>> {
    let start = u32::from(net.network());
    let end = u32::from(net.broadcast());
    if net.prefix_len() >= 31 {
        return Ok((start..=end).map(Ipv4Addr::from).collect());
    }
    let count = (end - start - 1) as usize;
    if count > MAX_EXPANDED_HOSTS {
        bail!("{net} expands to {count} hosts, limit is {MAX_EXPANDED_HOSTS}");
    }
    Ok((start + 1..end).map(Ipv4Addr::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage_and_ipv6() {
        assert_eq!(
            parse_address("10.0.0.256"),
            Err(MonitorError::InvalidAddress("10.0.0.256".into()))
        );
        assert!(parse_address("::1").is_err());
        assert_eq!(parse_address(" 10.0.0.1 "), Ok(Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn expand_small_cidr_excludes_network_and_broadcast() {
        let ips = parse_target_list("192.168.1.0/30").unwrap();
        assert_eq!(
            ips,
            vec![Ipv4Addr::new(192, 168, 1, 1), Ipv4Addr::new(192, 168, 1, 2)]
        );
    }

    #[test]
    fn single_host_cidr_is_kept() {
        let ips = parse_target_list("10.1.1.7/32").unwrap();
        assert_eq!(ips, vec![Ipv4Addr::new(10, 1, 1, 7)]);
    }

    #[test]
    fn huge_cidr_is_refused() {
        assert!(parse_target_list("10.0.0.0/8").is_err());
    }
}
