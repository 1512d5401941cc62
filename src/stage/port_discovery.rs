//! Port discovery stage: network-level scanning of resolved hosts.

use crate::errors::ToolFailure;
use crate::model::{DomainInfo, PortStats};
use crate::profile::{Depth, DepthProfile};
use crate::tools::{parsers, PortScanOptions, PortSelection, Tools};
use log::{info, warn};
use std::collections::BTreeMap;
use std::time::Duration;

/// Hosts above this count make a deep scan fall back from the full port
/// range to the top 10000 ports.
const FULL_RANGE_HOST_LIMIT: usize = 50;

/// Scans every resolved address and attaches open ports to their owners.
pub struct PortDiscoveryStage<'a> {
    profile: &'a DepthProfile,
}

impl<'a> PortDiscoveryStage<'a> {
    /// Builds the stage from the run profile.
    pub fn new(profile: &'a DepthProfile) -> Self {
        Self { profile }
    }

    /// Scans the addresses of subdomains that resolved. Unresolved
    /// subdomains are counted as skipped, never scanned. With nothing
    /// scannable the stage returns zero statistics without invoking the
    /// scanner at all.
    pub async fn run(
        &self,
        tools: &dyn Tools,
        domain: &mut DomainInfo,
    ) -> Result<PortStats, ToolFailure> {
        let skipped = domain.subdomains.iter().filter(|s| s.ips.is_empty()).count();
        if skipped > 0 {
            warn!(
                "skipping {skipped}/{} subdomains with no resolved address",
                domain.subdomains.len()
            );
        }

        // An address shared by several names attributes its ports to all of
        // its owners.
        let mut hosts: Vec<String> = Vec::new();
        let mut owners: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, subdomain) in domain.subdomains.iter().enumerate() {
            for ip in &subdomain.ips {
                if !owners.contains_key(ip) {
                    hosts.push(ip.clone());
                }
                owners.entry(ip.clone()).or_default().push(i);
            }
        }

        if hosts.is_empty() {
            info!("port discovery: nothing to scan");
            return Ok(PortStats {
                hosts_skipped: skipped,
                ..PortStats::default()
            });
        }

        let options = port_config(self.profile, hosts.len());
        let estimate =
            (hosts.len() as f64 * options.selection.ports_per_host() as f64
                / f64::from(options.rate))
                * 1.2;
        info!(
            "port discovery: {} hosts, {} ports each, estimated {:.1}s",
            hosts.len(),
            options.selection.ports_per_host(),
            estimate
        );

        let raw = tools
            .scan_ports(
                &hosts,
                options,
                Duration::from_secs(self.profile.timeouts.port_scan),
            )
            .await?;

        let mut seen = std::collections::BTreeSet::new();
        for (ip, port) in parsers::parse_open_ports(&raw) {
            let Some(indices) = owners.get(&ip) else {
                warn!("open port {port} on unknown address {ip}");
                continue;
            };
            seen.insert((ip, port));
            for &i in indices {
                let ports = &mut domain.subdomains[i].open_ports;
                if !ports.contains(&port) {
                    ports.push(port);
                }
            }
        }
        for subdomain in &mut domain.subdomains {
            subdomain.open_ports.sort_unstable();
            subdomain.open_ports_count = subdomain.open_ports.len();
        }

        Ok(PortStats {
            hosts_scanned: hosts.len(),
            hosts_skipped: skipped,
            ports_scanned: hosts.len() as u64 * options.selection.ports_per_host(),
            open_ports_found: seen.len(),
        })
    }
}

/// Port selection by depth and host count. Deep scans fall back to the top
/// 10000 ports above [`FULL_RANGE_HOST_LIMIT`] hosts so the stage stays
/// inside its deadline.
fn port_config(profile: &DepthProfile, host_count: usize) -> PortScanOptions {
    let selection = match profile.depth {
        Depth::Shallow => PortSelection::Top(100),
        Depth::Normal => PortSelection::Top(1000),
        Depth::Deep if host_count > FULL_RANGE_HOST_LIMIT => PortSelection::Top(10000),
        Depth::Deep => PortSelection::FullRange,
    };
    PortScanOptions {
        selection,
        rate: profile.port_scan_rate,
    }
}
