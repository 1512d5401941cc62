//! Active stage: HTTP probing of every discovered name.

use crate::errors::ToolFailure;
use crate::model::{ActiveStats, DomainInfo, SubdomainStatus};
use crate::profile::DepthProfile;
use crate::tools::{parsers, Tools};
use log::{info, warn};
use std::collections::BTreeMap;
use std::time::Duration;

/// Probes every subdomain over HTTP and attaches the answering services.
pub struct ActiveStage<'a> {
    profile: &'a DepthProfile,
}

impl<'a> ActiveStage<'a> {
    /// Builds the stage from the run profile.
    pub fn new(profile: &'a DepthProfile) -> Self {
        Self { profile }
    }

    /// Probes all names, including ones that never resolved, and marks each
    /// subdomain live or dead. Services attach by exact hostname match on
    /// the parsed service URL; a service URL that does not parse is logged
    /// and excluded.
    pub async fn run(
        &self,
        tools: &dyn Tools,
        domain: &mut DomainInfo,
    ) -> Result<ActiveStats, ToolFailure> {
        let targets: Vec<String> = domain.subdomains.iter().map(|s| s.name.clone()).collect();
        if targets.is_empty() {
            return Ok(ActiveStats::default());
        }

        let raw = tools
            .probe_http(
                &targets,
                Duration::from_secs(self.profile.timeouts.http_probe),
            )
            .await?;
        let services = parsers::parse_http_services(&raw);
        let total_services = services.len();

        let mut by_host: BTreeMap<String, Vec<_>> = BTreeMap::new();
        for service in services {
            let host = match url::Url::parse(&service.url) {
                Ok(parsed) => parsed.host_str().map(str::to_ascii_lowercase),
                Err(err) => {
                    warn!("unparsable service url `{}`: {err}", service.url);
                    None
                }
            };
            let Some(host) = host else { continue };
            by_host.entry(host).or_default().push(service);
        }

        for subdomain in &mut domain.subdomains {
            if let Some(attached) = by_host.remove(&subdomain.name) {
                subdomain.services.extend(attached);
            }
            subdomain.status = if subdomain.services.is_empty() {
                SubdomainStatus::Dead
            } else {
                SubdomainStatus::Live
            };
        }
        for host in by_host.keys() {
            warn!("service host `{host}` matches no known subdomain");
        }
        domain.recount();

        info!(
            "active: {total_services} services across {} live subdomains",
            domain.live_subdomains
        );
        Ok(ActiveStats {
            hosts_probed: targets.len(),
            live_services: total_services,
            live_subdomains: domain.live_subdomains,
        })
    }
}
