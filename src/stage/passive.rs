//! Passive stage: subdomain enumeration, DNS resolution and WHOIS.

use crate::errors::ToolFailure;
use crate::model::{DomainInfo, PassiveStats, Subdomain};
use crate::profile::DepthProfile;
use crate::tools::{parsers, DnsRecordType, Tools};
use log::{info, warn};
use std::time::Duration;

/// Builds the initial [`DomainInfo`] without touching the target directly.
pub struct PassiveStage<'a> {
    profile: &'a DepthProfile,
}

impl<'a> PassiveStage<'a> {
    /// Builds the stage from the run profile.
    pub fn new(profile: &'a DepthProfile) -> Self {
        Self { profile }
    }

    /// Enumerates subdomains, resolves DNS for the root and every kept
    /// name, and attempts a WHOIS lookup. WHOIS failure is absorbed.
    pub async fn run(
        &self,
        tools: &dyn Tools,
        root_domain: &str,
    ) -> Result<(DomainInfo, PassiveStats), ToolFailure> {
        let timeouts = &self.profile.timeouts;

        let raw = tools
            .enumerate_subdomains(root_domain, Duration::from_secs(timeouts.subdomain_enum))
            .await?;
        let mut names = parsers::parse_subdomains(&raw);
        // The root itself is tracked on DomainInfo, not as a subdomain.
        names.retain(|name| name.as_str() != root_domain);

        if let Some(max) = self.profile.max_subdomains {
            if names.len() > max {
                info!(
                    "keeping {max} of {} subdomains ({} preset cap)",
                    names.len(),
                    self.profile.depth
                );
                names.truncate(max);
            }
        }
        info!("passive: {} subdomains for {root_domain}", names.len());

        let mut domain = DomainInfo {
            root_domain: root_domain.to_owned(),
            subdomains: names
                .iter()
                .map(|name| Subdomain::new(name.clone(), "subfinder"))
                .collect(),
            dns_records: None,
            whois: None,
            total_subdomains: 0,
            live_subdomains: 0,
        };

        self.resolve_root(tools, &mut domain).await?;
        let resolved = self.resolve_subdomains(tools, &mut domain).await?;
        self.lookup_whois(tools, &mut domain).await;

        domain.recount();
        let stats = PassiveStats {
            subdomains_found: domain.subdomains.len(),
            subdomains_resolved: resolved,
            whois_captured: domain.whois.is_some(),
        };
        Ok((domain, stats))
    }

    async fn resolve_root(
        &self,
        tools: &dyn Tools,
        domain: &mut DomainInfo,
    ) -> Result<(), ToolFailure> {
        let hosts = vec![domain.root_domain.clone()];
        let raw = tools
            .resolve_dns(&hosts, DnsRecordType::ROOT, self.profile.timeouts.dns_duration())
            .await?;
        domain.dns_records = parsers::parse_dns(&raw).remove(&domain.root_domain);
        Ok(())
    }

    async fn resolve_subdomains(
        &self,
        tools: &dyn Tools,
        domain: &mut DomainInfo,
    ) -> Result<usize, ToolFailure> {
        if domain.subdomains.is_empty() {
            return Ok(0);
        }

        let hosts: Vec<String> = domain.subdomains.iter().map(|s| s.name.clone()).collect();
        let raw = tools
            .resolve_dns(
                &hosts,
                DnsRecordType::SUBDOMAIN,
                self.profile.timeouts.dns_duration(),
            )
            .await?;
        let mut records = parsers::parse_dns(&raw);

        let mut resolved = 0;
        for subdomain in &mut domain.subdomains {
            let Some(record) = records.remove(&subdomain.name) else {
                continue;
            };
            subdomain.ips = record.addresses();
            if !subdomain.ips.is_empty() {
                resolved += 1;
            }
            subdomain.dns_records = Some(record);
        }
        Ok(resolved)
    }

    async fn lookup_whois(&self, tools: &dyn Tools, domain: &mut DomainInfo) {
        match tools
            .whois(&domain.root_domain, self.profile.timeouts.dns_duration())
            .await
        {
            Ok(raw) => domain.whois = parsers::parse_whois(&raw),
            Err(err) => warn!("whois lookup failed, continuing without it: {err}"),
        }
    }
}
