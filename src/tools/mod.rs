//! Adapter boundary between the pipeline and the external scanning tools.
//!
//! Stages talk to a [`Tools`] trait with one method per capability, never to
//! a process directly. [`runner::ProcessRunner`] is the production
//! implementation; tests substitute canned outputs.

pub mod parsers;
pub mod runner;

use crate::errors::ToolFailure;
use async_trait::async_trait;
use std::time::Duration;

/// DNS record types a resolution request may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsRecordType {
    /// IPv4 address records.
    A,
    /// IPv6 address records.
    Aaaa,
    /// Mail exchanger records.
    Mx,
    /// TXT records.
    Txt,
    /// Name server records.
    Ns,
}

impl DnsRecordType {
    /// The dnsx flag selecting this record type.
    pub fn flag(self) -> &'static str {
        match self {
            Self::A => "-a",
            Self::Aaaa => "-aaaa",
            Self::Mx => "-mx",
            Self::Txt => "-txt",
            Self::Ns => "-ns",
        }
    }

    /// The record set queried for the root domain.
    pub const ROOT: &'static [Self] = &[Self::A, Self::Aaaa, Self::Mx, Self::Txt, Self::Ns];

    /// The record set queried for subdomains.
    pub const SUBDOMAIN: &'static [Self] = &[Self::A, Self::Aaaa];
}

/// Which ports a scan covers. The full range is only ever selected
/// explicitly, so every selection has an exact ports-per-host count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSelection {
    /// The scanner's top N ports.
    Top(u16),
    /// All 65535 ports.
    FullRange,
}

impl PortSelection {
    /// Exact number of ports probed per host under this selection.
    pub fn ports_per_host(self) -> u64 {
        match self {
            Self::Top(n) => u64::from(n),
            Self::FullRange => 65535,
        }
    }
}

/// Parameters for one port scan invocation.
#[derive(Debug, Clone, Copy)]
pub struct PortScanOptions {
    /// Which ports to probe.
    pub selection: PortSelection,
    /// Packets per second.
    pub rate: u32,
}

/// Parameters for one crawl invocation.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Link depth.
    pub depth: u8,
    /// Whether to execute page scripts while crawling.
    pub javascript: bool,
    /// Whether the crawler may interact with forms.
    pub form_interaction: bool,
    /// Extra request headers, applied to every request.
    pub headers: Vec<(String, String)>,
}

/// One method per external capability. Implementations return the tool's
/// raw stdout; parsing lives in [`parsers`] so stages stay testable against
/// captured output.
#[async_trait]
pub trait Tools: Send + Sync {
    /// Enumerates subdomains of `domain`.
    async fn enumerate_subdomains(
        &self,
        domain: &str,
        timeout: Duration,
    ) -> Result<String, ToolFailure>;

    /// Resolves the given record types for every host.
    async fn resolve_dns(
        &self,
        hosts: &[String],
        records: &[DnsRecordType],
        timeout: Duration,
    ) -> Result<String, ToolFailure>;

    /// Probes every target over HTTP with technology detection.
    async fn probe_http(&self, targets: &[String], timeout: Duration)
        -> Result<String, ToolFailure>;

    /// Scans the given hosts for open ports.
    async fn scan_ports(
        &self,
        hosts: &[String],
        options: PortScanOptions,
        timeout: Duration,
    ) -> Result<String, ToolFailure>;

    /// Crawls the given service URLs.
    async fn crawl(
        &self,
        targets: &[String],
        options: &CrawlOptions,
        timeout: Duration,
    ) -> Result<String, ToolFailure>;

    /// Fetches the WHOIS record for `domain`.
    async fn whois(&self, domain: &str, timeout: Duration) -> Result<String, ToolFailure>;
}
