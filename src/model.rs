//! Canonical data model for a discovery run.
//!
//! Everything the pipeline produces lands in a [`DiscoveryReport`]: the
//! domain tree built up stage by stage, the crawled URL inventory, and the
//! per-stage statistics. All collections serialize deterministically; the
//! same inputs always produce the same report document.

use crate::errors::ConfigError;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde_derive::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use url::Url;
use uuid::Uuid;

/// The six pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    /// Subdomain enumeration, DNS resolution and WHOIS.
    Passive,
    /// HTTP probing of every discovered name.
    Active,
    /// Port scanning of resolved hosts.
    PortDiscovery,
    /// Unauthenticated crawling of live services.
    Deep,
    /// Crawling with credentials applied.
    Authenticated,
    /// Cloud and CDN classification of the assembled data.
    Enrichment,
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Passive => "passive",
            Self::Active => "active",
            Self::PortDiscovery => "port_discovery",
            Self::Deep => "deep",
            Self::Authenticated => "authenticated",
            Self::Enrichment => "enrichment",
        };
        write!(f, "{name}")
    }
}

/// DNS records gathered for one name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecords {
    /// IPv4 addresses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub a: Vec<String>,
    /// IPv6 addresses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aaaa: Vec<String>,
    /// Canonical name, if the host is an alias.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cname: Option<String>,
    /// Mail exchangers. Only queried for the root domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mx: Option<Vec<String>>,
    /// TXT records. Only queried for the root domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txt: Option<Vec<String>>,
    /// Authoritative name servers. Only queried for the root domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ns: Option<Vec<String>>,
}

impl DnsRecords {
    /// All resolved addresses, IPv4 first.
    pub fn addresses(&self) -> Vec<String> {
        let mut out = self.a.clone();
        out.extend(self.aaaa.iter().cloned());
        out
    }
}

/// Liveness of a subdomain as established by HTTP probing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubdomainStatus {
    /// Not yet probed.
    #[default]
    Unknown,
    /// At least one HTTP service answered.
    Live,
    /// Probed, nothing answered.
    Dead,
}

/// A discovered subdomain and everything learned about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subdomain {
    /// Fully qualified name, lowercased.
    pub name: String,
    /// Resolved addresses, IPv4 before IPv6. Empty when the name does not
    /// resolve; such hosts are kept but skipped by port scanning.
    pub ips: Vec<String>,
    /// Liveness after the active stage.
    pub status: SubdomainStatus,
    /// Raw DNS answer, when resolution produced one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_records: Option<DnsRecords>,
    /// Cloud provider classification from enrichment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_provider: Option<String>,
    /// CDN classification from enrichment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cdn_provider: Option<String>,
    /// Open ports found by port discovery, ascending and deduplicated.
    pub open_ports: Vec<u16>,
    /// Count of `open_ports`, kept explicit in the document.
    pub open_ports_count: usize,
    /// HTTP services answering on this name.
    pub services: Vec<Service>,
    /// Which capability first reported the name.
    pub discovered_via: String,
    /// When the name entered the model.
    pub discovered_at: DateTime<Utc>,
}

impl Subdomain {
    /// A freshly enumerated subdomain with nothing resolved yet.
    pub fn new(name: impl Into<String>, discovered_via: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ips: Vec::new(),
            status: SubdomainStatus::Unknown,
            dns_records: None,
            cloud_provider: None,
            cdn_provider: None,
            open_ports: Vec::new(),
            open_ports_count: 0,
            services: Vec::new(),
            discovered_via: discovered_via.into(),
            discovered_at: Utc::now(),
        }
    }
}

/// A detected technology on a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technology {
    /// Product name as reported by fingerprinting.
    pub name: String,
    /// Version string, when detected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Coarse category, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Presence of the common HTTP security headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityHeaders {
    /// `Strict-Transport-Security` value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict_transport_security: Option<String>,
    /// `Content-Security-Policy` value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_security_policy: Option<String>,
    /// `X-Frame-Options` value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_frame_options: Option<String>,
    /// `X-Content-Type-Options` value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_content_type_options: Option<String>,
    /// `X-XSS-Protection` value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_xss_protection: Option<String>,
    /// `Referrer-Policy` value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer_policy: Option<String>,
    /// `Permissions-Policy` value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions_policy: Option<String>,
}

/// TLS details observed while probing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsInfo {
    /// Negotiated protocol version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Negotiated cipher suite.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cipher: Option<String>,
    /// Certificate subject common name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_cn: Option<String>,
    /// Certificate issuer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Certificate expiry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_after: Option<String>,
}

/// One HTTP service that answered a probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    /// Full URL the service answered on.
    pub url: String,
    /// HTTP status code of the probe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Page title, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// `Server` header value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// Response body length.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    /// Fingerprinted technologies.
    pub technologies: Vec<Technology>,
    /// Security header snapshot.
    pub security_headers: SecurityHeaders,
    /// TLS details for https services.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_info: Option<TlsInfo>,
    /// Probe response time in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<f64>,
    /// Final URL after redirects, when the probe was redirected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirects_to: Option<String>,
    /// When the service was observed.
    pub discovered_at: DateTime<Utc>,
}

/// A URL found by crawling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredUrl {
    /// The URL as reported by the crawler.
    pub url: String,
    /// HTTP method, uppercased.
    pub method: String,
    /// Query parameter names, sorted. Values are never stored.
    pub parameters: Vec<String>,
    /// Which crawler pass produced this URL.
    pub source: String,
    /// Whether the request carried credentials.
    pub authenticated: bool,
    /// When the URL was observed.
    pub discovered_at: DateTime<Utc>,
}

/// A form found by crawling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormData {
    /// Page the form was found on.
    pub page_url: String,
    /// Form action target.
    pub action: String,
    /// Form method, uppercased.
    pub method: String,
    /// Input field names.
    pub fields: Vec<String>,
}

/// Crawl results grouped by origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlDiscoveryResult {
    /// Origin (`scheme://host[:port]`) the URLs belong to.
    pub target_url: String,
    /// URLs discovered under the origin.
    pub urls: Vec<DiscoveredUrl>,
    /// Forms discovered under the origin.
    pub forms: Vec<FormData>,
    /// Distinct endpoints among `urls`, per [`endpoint_key`].
    pub unique_endpoints: usize,
}

/// Identity of an endpoint for dedup: method plus path, query values
/// discarded. `GET /search?q=1` and `GET /search?q=2` are one endpoint;
/// `GET /a` and `POST /a` are two.
pub fn endpoint_key(method: &str, raw_url: &str) -> String {
    let method = method.to_ascii_uppercase();
    match Url::parse(raw_url) {
        Ok(url) => format!("{} {}", method, url.path()),
        // Relative or unparsable: strip the query by hand.
        Err(_) => {
            let path = raw_url.split('?').next().unwrap_or(raw_url);
            format!("{method} {path}")
        }
    }
}

/// Number of distinct endpoints among the given URLs.
pub fn count_unique_endpoints(urls: &[DiscoveredUrl]) -> usize {
    urls.iter()
        .map(|u| endpoint_key(&u.method, &u.url))
        .unique()
        .count()
}

/// WHOIS registration data for the root domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoisData {
    /// Registrar name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrar: Option<String>,
    /// Registration date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    /// Expiration date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
    /// Name servers from the registry record.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name_servers: Vec<String>,
}

/// The domain tree assembled by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainInfo {
    /// The root domain under discovery.
    pub root_domain: String,
    /// Discovered subdomains, sorted lexicographically by name.
    pub subdomains: Vec<Subdomain>,
    /// DNS records of the root domain itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_records: Option<DnsRecords>,
    /// WHOIS registration data, when the lookup succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois: Option<WhoisData>,
    /// Count of `subdomains`.
    pub total_subdomains: usize,
    /// Subdomains with `status == Live`, recomputed after probing.
    pub live_subdomains: usize,
}

impl DomainInfo {
    /// Recounts the totals from the subdomain list.
    pub fn recount(&mut self) {
        self.total_subdomains = self.subdomains.len();
        self.live_subdomains = self
            .subdomains
            .iter()
            .filter(|s| s.status == SubdomainStatus::Live)
            .count();
    }
}

/// Passive stage statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassiveStats {
    /// Subdomains kept after dedup and truncation.
    pub subdomains_found: usize,
    /// Subdomains that resolved to at least one address.
    pub subdomains_resolved: usize,
    /// Whether the WHOIS lookup produced data.
    pub whois_captured: bool,
}

/// Active stage statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveStats {
    /// Names probed.
    pub hosts_probed: usize,
    /// Services that answered.
    pub live_services: usize,
    /// Subdomains marked live.
    pub live_subdomains: usize,
}

/// Port discovery statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortStats {
    /// Hosts handed to the scanner.
    pub hosts_scanned: usize,
    /// Hosts skipped for lacking a resolved address.
    pub hosts_skipped: usize,
    /// Ports probed in total across all hosts.
    pub ports_scanned: u64,
    /// Open ports found.
    pub open_ports_found: usize,
}

/// Deep (crawl) stage statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStats {
    /// Services crawled.
    pub services_crawled: usize,
    /// URLs discovered.
    pub urls_discovered: usize,
    /// Distinct endpoints among the discovered URLs.
    pub unique_endpoints: usize,
}

/// Authenticated stage statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthStats {
    /// Targets with credentials that were crawled.
    pub targets_crawled: usize,
    /// Targets whose authenticated crawl failed.
    pub targets_failed: usize,
    /// URLs discovered with credentials applied.
    pub authenticated_urls: usize,
}

/// Enrichment stage statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentStats {
    /// Subdomains attributed to a cloud provider, by provider.
    pub cloud_providers: BTreeMap<String, usize>,
    /// Subdomains attributed to a CDN, by provider.
    pub cdn_providers: BTreeMap<String, usize>,
}

/// All per-stage statistics plus run-level aggregates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    /// Passive stage numbers.
    pub passive: PassiveStats,
    /// Active stage numbers.
    pub active: ActiveStats,
    /// Port discovery numbers.
    pub ports: PortStats,
    /// Deep crawl numbers.
    pub crawl: CrawlStats,
    /// Authenticated crawl numbers.
    pub auth: AuthStats,
    /// Enrichment numbers.
    pub enrichment: EnrichmentStats,
    /// Distinct technology names across all services.
    pub technologies_detected: usize,
}

/// The complete output document of one discovery run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryReport {
    /// The target as given on the command line.
    pub target: String,
    /// Unique identifier for this run.
    pub scan_id: Uuid,
    /// Depth preset name the run used.
    pub depth: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished. `None` while in flight.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Wall-clock duration in seconds, set on finalize.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    /// The domain tree, absent only if the passive stage never ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<DomainInfo>,
    /// Crawl results, one entry per origin.
    pub url_discovery: Vec<UrlDiscoveryResult>,
    /// Per-stage statistics.
    pub statistics: Statistics,
}

impl DiscoveryReport {
    /// A fresh report for `target`, stamped with a new scan id.
    pub fn new(target: impl Into<String>, depth: impl fmt::Display) -> Self {
        Self {
            target: target.into(),
            scan_id: Uuid::new_v4(),
            depth: depth.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            duration_seconds: None,
            domain: None,
            url_discovery: Vec::new(),
            statistics: Statistics::default(),
        }
    }

    /// Stamps the end time, computes the duration, and counts the distinct
    /// technologies across all attached services.
    pub fn finalize(&mut self) {
        let finished = Utc::now();
        self.duration_seconds = Some(
            (finished - self.started_at).num_milliseconds() as f64 / 1000.0,
        );
        self.finished_at = Some(finished);

        if let Some(domain) = &self.domain {
            self.statistics.technologies_detected = domain
                .subdomains
                .iter()
                .flat_map(|s| &s.services)
                .flat_map(|svc| &svc.technologies)
                .map(|t| t.name.as_str())
                .collect::<BTreeSet<_>>()
                .len();
        }
    }
}

/// Extracts the root domain from a target argument.
///
/// Accepts a bare domain, a domain with a path, or a full URL. A leading
/// `www.` label is dropped. Fails when nothing that looks like a hostname
/// remains.
pub fn extract_root_domain(input: &str) -> Result<String, ConfigError> {
    let trimmed = input.trim();
    let host = if trimmed.contains("://") {
        Url::parse(trimmed)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned))
            .ok_or_else(|| ConfigError::InvalidTarget(input.to_owned()))?
    } else {
        trimmed
            .split('/')
            .next()
            .unwrap_or_default()
            .split(':')
            .next()
            .unwrap_or_default()
            .to_owned()
    };

    let host = host.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_owned();

    if host.is_empty() || !host.contains('.') {
        return Err(ConfigError::InvalidTarget(input.to_owned()));
    }
    Ok(host)
}

#[cfg(test)]
mod tests {
    use super::{
        count_unique_endpoints, endpoint_key, extract_root_domain, DiscoveredUrl, DomainInfo,
        Subdomain, SubdomainStatus,
    };
    use chrono::Utc;
    use parameterized::parameterized;

    fn url(method: &str, raw: &str) -> DiscoveredUrl {
        DiscoveredUrl {
            url: raw.to_owned(),
            method: method.to_owned(),
            parameters: Vec::new(),
            source: "crawl".to_owned(),
            authenticated: false,
            discovered_at: Utc::now(),
        }
    }

    #[test]
    fn query_values_do_not_split_endpoints() {
        let urls = vec![
            url("GET", "https://example.com/search?q=1"),
            url("GET", "https://example.com/search?q=2"),
            url("get", "https://example.com/search"),
        ];
        assert_eq!(count_unique_endpoints(&urls), 1);
    }

    #[test]
    fn method_splits_endpoints() {
        let urls = vec![
            url("GET", "https://example.com/a"),
            url("POST", "https://example.com/a"),
        ];
        assert_eq!(count_unique_endpoints(&urls), 2);
    }

    #[test]
    fn relative_urls_still_get_a_key() {
        assert_eq!(endpoint_key("get", "/login?next=/home"), "GET /login");
    }

    #[parameterized(input = {
        "example.com",
        "https://example.com",
        "https://www.example.com/some/path?x=1",
        "EXAMPLE.com/path",
        "example.com:8443",
    })]
    fn root_domain_extraction(input: &str) {
        assert_eq!(extract_root_domain(input).unwrap(), "example.com");
    }

    #[parameterized(input = { "", "localhost", "https://", "   " })]
    fn invalid_targets_are_rejected(input: &str) {
        assert!(extract_root_domain(input).is_err());
    }

    #[test]
    fn recount_tracks_live_subdomains() {
        let mut live = Subdomain::new("a.example.com", "subfinder");
        live.status = SubdomainStatus::Live;
        let dead = Subdomain::new("b.example.com", "subfinder");

        let mut domain = DomainInfo {
            root_domain: "example.com".to_owned(),
            subdomains: vec![live, dead],
            dns_records: None,
            whois: None,
            total_subdomains: 0,
            live_subdomains: 0,
        };
        domain.recount();

        assert_eq!(domain.total_subdomains, 2);
        assert_eq!(domain.live_subdomains, 1);
    }
}
