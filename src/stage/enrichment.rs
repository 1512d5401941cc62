//! Enrichment stage: cloud and CDN classification of the assembled data.
//!
//! Pure bookkeeping over data earlier stages produced; no external tool is
//! invoked and nothing here can fail.

use crate::model::{DomainInfo, EnrichmentStats};
use log::info;
use std::net::Ipv4Addr;

/// Coarse cloud provider address blocks, checked in declaration order with
/// first match winning.
const CLOUD_BLOCKS: &[(&str, &[(u32, u8)])] = &[
    ("AWS", &[
        (0x0300_0000, 8),  // 3.0.0.0/8
        (0x0D00_0000, 8),  // 13.0.0.0/8
        (0x1200_0000, 8),  // 18.0.0.0/8
        (0x3400_0000, 8),  // 52.0.0.0/8
        (0x3600_0000, 8),  // 54.0.0.0/8
    ]),
    ("GCP", &[
        (0x2240_0000, 10), // 34.64.0.0/10
        (0x23B8_0000, 13), // 35.184.0.0/13
    ]),
    ("Azure", &[
        (0x0D40_0000, 11), // 13.64.0.0/11
        (0x1400_0000, 8),  // 20.0.0.0/8
        (0x2840_0000, 10), // 40.64.0.0/10
    ]),
    ("Cloudflare", &[
        (0x6810_0000, 12), // 104.16.0.0/12
        (0xAC40_0000, 13), // 172.64.0.0/13
        (0xADF5_3000, 20), // 173.245.48.0/20
    ]),
    ("DigitalOcean", &[
        (0x6883_0000, 16), // 104.131.0.0/16
        (0x9F41_0000, 16), // 159.65.0.0/16
        (0xA763_0000, 16), // 167.99.0.0/16
    ]),
];

/// Substrings in the server header or technology names that identify a CDN.
const CDN_FRAGMENTS: &[(&str, &[&str])] = &[
    ("Cloudflare", &["cloudflare", "cf-ray"]),
    ("Akamai", &["akamai", "akamaihd"]),
    ("Fastly", &["fastly", "x-fastly"]),
    ("CloudFront", &["cloudfront", "x-amz-cf"]),
    ("MaxCDN", &["maxcdn"]),
];

/// Classifies each subdomain's infrastructure in place.
pub struct EnrichmentStage;

impl EnrichmentStage {
    /// Attributes cloud providers from resolved addresses and CDNs from
    /// service fingerprints, then counts both per provider. Always runs.
    pub fn run(domain: &mut DomainInfo) -> EnrichmentStats {
        let mut stats = EnrichmentStats::default();

        for subdomain in &mut domain.subdomains {
            subdomain.cloud_provider = subdomain
                .ips
                .iter()
                .find_map(|ip| classify_cloud(ip))
                .map(str::to_owned);
            subdomain.cdn_provider = subdomain
                .services
                .iter()
                .find_map(|svc| {
                    let mut haystack = svc
                        .server
                        .clone()
                        .unwrap_or_default()
                        .to_ascii_lowercase();
                    for tech in &svc.technologies {
                        haystack.push(' ');
                        haystack.push_str(&tech.name.to_ascii_lowercase());
                    }
                    classify_cdn(&haystack)
                })
                .map(str::to_owned);

            if let Some(provider) = &subdomain.cloud_provider {
                *stats.cloud_providers.entry(provider.clone()).or_default() += 1;
            }
            if let Some(provider) = &subdomain.cdn_provider {
                *stats.cdn_providers.entry(provider.clone()).or_default() += 1;
            }
        }

        info!(
            "enrichment: {} cloud providers, {} cdn providers",
            stats.cloud_providers.len(),
            stats.cdn_providers.len()
        );
        stats
    }
}

fn classify_cloud(ip: &str) -> Option<&'static str> {
    let addr: Ipv4Addr = ip.parse().ok()?;
    let bits = u32::from(addr);
    for (provider, blocks) in CLOUD_BLOCKS {
        for &(network, prefix_len) in *blocks {
            let mask = u32::MAX << (32 - prefix_len);
            if bits & mask == network {
                return Some(provider);
            }
        }
    }
    None
}

fn classify_cdn(haystack: &str) -> Option<&'static str> {
    for (provider, fragments) in CDN_FRAGMENTS {
        if fragments.iter().any(|f| haystack.contains(f)) {
            return Some(provider);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::{classify_cloud, EnrichmentStage};
    use crate::model::{DomainInfo, SecurityHeaders, Service, Subdomain, Technology};
    use chrono::Utc;
    use parameterized::parameterized;

    #[parameterized(ip = {
        "52.1.2.3",
        "34.100.0.1",
        "20.50.60.70",
        "104.16.0.1",
        "159.65.10.10",
    }, provider = { "AWS", "GCP", "Azure", "Cloudflare", "DigitalOcean" })]
    fn cloud_blocks_classify(ip: &str, provider: &str) {
        assert_eq!(classify_cloud(ip), Some(provider));
    }

    #[parameterized(ip = { "8.8.8.8", "192.168.1.1", "::1", "garbage" })]
    fn unknown_addresses_stay_unclassified(ip: &str) {
        assert_eq!(classify_cloud(ip), None);
    }

    #[test]
    fn cdn_detection_reads_server_and_technologies() {
        let mut subdomain = Subdomain::new("cdn.example.com", "subfinder");
        subdomain.ips = vec!["52.0.0.1".to_owned()];
        subdomain.services = vec![Service {
            url: "https://cdn.example.com".to_owned(),
            status_code: Some(200),
            title: None,
            server: Some("cloudflare".to_owned()),
            content_length: None,
            technologies: vec![Technology {
                name: "React".to_owned(),
                version: None,
                category: None,
            }],
            security_headers: SecurityHeaders::default(),
            tls_info: None,
            response_time_ms: None,
            redirects_to: None,
            discovered_at: Utc::now(),
        }];

        let mut domain = DomainInfo {
            root_domain: "example.com".to_owned(),
            subdomains: vec![subdomain],
            dns_records: None,
            whois: None,
            total_subdomains: 1,
            live_subdomains: 0,
        };
        let stats = EnrichmentStage::run(&mut domain);

        assert_eq!(domain.subdomains[0].cloud_provider.as_deref(), Some("AWS"));
        assert_eq!(domain.subdomains[0].cdn_provider.as_deref(), Some("Cloudflare"));
        assert_eq!(stats.cloud_providers["AWS"], 1);
        assert_eq!(stats.cdn_providers["Cloudflare"], 1);
    }
}
