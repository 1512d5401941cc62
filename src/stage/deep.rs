//! Deep stage: unauthenticated crawling of live services.

use crate::errors::ToolFailure;
use crate::model::{
    count_unique_endpoints, CrawlStats, DiscoveredUrl, DomainInfo, UrlDiscoveryResult,
};
use crate::profile::DepthProfile;
use crate::tools::{parsers, CrawlOptions, Tools};
use chrono::Utc;
use log::{info, warn};
use std::collections::BTreeMap;
use std::time::Duration;

/// Crawls the live services found by the active stage.
pub struct DeepStage<'a> {
    profile: &'a DepthProfile,
}

impl<'a> DeepStage<'a> {
    /// Builds the stage from the run profile.
    pub fn new(profile: &'a DepthProfile) -> Self {
        Self { profile }
    }

    /// Crawls up to `max_crawl_services` live service URLs and groups the
    /// discovered URLs by origin. With no live services the stage returns
    /// zero statistics without invoking the crawler.
    pub async fn run(
        &self,
        tools: &dyn Tools,
        domain: &DomainInfo,
    ) -> Result<(Vec<UrlDiscoveryResult>, CrawlStats), ToolFailure> {
        let mut targets: Vec<String> = domain
            .subdomains
            .iter()
            .flat_map(|s| &s.services)
            .map(|svc| svc.url.clone())
            .collect();
        if targets.len() > self.profile.max_crawl_services {
            info!(
                "crawling {} of {} services ({} preset cap)",
                self.profile.max_crawl_services,
                targets.len(),
                self.profile.depth
            );
            targets.truncate(self.profile.max_crawl_services);
        }
        if targets.is_empty() {
            return Ok((Vec::new(), CrawlStats::default()));
        }

        let options = CrawlOptions {
            depth: self.profile.crawl_depth,
            javascript: self.profile.javascript_execution,
            form_interaction: self.profile.form_interaction,
            headers: Vec::new(),
        };
        let raw = tools
            .crawl(
                &targets,
                &options,
                Duration::from_secs(self.profile.timeouts.crawl),
            )
            .await?;

        let results = group_by_origin(parsers::parse_crawl(&raw), false);
        let urls_discovered: usize = results.iter().map(|r| r.urls.len()).sum();
        let unique_endpoints: usize = results.iter().map(|r| r.unique_endpoints).sum();
        info!(
            "deep: {urls_discovered} urls, {unique_endpoints} unique endpoints across {} origins",
            results.len()
        );

        Ok((
            results,
            CrawlStats {
                services_crawled: targets.len(),
                urls_discovered,
                unique_endpoints,
            },
        ))
    }
}

/// Groups crawl records into one [`UrlDiscoveryResult`] per origin
/// (`scheme://host[:port]`). Records whose URL does not parse are logged
/// and dropped. Origins come out in sorted order.
pub(crate) fn group_by_origin(
    records: Vec<parsers::CrawlRecord>,
    authenticated: bool,
) -> Vec<UrlDiscoveryResult> {
    let mut groups: BTreeMap<String, Vec<DiscoveredUrl>> = BTreeMap::new();

    for record in records {
        let parsed = match url::Url::parse(&record.url) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("dropping unparsable crawled url `{}`: {err}", record.url);
                continue;
            }
        };
        let Some(host) = parsed.host_str() else {
            warn!("dropping crawled url without a host: `{}`", record.url);
            continue;
        };
        let origin = match parsed.port() {
            Some(port) => format!("{}://{host}:{port}", parsed.scheme()),
            None => format!("{}://{host}", parsed.scheme()),
        };

        let mut parameters: Vec<String> = parsed
            .query_pairs()
            .map(|(name, _)| name.into_owned())
            .collect();
        parameters.sort();
        parameters.dedup();

        groups.entry(origin).or_default().push(DiscoveredUrl {
            url: record.url,
            method: record.method,
            parameters,
            source: record.source,
            authenticated,
            discovered_at: Utc::now(),
        });
    }

    groups
        .into_iter()
        .map(|(target_url, urls)| UrlDiscoveryResult {
            unique_endpoints: count_unique_endpoints(&urls),
            target_url,
            urls,
            forms: Vec::new(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{group_by_origin, DeepStage};
    use crate::errors::ToolFailure;
    use crate::model::{DomainInfo, Service, SecurityHeaders, Subdomain, SubdomainStatus};
    use crate::profile::{resolve, Depth, ProfileOverrides};
    use crate::tools::parsers::CrawlRecord;
    use crate::tools::{CrawlOptions, DnsRecordType, PortScanOptions, Tools};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::time::Duration;

    fn record(method: &str, url: &str) -> CrawlRecord {
        CrawlRecord {
            url: url.to_owned(),
            method: method.to_owned(),
            source: "crawl".to_owned(),
        }
    }

    #[test]
    fn records_group_by_origin_with_sorted_parameters() {
        let results = group_by_origin(
            vec![
                record("GET", "https://b.example.com/x"),
                record("GET", "https://a.example.com/search?z=1&a=2"),
                record("GET", "https://a.example.com/search?z=9"),
                record("GET", "not a url"),
            ],
            false,
        );

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].target_url, "https://a.example.com");
        assert_eq!(results[0].urls.len(), 2);
        assert_eq!(results[0].unique_endpoints, 1);
        assert_eq!(results[0].urls[0].parameters, vec!["a", "z"]);
        assert_eq!(results[1].target_url, "https://b.example.com");
    }

    struct Canned {
        katana: String,
        options_seen: Mutex<Option<CrawlOptions>>,
    }

    #[async_trait]
    impl Tools for Canned {
        async fn enumerate_subdomains(
            &self,
            _domain: &str,
            _timeout: Duration,
        ) -> Result<String, ToolFailure> {
            Ok(String::new())
        }

        async fn resolve_dns(
            &self,
            _hosts: &[String],
            _records: &[DnsRecordType],
            _timeout: Duration,
        ) -> Result<String, ToolFailure> {
            Ok(String::new())
        }

        async fn probe_http(
            &self,
            _targets: &[String],
            _timeout: Duration,
        ) -> Result<String, ToolFailure> {
            Ok(String::new())
        }

        async fn scan_ports(
            &self,
            _hosts: &[String],
            _options: PortScanOptions,
            _timeout: Duration,
        ) -> Result<String, ToolFailure> {
            Ok(String::new())
        }

        async fn crawl(
            &self,
            _targets: &[String],
            options: &CrawlOptions,
            _timeout: Duration,
        ) -> Result<String, ToolFailure> {
            *self.options_seen.lock().unwrap() = Some(options.clone());
            Ok(self.katana.clone())
        }

        async fn whois(&self, _domain: &str, _timeout: Duration) -> Result<String, ToolFailure> {
            Ok(String::new())
        }
    }

    fn live_domain(service_urls: &[&str]) -> DomainInfo {
        let mut subdomain = Subdomain::new("api.example.com", "subfinder");
        subdomain.status = SubdomainStatus::Live;
        subdomain.services = service_urls
            .iter()
            .map(|url| Service {
                url: (*url).to_owned(),
                status_code: Some(200),
                title: None,
                server: None,
                content_length: None,
                technologies: Vec::new(),
                security_headers: SecurityHeaders::default(),
                tls_info: None,
                response_time_ms: None,
                redirects_to: None,
                discovered_at: Utc::now(),
            })
            .collect();
        DomainInfo {
            root_domain: "example.com".to_owned(),
            subdomains: vec![subdomain],
            dns_records: None,
            whois: None,
            total_subdomains: 1,
            live_subdomains: 1,
        }
    }

    #[tokio::test]
    async fn crawl_depth_follows_the_profile() {
        let profile = resolve(Depth::Deep, &ProfileOverrides::default()).unwrap();
        let domain = live_domain(&["https://api.example.com"]);
        let tools = Canned {
            katana: r#"{"request":{"method":"GET","endpoint":"https://api.example.com/v1"}}"#
                .to_owned(),
            options_seen: Mutex::new(None),
        };

        let (results, stats) = DeepStage::new(&profile).run(&tools, &domain).await.unwrap();

        let options = tools.options_seen.lock().unwrap().clone().unwrap();
        assert_eq!(options.depth, 5);
        assert!(options.javascript);
        assert!(options.form_interaction);
        assert_eq!(results.len(), 1);
        assert_eq!(stats.services_crawled, 1);
        assert_eq!(stats.urls_discovered, 1);
    }

    #[tokio::test]
    async fn service_cap_limits_crawl_targets() {
        let overrides = ProfileOverrides {
            max_crawl_services: Some(1),
            ..ProfileOverrides::default()
        };
        let profile = resolve(Depth::Normal, &overrides).unwrap();
        let domain = live_domain(&["https://api.example.com", "http://api.example.com"]);
        let tools = Canned {
            katana: String::new(),
            options_seen: Mutex::new(None),
        };

        let (_, stats) = DeepStage::new(&profile).run(&tools, &domain).await.unwrap();
        assert_eq!(stats.services_crawled, 1);
    }
}
