//! Authenticated stage: crawling with credentials applied.

use crate::auth::AuthConfig;
use crate::model::{AuthStats, UrlDiscoveryResult};
use crate::profile::DepthProfile;
use crate::stage::deep::group_by_origin;
use crate::tools::{parsers, CrawlOptions, Tools};
use futures::stream::{self, StreamExt};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Re-crawls each configured target with its credentials as request
/// headers. Runs only when an authentication config was supplied.
pub struct AuthenticatedStage<'a> {
    profile: &'a DepthProfile,
    auth: &'a AuthConfig,
}

impl<'a> AuthenticatedStage<'a> {
    /// Builds the stage from the run profile and loaded credentials.
    pub fn new(profile: &'a DepthProfile, auth: &'a AuthConfig) -> Self {
        Self { profile, auth }
    }

    /// Crawls every configured target, at most `parallel` at a time. A
    /// failed target is logged and counted, never fatal; the stage itself
    /// cannot fail.
    pub async fn run(&self, tools: Arc<dyn Tools>) -> (Vec<UrlDiscoveryResult>, AuthStats) {
        let crawl_timeout = Duration::from_secs(self.profile.timeouts.crawl);

        let jobs = self.auth.targets.iter().map(|(target, credentials)| {
            let tools = Arc::clone(&tools);
            let options = CrawlOptions {
                depth: self.profile.crawl_depth,
                javascript: self.profile.javascript_execution,
                form_interaction: self.profile.form_interaction,
                headers: credentials.headers(),
            };
            async move {
                let targets = vec![target.clone()];
                let outcome = tools.crawl(&targets, &options, crawl_timeout).await;
                (target.clone(), outcome)
            }
        });

        // Completion order is arbitrary; everything is collected and sorted
        // afterwards so the report stays deterministic.
        let active: Vec<_> = stream::iter(jobs)
            .buffer_unordered(self.profile.parallel)
            .collect()
            .await;

        let mut results = Vec::new();
        let mut stats = AuthStats::default();

        for (target, outcome) in active {
            match outcome {
                Ok(raw) => {
                    let mut grouped = group_by_origin(parsers::parse_crawl(&raw), true);
                    for result in &mut grouped {
                        for url in &mut result.urls {
                            url.source = if url.source == "javascript" {
                                "auth_js_analysis".to_owned()
                            } else {
                                "auth_crawl".to_owned()
                            };
                        }
                    }
                    stats.targets_crawled += 1;
                    stats.authenticated_urls += grouped.iter().map(|r| r.urls.len()).sum::<usize>();
                    results.extend(grouped);
                }
                Err(err) => {
                    warn!("authenticated crawl of `{target}` failed: {err}");
                    stats.targets_failed += 1;
                }
            }
        }

        results.sort_by(|a, b| a.target_url.cmp(&b.target_url));
        info!(
            "authenticated: {} urls from {} targets ({} failed)",
            stats.authenticated_urls, stats.targets_crawled, stats.targets_failed
        );
        (results, stats)
    }
}
