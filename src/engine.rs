//! The discovery engine: runs the stages strictly in order.

use crate::auth::AuthConfig;
use crate::errors::PipelineError;
use crate::model::{DiscoveryReport, StageName};
use crate::profile::DepthProfile;
use crate::stage::{
    ActiveStage, AuthenticatedStage, DeepStage, EnrichmentStage, PassiveStage, PortDiscoveryStage,
};
use crate::tools::Tools;
use log::{info, warn};
use std::sync::Arc;

/// Orchestrates one discovery run.
///
/// Stages run strictly one after another because each consumes what the
/// previous one produced. When the passive stage finds no subdomains the
/// active, port and deep stages are skipped; the authenticated stage runs
/// only when credentials were supplied; enrichment always runs.
pub struct DiscoveryEngine {
    profile: DepthProfile,
    tools: Arc<dyn Tools>,
    auth: Option<AuthConfig>,
}

impl DiscoveryEngine {
    /// An engine without credentials; the authenticated stage is skipped.
    pub fn new(profile: DepthProfile, tools: Arc<dyn Tools>) -> Self {
        Self {
            profile,
            tools,
            auth: None,
        }
    }

    /// Adds credentials, enabling the authenticated stage.
    #[must_use]
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Runs the whole pipeline against `target` and returns the finalized
    /// report. A stage that cannot run at all halts the pipeline with a
    /// [`PipelineError`] naming it.
    pub async fn discover(&self, target: &str, root_domain: &str) -> Result<DiscoveryReport, PipelineError> {
        let mut report = DiscoveryReport::new(target, self.profile.depth);
        info!("scan {} starting for {root_domain} ({} depth)", report.scan_id, self.profile.depth);

        let (mut domain, passive_stats) = PassiveStage::new(&self.profile)
            .run(self.tools.as_ref(), root_domain)
            .await
            .map_err(PipelineError::in_stage(StageName::Passive))?;
        report.statistics.passive = passive_stats;

        if domain.subdomains.is_empty() {
            warn!("no subdomains found for {root_domain}, skipping probe, port and crawl stages");
        } else {
            report.statistics.active = ActiveStage::new(&self.profile)
                .run(self.tools.as_ref(), &mut domain)
                .await
                .map_err(PipelineError::in_stage(StageName::Active))?;

            report.statistics.ports = PortDiscoveryStage::new(&self.profile)
                .run(self.tools.as_ref(), &mut domain)
                .await
                .map_err(PipelineError::in_stage(StageName::PortDiscovery))?;

            let (url_discovery, crawl_stats) = DeepStage::new(&self.profile)
                .run(self.tools.as_ref(), &domain)
                .await
                .map_err(PipelineError::in_stage(StageName::Deep))?;
            report.url_discovery = url_discovery;
            report.statistics.crawl = crawl_stats;
        }

        if let Some(auth) = &self.auth {
            let (authenticated, auth_stats) = AuthenticatedStage::new(&self.profile, auth)
                .run(Arc::clone(&self.tools))
                .await;
            report.url_discovery.extend(authenticated);
            report.statistics.auth = auth_stats;
        }

        report.statistics.enrichment = EnrichmentStage::run(&mut domain);

        report.domain = Some(domain);
        report.finalize();
        info!(
            "scan {} done in {:.2}s",
            report.scan_id,
            report.duration_seconds.unwrap_or_default()
        );
        Ok(report)
    }
}
