use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::browser::SessionFactory;
use crate::config::HarvestConfig;

use super::aggregate::ResultAggregator;
use super::auth::SessionAuthenticator;
use super::discovery::IncrementalDiscoveryLoop;
use super::error::HarvestResult;
use super::extractor::ItemExtractor;
use super::metrics::SessionMetrics;
use super::navigator::FeedNavigator;
use super::profile::{ProfileInspector, ProfileSummary};
use super::session::{RenderingSession, SessionMode};
use super::types::{
    ExtractionRecord, FeedKind, HarvestRequest, SessionCredential, TargetHandle,
    TerminationReason,
};

#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    pub run_id: Uuid,
    pub target: TargetHandle,
    pub feed: FeedKind,
    pub mode: SessionMode,
    pub termination: TerminationReason,
    pub attempts: u32,
    pub discovered: usize,
    pub records: Vec<ExtractionRecord>,
    pub metrics: SessionMetrics,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl HarvestReport {
    pub fn success_count(&self) -> usize {
        self.records.iter().filter(|record| record.success).count()
    }
}

struct FeedHarvest {
    mode: SessionMode,
    termination: TerminationReason,
    attempts: u32,
    discovered: usize,
    records: Vec<ExtractionRecord>,
}

/// Runs one target through authentication, navigation, discovery, extraction and
/// aggregation on a session of its own.
pub struct HarvestPipeline {
    config: Arc<HarvestConfig>,
    factory: Arc<dyn SessionFactory>,
}

impl HarvestPipeline {
    pub fn new(config: Arc<HarvestConfig>, factory: Arc<dyn SessionFactory>) -> Self {
        Self { config, factory }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub async fn run(&self, request: HarvestRequest) -> HarvestResult<HarvestReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "harvest",
            %run_id,
            handle = %request.target,
            feed = %request.feed
        );
        async move {
            let started_at = Utc::now();
            let mut session = self.open_session(request.credential.as_ref()).await?;
            let outcome = self.harvest_feed(&mut session, &request).await;
            let metrics = session.release().await;
            let harvest = outcome?;

            info!(
                records = harvest.records.len(),
                termination = %harvest.termination,
                "harvest finished"
            );
            Ok(HarvestReport {
                run_id,
                target: request.target,
                feed: request.feed,
                mode: harvest.mode,
                termination: harvest.termination,
                attempts: harvest.attempts,
                discovered: harvest.discovered,
                records: harvest.records,
                metrics,
                started_at,
                finished_at: Utc::now(),
            })
        }
        .instrument(span)
        .await
    }

    pub async fn inspect_profile(
        &self,
        target: &TargetHandle,
        credential: Option<&SessionCredential>,
    ) -> HarvestResult<ProfileSummary> {
        let span = info_span!("inspect", handle = %target);
        async move {
            let mut session = self.open_session(credential).await?;
            let navigator = self.navigator();
            let outcome = ProfileInspector::new(&navigator)
                .inspect(&mut session, target)
                .await;
            session.release().await;
            outcome
        }
        .instrument(span)
        .await
    }

    async fn open_session(
        &self,
        credential: Option<&SessionCredential>,
    ) -> HarvestResult<RenderingSession> {
        SessionAuthenticator::new(self.config.session.clone())
            .authenticate(self.factory.as_ref(), credential)
            .await
    }

    fn navigator(&self) -> FeedNavigator {
        FeedNavigator::new(
            self.config.session.base_url.clone(),
            self.config.feed.clone(),
            self.config.discovery.clone(),
        )
    }

    async fn harvest_feed(
        &self,
        session: &mut RenderingSession,
        request: &HarvestRequest,
    ) -> HarvestResult<FeedHarvest> {
        let loaded = self
            .navigator()
            .navigate(session, &request.target, request.feed)
            .await?;

        let tuning = self.config.discovery.for_kind(loaded.feed).clone();
        let link_pattern = tuning.link_pattern.clone();
        let discovery = IncrementalDiscoveryLoop::new(&self.config.session.base_url, tuning)?
            .discover(session, request.max_items)
            .await?;

        let extractor = ItemExtractor::new(self.config.extraction.clone(), link_pattern);
        let mut items = Vec::with_capacity(discovery.keys.len());
        for (index, key) in discovery.keys.iter().enumerate() {
            items.push(extractor.extract(session, key, index + 1).await);
        }
        let records = ResultAggregator.aggregate(&discovery.keys, items);

        Ok(FeedHarvest {
            mode: session.mode(),
            termination: discovery.termination,
            attempts: discovery.attempts,
            discovered: discovery.discovered,
            records,
        })
    }
}
