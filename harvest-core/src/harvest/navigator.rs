use serde::Serialize;
use tracing::{debug, info};

use crate::config::{DiscoverySection, FeedSection};

use super::error::{HarvestError, HarvestResult};
use super::session::{resolve_url, RenderingSession};
use super::types::{FeedKind, TargetHandle};

/// Terminal classification of a loaded profile or feed surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    NotFound,
    Private,
    Available,
}

/// Proof that a feed surface was loaded and is open for discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLoaded {
    pub url: String,
    pub feed: FeedKind,
}

pub struct FeedNavigator {
    base_url: String,
    feed: FeedSection,
    discovery: DiscoverySection,
}

impl FeedNavigator {
    pub fn new(
        base_url: impl Into<String>,
        feed: FeedSection,
        discovery: DiscoverySection,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            feed,
            discovery,
        }
    }

    pub fn feed_url(&self, target: &TargetHandle, kind: FeedKind) -> HarvestResult<String> {
        let suffix = &self.discovery.for_kind(kind).feed_path;
        resolve_url(&self.base_url, &format!("{target}/{suffix}"))
    }

    pub fn profile_url(&self, target: &TargetHandle) -> HarvestResult<String> {
        resolve_url(&self.base_url, &format!("{target}/"))
    }

    /// Loads the feed and refuses to hand it over when the target is missing or private.
    pub async fn navigate(
        &self,
        session: &mut RenderingSession,
        target: &TargetHandle,
        kind: FeedKind,
    ) -> HarvestResult<PageLoaded> {
        let url = self.feed_url(target, kind)?;
        match self.load(session, &url).await? {
            PageState::NotFound => Err(HarvestError::ProfileNotFound {
                handle: target.to_string(),
            }),
            PageState::Private => Err(HarvestError::PrivateProfile {
                handle: target.to_string(),
            }),
            PageState::Available => {
                info!(handle = %target, feed = %kind, url = %url, "feed loaded");
                Ok(PageLoaded { url, feed: kind })
            }
        }
    }

    /// Loads `url`, lets it settle and classifies what was rendered.
    pub async fn load(
        &self,
        session: &mut RenderingSession,
        url: &str,
    ) -> HarvestResult<PageState> {
        session.navigate(url, self.feed.navigation_timeout()).await?;
        session.pause(self.feed.settle_delay()).await;
        let text = session.surface().read_text().await?;
        let state = self.classify(&text);
        debug!(url = %url, state = ?state, "page classified");
        Ok(state)
    }

    pub fn classify(&self, text: &str) -> PageState {
        let haystack = text.to_lowercase();
        let matches = |signatures: &[String]| {
            signatures
                .iter()
                .any(|signature| haystack.contains(&signature.to_lowercase()))
        };
        if matches(self.feed.not_found_signatures.as_slice()) {
            PageState::NotFound
        } else if matches(self.feed.private_signatures.as_slice()) {
            PageState::Private
        } else {
            PageState::Available
        }
    }
}
