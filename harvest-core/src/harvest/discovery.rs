use indexmap::IndexSet;
use tracing::{debug, info};
use url::Url;

use crate::config::FeedTuning;

use super::error::{HarvestError, HarvestResult};
use super::session::RenderingSession;
use super::types::{DiscoveryOutcome, TerminationReason};

/// Keys seen so far plus the loop counters. Lives only for one `discover` call.
#[derive(Debug, Default)]
struct DiscoveryState {
    keys: IndexSet<String>,
    attempts: u32,
    stagnation: u32,
}

impl DiscoveryState {
    /// Inserts every key and returns how many were new.
    fn absorb(&mut self, keys: impl IntoIterator<Item = String>) -> usize {
        let before = self.keys.len();
        self.keys.extend(keys);
        self.keys.len() - before
    }
}

/// Collects item identity keys by repeatedly asking the feed for more content until the
/// target count is met, the feed stops growing, or the attempt cap is hit.
pub struct IncrementalDiscoveryLoop {
    base: Url,
    tuning: FeedTuning,
}

impl IncrementalDiscoveryLoop {
    pub fn new(base_url: &str, tuning: FeedTuning) -> HarvestResult<Self> {
        let base = Url::parse(base_url).map_err(|err| {
            HarvestError::InvalidRequest(format!("invalid base url {base_url}: {err}"))
        })?;
        Ok(Self { base, tuning })
    }

    pub fn tuning(&self) -> &FeedTuning {
        &self.tuning
    }

    pub async fn discover(
        &self,
        session: &mut RenderingSession,
        target_count: usize,
    ) -> HarvestResult<DiscoveryOutcome> {
        let mut state = DiscoveryState::default();
        let mut iterations = 0u32;

        let termination = loop {
            iterations += 1;
            let links = session
                .surface()
                .collect_links(&self.tuning.link_pattern)
                .await?;
            let found = links.len();
            let new_keys = state.absorb(links.iter().filter_map(|href| self.normalize_key(href)));

            if new_keys > 0 {
                state.stagnation = 0;
            } else {
                state.stagnation += 1;
            }
            debug!(
                iteration = iterations,
                found,
                new_keys,
                total = state.keys.len(),
                stagnation = state.stagnation,
                "discovery iteration"
            );

            if state.keys.len() >= target_count {
                break TerminationReason::TargetReached;
            }
            if state.stagnation >= self.tuning.stagnation_threshold {
                break TerminationReason::StagnationExit;
            }

            session
                .surface()
                .trigger_load_more(&self.tuning.load_more)
                .await?;
            session.metrics_mut().record_load_more();
            session
                .pause(self.tuning.delay_for_attempt(state.attempts))
                .await;

            state.attempts += 1;
            if state.attempts >= self.tuning.max_attempts {
                break TerminationReason::BudgetExhausted;
            }
        };

        let discovered = state.keys.len();
        let keys: Vec<String> = state.keys.into_iter().take(target_count).collect();
        info!(
            termination = %termination,
            iterations,
            discovered,
            kept = keys.len(),
            "discovery finished"
        );
        Ok(DiscoveryOutcome {
            keys,
            termination,
            attempts: iterations,
            discovered,
        })
    }

    /// Resolves a raw `href` to its canonical absolute form, dropping query and fragment.
    /// Links that do not carry the item pattern yield `None`.
    pub fn normalize_key(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        let mut url = self.base.join(href).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        if !url.path().contains(&self.tuning.link_pattern) {
            return None;
        }
        url.set_query(None);
        url.set_fragment(None);
        Some(url.into())
    }
}

/// The part of an identity key that is unique to its item, e.g. `/p/ABC123/`. Used to find
/// the item's anchor on the surface.
pub fn identity_segment(identity_key: &str, link_pattern: &str) -> String {
    let path = Url::parse(identity_key)
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| identity_key.to_string());
    match path.find(link_pattern) {
        Some(index) => path[index..].to_string(),
        None => path,
    }
}
