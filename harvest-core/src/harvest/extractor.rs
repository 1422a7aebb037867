use tracing::{debug, trace, warn};

use crate::browser::{BrowserError, OverlaySnapshot};
use crate::config::ExtractionSection;

use super::counts::{find_tagged_count, is_count_token, CountTag};
use super::discovery::identity_segment;
use super::error::ItemExtractionError;
use super::session::RenderingSession;
use super::types::{ContentItem, ExtractionStatus};

/// Reads one record per identity key: a structural pass over the item's container, then an
/// interactive pass when the engagement counts are still missing.
pub struct ItemExtractor {
    config: ExtractionSection,
    link_pattern: String,
}

impl ItemExtractor {
    pub fn new(config: ExtractionSection, link_pattern: impl Into<String>) -> Self {
        Self {
            config,
            link_pattern: link_pattern.into(),
        }
    }

    /// Never fails: any error is recorded on the returned item as [`ExtractionStatus::Failed`].
    pub async fn extract(
        &self,
        session: &mut RenderingSession,
        identity_key: &str,
        sequence: usize,
    ) -> ContentItem {
        let item = match self.try_extract(session, identity_key, sequence).await {
            Ok(item) => item,
            Err(err) => {
                warn!(error = %err, "item extraction failed");
                ContentItem::failed(identity_key, sequence)
            }
        };
        session.metrics_mut().record_item(item.status);
        item
    }

    pub async fn try_extract(
        &self,
        session: &mut RenderingSession,
        identity_key: &str,
        sequence: usize,
    ) -> Result<ContentItem, ItemExtractionError> {
        let wrap = |source: BrowserError| ItemExtractionError {
            identity_key: identity_key.to_string(),
            sequence,
            source,
        };
        let segment = identity_segment(identity_key, &self.link_pattern);

        let mut item = self
            .primary(session, identity_key, sequence, &segment)
            .await
            .map_err(wrap)?;
        if item.counts_missing() {
            self.enrich(session, &mut item, &segment)
                .await
                .map_err(wrap)?;
        }
        debug!(
            sequence,
            status = %item.status,
            likes = item.likes_raw.as_deref().unwrap_or("-"),
            comments = item.comments_raw.as_deref().unwrap_or("-"),
            "item extracted"
        );
        Ok(item)
    }

    async fn primary(
        &self,
        session: &mut RenderingSession,
        identity_key: &str,
        sequence: usize,
        segment: &str,
    ) -> Result<ContentItem, BrowserError> {
        let Some(snapshot) = session.surface().find_by_key_substring(segment).await? else {
            trace!(segment, "no container for item");
            return Ok(ContentItem::unlocated(identity_key, sequence));
        };
        Ok(ContentItem {
            identity_key: identity_key.to_string(),
            sequence_number: sequence,
            thumbnail: non_empty(snapshot.thumbnail),
            likes_raw: find_tagged_count(&snapshot.text, CountTag::Likes),
            comments_raw: find_tagged_count(&snapshot.text, CountTag::Comments),
            text: non_empty(snapshot.alt_text),
            status: ExtractionStatus::Primary,
        })
    }

    async fn enrich(
        &self,
        session: &mut RenderingSession,
        item: &mut ContentItem,
        segment: &str,
    ) -> Result<(), BrowserError> {
        if !session.surface().simulate_focus(segment).await? {
            trace!(segment, "no anchor to focus");
            return Ok(());
        }
        session.metrics_mut().record_focus();
        session.pause(self.config.hover_dwell()).await;
        let overlay = session.surface().read_overlay().await?;
        session.metrics_mut().record_overlay_read();

        let (likes, comments) = self.count_pair(&overlay);
        let mut populated = false;
        if item.likes_raw.is_none() && likes.is_some() {
            item.likes_raw = likes;
            populated = true;
        }
        if item.comments_raw.is_none() && comments.is_some() {
            item.comments_raw = comments;
            populated = true;
        }
        if populated {
            item.status = ExtractionStatus::FallbackEnriched;
        }
        Ok(())
    }

    /// Likes from the first overlay entry and comments from the second. A slot the overlay
    /// leaves empty takes the matching token from the surface scan, which only counts when it
    /// finds at least two count-like tokens.
    fn count_pair(&self, overlay: &OverlaySnapshot) -> (Option<String>, Option<String>) {
        let entry = |index: usize| {
            overlay
                .entries
                .as_ref()
                .and_then(|entries| entries.get(index))
                .and_then(|raw| self.count_token(raw))
        };
        let mut likes = entry(0);
        let mut comments = entry(1);
        if likes.is_none() || comments.is_none() {
            let tokens: Vec<String> = overlay
                .tokens
                .iter()
                .filter_map(|raw| self.count_token(raw))
                .collect();
            if let [first, second, ..] = tokens.as_slice() {
                likes = likes.or_else(|| Some(first.clone()));
                comments = comments.or_else(|| Some(second.clone()));
            }
        }
        (likes, comments)
    }

    fn count_token(&self, raw: &str) -> Option<String> {
        let token = raw.trim();
        (token.len() <= self.config.max_token_length && is_count_token(token))
            .then(|| token.to_string())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
