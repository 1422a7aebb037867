use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::counts::parse_count;
use super::error::HarvestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    Posts,
    Reels,
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FeedKind::Posts => "posts",
            FeedKind::Reels => "reels",
        };
        f.write_str(label)
    }
}

impl FromStr for FeedKind {
    type Err = HarvestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "posts" | "post" | "p" => Ok(FeedKind::Posts),
            "reels" | "reel" => Ok(FeedKind::Reels),
            other => Err(HarvestError::InvalidRequest(format!(
                "unknown feed kind: {other}"
            ))),
        }
    }
}

/// Case-insensitive account handle, stored lower-cased without the leading `@`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TargetHandle(String);

impl TargetHandle {
    pub fn parse(raw: &str) -> Result<Self, HarvestError> {
        let trimmed = raw.trim();
        let handle = trimmed.strip_prefix('@').unwrap_or(trimmed).trim().to_lowercase();
        if handle.is_empty() {
            return Err(HarvestError::InvalidRequest(
                "target handle must not be empty".to_string(),
            ));
        }
        if let Some(bad) = handle
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '.' || *c == '_'))
        {
            return Err(HarvestError::InvalidRequest(format!(
                "target handle contains invalid character {bad:?}"
            )));
        }
        Ok(Self(handle))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque session token supplied by the caller at invocation time.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredential(String);

impl SessionCredential {
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionCredential(<redacted>)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Primary,
    FallbackEnriched,
    Partial,
    Failed,
}

impl ExtractionStatus {
    pub fn is_success(self) -> bool {
        self != ExtractionStatus::Failed
    }
}

impl fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExtractionStatus::Primary => "primary",
            ExtractionStatus::FallbackEnriched => "fallback_enriched",
            ExtractionStatus::Partial => "partial",
            ExtractionStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub identity_key: String,
    pub sequence_number: usize,
    pub thumbnail: Option<String>,
    pub text: Option<String>,
    pub likes_raw: Option<String>,
    pub comments_raw: Option<String>,
    pub status: ExtractionStatus,
}

impl ContentItem {
    /// Item whose container could not be located on the surface.
    pub fn unlocated(identity_key: impl Into<String>, sequence_number: usize) -> Self {
        Self {
            identity_key: identity_key.into(),
            sequence_number,
            thumbnail: None,
            text: None,
            likes_raw: None,
            comments_raw: None,
            status: ExtractionStatus::Partial,
        }
    }

    pub fn failed(identity_key: impl Into<String>, sequence_number: usize) -> Self {
        Self {
            status: ExtractionStatus::Failed,
            ..Self::unlocated(identity_key, sequence_number)
        }
    }

    pub fn counts_missing(&self) -> bool {
        self.likes_raw.is_none() || self.comments_raw.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    #[serde(flatten)]
    pub item: ContentItem,
    pub success: bool,
}

impl ExtractionRecord {
    pub fn new(item: ContentItem) -> Self {
        let success = item.status.is_success();
        Self { item, success }
    }

    pub fn likes(&self) -> Option<u64> {
        self.item.likes_raw.as_deref().and_then(parse_count)
    }

    pub fn comments(&self) -> Option<u64> {
        self.item.comments_raw.as_deref().and_then(parse_count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    TargetReached,
    StagnationExit,
    BudgetExhausted,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TerminationReason::TargetReached => "target_reached",
            TerminationReason::StagnationExit => "stagnation_exit",
            TerminationReason::BudgetExhausted => "budget_exhausted",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryOutcome {
    /// Identity keys in first-seen order, truncated to the requested count.
    pub keys: Vec<String>,
    pub termination: TerminationReason,
    /// Iterations run, including the terminating one.
    pub attempts: u32,
    /// Unique keys seen before truncation.
    pub discovered: usize,
}

#[derive(Debug, Clone)]
pub struct HarvestRequest {
    pub target: TargetHandle,
    pub feed: FeedKind,
    pub max_items: usize,
    pub credential: Option<SessionCredential>,
}

impl HarvestRequest {
    pub fn new(
        target: &str,
        feed: FeedKind,
        max_items: usize,
        credential: Option<SessionCredential>,
    ) -> Result<Self, HarvestError> {
        if max_items == 0 {
            return Err(HarvestError::InvalidRequest(
                "max_items must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            target: TargetHandle::parse(target)?,
            feed,
            max_items,
            credential,
        })
    }
}
