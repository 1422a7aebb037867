//! Discovery-and-extraction pipeline over a rendered content feed.
//!
//! A run authenticates a [`RenderingSession`], loads the target's feed, collects item identity
//! keys until the feed converges and then extracts one [`ExtractionRecord`] per key. Per-item
//! failures stay on their record; only session, navigation and engine failures end a run.

mod aggregate;
mod auth;
pub mod counts;
mod discovery;
mod error;
mod extractor;
mod metrics;
mod navigator;
mod pipeline;
mod profile;
mod session;
mod types;

pub use aggregate::ResultAggregator;
pub use auth::{SessionAuthenticator, VerificationSignals};
pub use counts::parse_count;
pub use discovery::{identity_segment, IncrementalDiscoveryLoop};
pub use error::{HarvestError, HarvestResult, ItemExtractionError};
pub use extractor::ItemExtractor;
pub use metrics::SessionMetrics;
pub use navigator::{FeedNavigator, PageLoaded, PageState};
pub use pipeline::{HarvestPipeline, HarvestReport};
pub use profile::{ProfileInspector, ProfileSummary};
pub use session::{AuthState, RenderingSession, SessionMode};
pub use types::{
    ContentItem, DiscoveryOutcome, ExtractionRecord, ExtractionStatus, FeedKind, HarvestRequest,
    SessionCredential, TargetHandle, TerminationReason,
};
