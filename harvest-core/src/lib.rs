pub mod browser;
pub mod config;
pub mod error;
pub mod harvest;

pub use config::{load_harvest_config, FeedTuning, HarvestConfig};
pub use error::{ConfigError, Result};
pub use harvest::{
    ExtractionRecord, ExtractionStatus, FeedKind, HarvestError, HarvestPipeline, HarvestReport,
    HarvestRequest, HarvestResult, ProfileSummary, SessionCredential, TargetHandle,
    TerminationReason,
};
