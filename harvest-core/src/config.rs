use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::browser::LoadMoreSignal;
use crate::error::{ConfigError, Result};
use crate::harvest::FeedKind;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct HarvestConfig {
    pub chromium: ChromiumSection,
    pub flags: FlagsSection,
    pub user_agents: UserAgentSection,
    pub viewport: ViewportSection,
    pub human_simulation: HumanSimulationSection,
    pub session: SessionSection,
    pub feed: FeedSection,
    pub discovery: DiscoverySection,
    pub extraction: ExtractionSection,
}

impl HarvestConfig {
    pub fn validate(&self) -> Result<()> {
        for (kind, tuning) in [
            (FeedKind::Posts, &self.discovery.posts),
            (FeedKind::Reels, &self.discovery.reels),
        ] {
            if tuning.link_pattern.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field: "discovery.link_pattern",
                    reason: format!("{kind} link pattern must not be empty"),
                });
            }
            if tuning.stagnation_threshold == 0 {
                return Err(ConfigError::Invalid {
                    field: "discovery.stagnation_threshold",
                    reason: format!("{kind} stagnation threshold must be at least 1"),
                });
            }
            if tuning.max_attempts == 0 {
                return Err(ConfigError::Invalid {
                    field: "discovery.max_attempts",
                    reason: format!("{kind} attempt cap must be at least 1"),
                });
            }
            if tuning.base_delay_ms > tuning.max_delay_ms {
                return Err(ConfigError::Invalid {
                    field: "discovery.max_delay_ms",
                    reason: format!(
                        "{kind} delay ceiling {} is below base delay {}",
                        tuning.max_delay_ms, tuning.base_delay_ms
                    ),
                });
            }
        }
        if url::Url::parse(&self.session.base_url).is_err() {
            return Err(ConfigError::Invalid {
                field: "session.base_url",
                reason: format!("not an absolute url: {}", self.session.base_url),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChromiumSection {
    pub executable_path: Option<String>,
    pub headless: bool,
    pub sandbox: bool,
    pub disable_gpu: bool,
    pub request_timeout_seconds: Option<u64>,
}

impl Default for ChromiumSection {
    fn default() -> Self {
        Self {
            executable_path: None,
            headless: true,
            sandbox: false,
            disable_gpu: true,
            request_timeout_seconds: Some(20),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlagsSection {
    pub no_first_run: bool,
    pub disable_automation_controlled: bool,
    pub disable_dev_shm_usage: bool,
    pub lang: Option<String>,
    pub accept_language: Option<String>,
}

impl Default for FlagsSection {
    fn default() -> Self {
        Self {
            no_first_run: true,
            disable_automation_controlled: true,
            disable_dev_shm_usage: true,
            lang: Some("en-US".to_string()),
            accept_language: Some("en-US,en;q=0.9".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserAgentSection {
    pub pool: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewportSection {
    pub resolutions: Vec<[u32; 2]>,
    pub jitter_pixels: u32,
    pub device_scale_factor: [f32; 2],
}

impl Default for ViewportSection {
    fn default() -> Self {
        Self {
            resolutions: vec![[1366, 768]],
            jitter_pixels: 0,
            device_scale_factor: [1.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HumanSimulationSection {
    pub mouse_speed_min_px_s: u32,
    pub mouse_speed_max_px_s: u32,
    pub mouse_jitter_px: u32,
    pub scroll_pause_ms: [u32; 2],
}

impl Default for HumanSimulationSection {
    fn default() -> Self {
        Self {
            mouse_speed_min_px_s: 600,
            mouse_speed_max_px_s: 1400,
            mouse_jitter_px: 3,
            scroll_pause_ms: [120, 260],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub base_url: String,
    pub cookie_domain: String,
    pub credential_cookie: String,
    pub csrf_cookie: Option<String>,
    pub landing_path: String,
    pub navigation_timeout_seconds: u64,
    pub settle_ms: u64,
    pub authenticated_indicators: Vec<String>,
    pub login_indicators: Vec<String>,
    pub login_url_fragment: String,
}

impl SessionSection {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_seconds)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            base_url: "https://www.instagram.com".to_string(),
            cookie_domain: ".instagram.com".to_string(),
            credential_cookie: "sessionid".to_string(),
            csrf_cookie: Some("csrftoken".to_string()),
            landing_path: "/".to_string(),
            navigation_timeout_seconds: 30,
            settle_ms: 3000,
            authenticated_indicators: vec![
                "a[href=\"/direct/inbox/\"]".to_string(),
                "a[href*=\"/accounts/edit/\"]".to_string(),
                "button[aria-label=\"New post\"]".to_string(),
                "[data-testid=\"user-avatar\"]".to_string(),
            ],
            login_indicators: vec![
                "input[name=\"username\"]".to_string(),
                "input[type=\"password\"]".to_string(),
            ],
            login_url_fragment: "/accounts/login/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedSection {
    pub navigation_timeout_seconds: u64,
    pub settle_ms: u64,
    pub not_found_signatures: Vec<String>,
    pub private_signatures: Vec<String>,
}

impl FeedSection {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_seconds)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            navigation_timeout_seconds: 20,
            settle_ms: 1200,
            not_found_signatures: vec!["Sorry, this page isn't available".to_string()],
            private_signatures: vec!["This Account is Private".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoverySection {
    pub posts: FeedTuning,
    pub reels: FeedTuning,
}

impl DiscoverySection {
    pub fn for_kind(&self, kind: FeedKind) -> &FeedTuning {
        match kind {
            FeedKind::Posts => &self.posts,
            FeedKind::Reels => &self.reels,
        }
    }
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            posts: FeedTuning {
                link_pattern: "/p/".to_string(),
                feed_path: String::new(),
                stagnation_threshold: 3,
                max_attempts: 100,
                base_delay_ms: 600,
                delay_step_ms: 50,
                max_delay_ms: 1500,
                load_more: LoadMoreSignal::ViewportStep { factor: 1.5 },
            },
            reels: FeedTuning {
                link_pattern: "/reel/".to_string(),
                feed_path: "reels/".to_string(),
                stagnation_threshold: 3,
                max_attempts: 100,
                base_delay_ms: 2000,
                delay_step_ms: 100,
                max_delay_ms: 5000,
                load_more: LoadMoreSignal::ToBottom,
            },
        }
    }
}

/// Discovery knobs for one feed kind.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedTuning {
    pub link_pattern: String,
    #[serde(default)]
    pub feed_path: String,
    pub stagnation_threshold: u32,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub delay_step_ms: u64,
    pub max_delay_ms: u64,
    pub load_more: LoadMoreSignal,
}

impl FeedTuning {
    /// Delay before the next query, growing linearly with the attempt count up to the ceiling.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let grown = self
            .base_delay_ms
            .saturating_add(self.delay_step_ms.saturating_mul(u64::from(attempt)));
        Duration::from_millis(grown.min(self.max_delay_ms))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionSection {
    pub hover_dwell_ms: u64,
    pub container_selector: String,
    pub overlay_selector: String,
    pub overlay_entry_selector: String,
    pub token_selector: String,
    pub max_token_length: usize,
}

impl ExtractionSection {
    pub fn hover_dwell(&self) -> Duration {
        Duration::from_millis(self.hover_dwell_ms)
    }
}

impl Default for ExtractionSection {
    fn default() -> Self {
        Self {
            hover_dwell_ms: 800,
            container_selector: "div".to_string(),
            overlay_selector: "div[style*=\"background: rgba(0, 0, 0, 0.7)\"]".to_string(),
            overlay_entry_selector: "ul li".to_string(),
            token_selector: "span".to_string(),
            max_token_length: 12,
        }
    }
}

pub fn load_harvest_config<P: AsRef<Path>>(path: P) -> Result<HarvestConfig> {
    let config: HarvestConfig = load_toml(path)?;
    config.validate()?;
    Ok(config)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
