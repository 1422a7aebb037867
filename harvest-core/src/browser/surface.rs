//! Capability interface over a rendered page.
//!
//! The harvest pipeline only talks to the rendering engine through [`RenderedSurface`], so the
//! engine behind it (Chromium today, a scripted fake in tests) can be swapped without touching
//! discovery or extraction logic.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::BrowserResult;

/// Progressive-loading signal sent to the surface between discovery queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum LoadMoreSignal {
    /// Scroll down by `factor` viewport heights.
    ViewportStep { factor: f64 },
    /// Jump to the end of the document, then nudge by one more viewport.
    ToBottom,
}

/// A cookie to seed into the session before verification.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub http_only: bool,
    pub same_site_none: bool,
}

impl std::fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCookie")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .field("domain", &self.domain)
            .finish()
    }
}

/// Structural view of the grid container holding one item link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ItemSnapshot {
    pub thumbnail: Option<String>,
    pub alt_text: Option<String>,
    #[serde(default)]
    pub text: String,
}

/// What the surface shows after a focus interaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OverlaySnapshot {
    /// Ordered overlay entries, `None` when no overlay was rendered.
    #[serde(default)]
    pub entries: Option<Vec<String>>,
    /// Short text tokens found anywhere on the surface, in document order.
    #[serde(default)]
    pub tokens: Vec<String>,
}

/// Raw header fields of a profile surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfileHeaderSnapshot {
    pub avatar: Option<String>,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub text: String,
}

#[async_trait(?Send)]
pub trait RenderedSurface {
    async fn goto(&mut self, url: &str, timeout: Duration) -> BrowserResult<()>;
    async fn apply_cookies(&mut self, cookies: &[SessionCookie]) -> BrowserResult<()>;
    async fn current_url(&mut self) -> BrowserResult<String>;
    /// Visible text of the whole surface.
    async fn read_text(&mut self) -> BrowserResult<String>;
    async fn has_any(&mut self, selectors: &[String]) -> BrowserResult<bool>;
    /// Raw `href` values of every anchor whose link contains `fragment`.
    async fn collect_links(&mut self, fragment: &str) -> BrowserResult<Vec<String>>;
    async fn find_by_key_substring(&mut self, segment: &str) -> BrowserResult<Option<ItemSnapshot>>;
    /// Moves focus onto the anchor matching `segment`; `false` when no anchor exists.
    async fn simulate_focus(&mut self, segment: &str) -> BrowserResult<bool>;
    async fn read_overlay(&mut self) -> BrowserResult<OverlaySnapshot>;
    async fn read_profile_header(&mut self) -> BrowserResult<ProfileHeaderSnapshot>;
    async fn trigger_load_more(&mut self, signal: &LoadMoreSignal) -> BrowserResult<()>;
    async fn wait_for(&mut self, duration: Duration);
    async fn release(self: Box<Self>) -> BrowserResult<()>;
}

#[async_trait(?Send)]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> BrowserResult<Box<dyn RenderedSurface>>;
}
