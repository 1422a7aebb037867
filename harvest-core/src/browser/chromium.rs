use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, CookieSameSite};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, trace, warn};

use crate::config::ExtractionSection;

use super::automation::{BrowserAutomation, BrowserContext, BrowserLauncher};
use super::error::{BrowserError, BrowserResult};
use super::human::HumanMotionController;
use super::surface::{
    ItemSnapshot, LoadMoreSignal, OverlaySnapshot, ProfileHeaderSnapshot, RenderedSurface,
    SessionCookie, SessionFactory,
};

/// Opens one Chromium instance with a single page per harvest run.
pub struct ChromiumSessionFactory {
    launcher: BrowserLauncher,
}

impl ChromiumSessionFactory {
    pub fn new(launcher: BrowserLauncher) -> Self {
        Self { launcher }
    }
}

#[async_trait(?Send)]
impl SessionFactory for ChromiumSessionFactory {
    async fn open(&self) -> BrowserResult<Box<dyn RenderedSurface>> {
        let automation = self.launcher.launch().await?;
        let context = match automation.new_context().await {
            Ok(context) => context,
            Err(err) => return Err(abandon_launch(err, automation.shutdown().await)),
        };
        let config = self.launcher.config();
        debug!(
            user_agent = automation.user_agent(),
            width = context.viewport().width,
            height = context.viewport().height,
            "rendering session opened"
        );
        Ok(Box::new(ChromiumSurface {
            automation,
            context,
            motion: HumanMotionController::new(config.human_simulation.clone()),
            extraction: config.extraction.clone(),
        }))
    }
}

/// Keeps the error that stopped the launch; a failed cleanup is only logged.
fn abandon_launch(err: BrowserError, shutdown: BrowserResult<()>) -> BrowserError {
    if let Err(shutdown_err) = shutdown {
        warn!(error = %shutdown_err, "browser shutdown after failed launch");
    }
    err
}

pub struct ChromiumSurface {
    automation: BrowserAutomation,
    context: BrowserContext,
    motion: HumanMotionController,
    extraction: ExtractionSection,
}

#[derive(Debug, Deserialize)]
struct RawItemPayload {
    found: bool,
    thumbnail: Option<String>,
    alt_text: Option<String>,
    #[serde(default)]
    text: String,
}

impl ChromiumSurface {
    async fn evaluate<T: DeserializeOwned>(&self, script: &str) -> BrowserResult<T> {
        self.context
            .page()
            .evaluate(script)
            .await
            .map_err(|err| BrowserError::Script(err.to_string()))?
            .into_value()
            .map_err(|err| BrowserError::Payload(err.to_string()))
    }

    fn anchor_selector(segment: &str) -> BrowserResult<String> {
        Ok(format!("a[href*={}]", js_literal(segment)?))
    }

    fn item_script(&self, segment: &str) -> BrowserResult<String> {
        let selector = js_literal(&Self::anchor_selector(segment)?)?;
        let container = js_literal(&self.extraction.container_selector)?;
        Ok(format!(
            r#"
(() => {{
    const empty = {{ found: false, thumbnail: null, alt_text: null, text: '' }};
    const link = document.querySelector({selector});
    if (!link) return empty;
    const container = link.closest({container});
    if (!container) return empty;
    const img = container.querySelector('img');
    let thumbnail = null;
    if (img) {{
        const srcset = (img.getAttribute('srcset') || '').split(' ')[0];
        thumbnail = img.currentSrc || img.src || srcset || null;
    }}
    return {{
        found: true,
        thumbnail,
        alt_text: img && img.alt ? img.alt : null,
        text: container.textContent || ''
    }};
}})()
"#
        ))
    }

    fn overlay_script(&self) -> BrowserResult<String> {
        let overlay = js_literal(&self.extraction.overlay_selector)?;
        let entry = js_literal(&self.extraction.overlay_entry_selector)?;
        let token = js_literal(&self.extraction.token_selector)?;
        let max_len = self.extraction.max_token_length;
        Ok(format!(
            r#"
(() => {{
    const text = (el) => ((el && el.textContent) || '').trim();
    const overlay = document.querySelector({overlay});
    let entries = null;
    if (overlay) {{
        entries = Array.from(overlay.querySelectorAll({entry}))
            .map(li => text(li.querySelector('span') || li));
    }}
    const tokens = Array.from(document.querySelectorAll({token}))
        .map(text)
        .filter(t => t.length > 0 && t.length <= {max_len});
    return {{ entries, tokens }};
}})()
"#
        ))
    }

    fn load_more_script(signal: &LoadMoreSignal) -> String {
        match signal {
            LoadMoreSignal::ViewportStep { factor } => {
                format!("window.scrollBy(0, window.innerHeight * {factor});")
            }
            LoadMoreSignal::ToBottom => r#"
(() => {
    window.scrollTo(0, document.body.scrollHeight);
    window.scrollBy(0, window.innerHeight);
})()
"#
            .to_string(),
        }
    }
}

#[async_trait(?Send)]
impl RenderedSurface for ChromiumSurface {
    async fn goto(&mut self, url: &str, timeout: Duration) -> BrowserResult<()> {
        trace!(url = %url, timeout_ms = timeout.as_millis() as u64, "navigating");
        match tokio::time::timeout(timeout, self.context.goto(url)).await {
            Ok(result) => result,
            Err(_) => Err(BrowserError::Timeout(url.to_string())),
        }
    }

    async fn apply_cookies(&mut self, cookies: &[SessionCookie]) -> BrowserResult<()> {
        let mut params = Vec::with_capacity(cookies.len());
        for cookie in cookies {
            let same_site = if cookie.same_site_none {
                CookieSameSite::None
            } else {
                CookieSameSite::Lax
            };
            let param = CookieParam::builder()
                .name(cookie.name.clone())
                .value(cookie.value.clone())
                .domain(cookie.domain.clone())
                .path("/")
                .secure(true)
                .http_only(cookie.http_only)
                .same_site(same_site)
                .build()
                .map_err(BrowserError::Configuration)?;
            params.push(param);
        }
        self.context.page().set_cookies(params).await?;
        Ok(())
    }

    async fn current_url(&mut self) -> BrowserResult<String> {
        self.context.current_url().await
    }

    async fn read_text(&mut self) -> BrowserResult<String> {
        self.evaluate(
            "(() => document.body ? (document.body.innerText || document.body.textContent || '') : '')()",
        )
        .await
    }

    async fn has_any(&mut self, selectors: &[String]) -> BrowserResult<bool> {
        let list = serde_json::to_string(selectors)
            .map_err(|err| BrowserError::Payload(err.to_string()))?;
        let script = format!(
            r#"
(() => {list}.some(sel => {{
    try {{ return document.querySelector(sel) !== null; }} catch (_) {{ return false; }}
}}))()
"#
        );
        self.evaluate(&script).await
    }

    async fn collect_links(&mut self, fragment: &str) -> BrowserResult<Vec<String>> {
        let fragment = js_literal(fragment)?;
        let script = format!(
            r#"
(() => Array.from(document.querySelectorAll('a[href]'))
    .map(a => a.getAttribute('href') || '')
    .filter(href => href.includes({fragment})))()
"#
        );
        self.evaluate(&script).await
    }

    async fn find_by_key_substring(
        &mut self,
        segment: &str,
    ) -> BrowserResult<Option<ItemSnapshot>> {
        let script = self.item_script(segment)?;
        let payload: RawItemPayload = self.evaluate(&script).await?;
        if !payload.found {
            return Ok(None);
        }
        Ok(Some(ItemSnapshot {
            thumbnail: payload.thumbnail,
            alt_text: payload.alt_text,
            text: payload.text,
        }))
    }

    async fn simulate_focus(&mut self, segment: &str) -> BrowserResult<bool> {
        let selector = Self::anchor_selector(segment)?;
        let elements = self.context.page().find_elements(selector).await?;
        let Some(anchor) = elements.first() else {
            return Ok(false);
        };
        let point = self
            .motion
            .move_to_element(self.context.page(), anchor)
            .await?;
        debug!(x = point.x, y = point.y, "pointer resting on item anchor");
        Ok(true)
    }

    async fn read_overlay(&mut self) -> BrowserResult<OverlaySnapshot> {
        let script = self.overlay_script()?;
        self.evaluate(&script).await
    }

    async fn read_profile_header(&mut self) -> BrowserResult<ProfileHeaderSnapshot> {
        self.evaluate(PROFILE_HEADER_SCRIPT).await
    }

    async fn trigger_load_more(&mut self, signal: &LoadMoreSignal) -> BrowserResult<()> {
        let script = Self::load_more_script(signal);
        self.motion
            .run_script_then_pause(self.context.page(), &script)
            .await
    }

    async fn wait_for(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn release(self: Box<Self>) -> BrowserResult<()> {
        let surface = *self;
        surface.automation.shutdown().await
    }
}

fn js_literal(value: &str) -> BrowserResult<String> {
    serde_json::to_string(value).map_err(|err| BrowserError::Payload(err.to_string()))
}

const PROFILE_HEADER_SCRIPT: &str = r#"
(() => {
    const first = (selectors, read) => {
        for (const selector of selectors) {
            const el = document.querySelector(selector);
            const value = el ? read(el) : null;
            if (value) return value;
        }
        return null;
    };
    const text = (el) => ((el && el.textContent) || '').trim() || null;
    return {
        avatar: first([
            'img[data-testid="user-avatar"]',
            'header img',
            'img[alt*="profile picture"]',
            'img[alt*="Profile picture"]'
        ], el => el.src || null),
        username: first(['header h2', 'h2', '[data-testid="user-name"]'], text),
        display_name: first(['header h1', 'h1', '[data-testid="user-full-name"]'], text),
        bio: first(['[data-testid="user-bio"]', 'header div[data-testid="user-bio"]', 'header div span'], text),
        verified: [
            '[data-testid="verified-icon"]',
            'svg[aria-label="Verified"]',
            '[aria-label*="Verified"]'
        ].some(sel => document.querySelector(sel) !== null),
        text: (document.querySelector('header') || document.body || {}).textContent || ''
    };
})()
"#;
