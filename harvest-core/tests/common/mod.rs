#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use harvest_core::browser::{
    BrowserError, BrowserResult, ItemSnapshot, LoadMoreSignal, OverlaySnapshot,
    ProfileHeaderSnapshot, RenderedSurface, SessionCookie, SessionFactory,
};
use harvest_core::config::HarvestConfig;

pub const BASE_URL: &str = "https://www.instagram.com";

/// How the fake surface answers a container lookup for one item segment.
#[derive(Clone)]
pub enum ItemBehavior {
    Found(ItemSnapshot),
    Missing,
    Broken,
}

/// Everything the fake surface renders, fixed up front by each test.
#[derive(Clone, Default)]
pub struct FeedScript {
    /// Links returned by successive discovery queries; the last batch repeats once exhausted.
    pub batches: Vec<Vec<String>>,
    pub page_text: String,
    pub current_url: String,
    pub present_selectors: Vec<String>,
    pub items: HashMap<String, ItemBehavior>,
    /// Overlays keyed by item segment. A segment without an overlay cannot be focused.
    pub overlays: HashMap<String, OverlaySnapshot>,
    pub header: ProfileHeaderSnapshot,
    pub timeout_on: Option<String>,
    pub fail_open: bool,
    pub fail_collect_at: Option<usize>,
}

impl FeedScript {
    pub fn with_batches(batches: Vec<Vec<String>>) -> Self {
        Self {
            batches,
            current_url: format!("{BASE_URL}/"),
            ..Self::default()
        }
    }

    pub fn item(mut self, segment: &str, behavior: ItemBehavior) -> Self {
        self.items.insert(segment.to_string(), behavior);
        self
    }

    pub fn overlay(mut self, segment: &str, overlay: OverlaySnapshot) -> Self {
        self.overlays.insert(segment.to_string(), overlay);
        self
    }
}

#[derive(Debug, Default)]
pub struct Recorder {
    pub opened: u32,
    pub released: u32,
    pub visited: Vec<String>,
    pub cookies: Vec<SessionCookie>,
    pub waits: Vec<Duration>,
    pub load_more: Vec<LoadMoreSignal>,
    pub collect_calls: usize,
    pub lookups: Vec<String>,
    pub focused: Vec<String>,
}

pub struct ScriptedSurface {
    script: FeedScript,
    recorder: Arc<Mutex<Recorder>>,
}

impl ScriptedSurface {
    fn record<R>(&self, f: impl FnOnce(&mut Recorder) -> R) -> R {
        let mut recorder = self.recorder.lock().unwrap();
        f(&mut recorder)
    }
}

#[async_trait(?Send)]
impl RenderedSurface for ScriptedSurface {
    async fn goto(&mut self, url: &str, _timeout: Duration) -> BrowserResult<()> {
        self.record(|r| r.visited.push(url.to_string()));
        match &self.script.timeout_on {
            Some(fragment) if url.contains(fragment.as_str()) => {
                Err(BrowserError::Timeout(url.to_string()))
            }
            _ => Ok(()),
        }
    }

    async fn apply_cookies(&mut self, cookies: &[SessionCookie]) -> BrowserResult<()> {
        self.record(|r| r.cookies.extend_from_slice(cookies));
        Ok(())
    }

    async fn current_url(&mut self) -> BrowserResult<String> {
        Ok(self.script.current_url.clone())
    }

    async fn read_text(&mut self) -> BrowserResult<String> {
        Ok(self.script.page_text.clone())
    }

    async fn has_any(&mut self, selectors: &[String]) -> BrowserResult<bool> {
        Ok(selectors
            .iter()
            .any(|selector| self.script.present_selectors.contains(selector)))
    }

    async fn collect_links(&mut self, _fragment: &str) -> BrowserResult<Vec<String>> {
        let call = self.record(|r| {
            r.collect_calls += 1;
            r.collect_calls
        });
        if self.script.fail_collect_at == Some(call) {
            return Err(BrowserError::Script("grid vanished".to_string()));
        }
        let index = (call - 1).min(self.script.batches.len().saturating_sub(1));
        Ok(self.script.batches.get(index).cloned().unwrap_or_default())
    }

    async fn find_by_key_substring(
        &mut self,
        segment: &str,
    ) -> BrowserResult<Option<ItemSnapshot>> {
        self.record(|r| r.lookups.push(segment.to_string()));
        match self.script.items.get(segment) {
            Some(ItemBehavior::Found(snapshot)) => Ok(Some(snapshot.clone())),
            Some(ItemBehavior::Broken) => Err(BrowserError::Script(format!(
                "detached node while reading {segment}"
            ))),
            Some(ItemBehavior::Missing) | None => Ok(None),
        }
    }

    async fn simulate_focus(&mut self, segment: &str) -> BrowserResult<bool> {
        self.record(|r| r.focused.push(segment.to_string()));
        Ok(self.script.overlays.contains_key(segment))
    }

    async fn read_overlay(&mut self) -> BrowserResult<OverlaySnapshot> {
        let last = self
            .recorder
            .lock()
            .unwrap()
            .focused
            .last()
            .cloned()
            .unwrap_or_default();
        Ok(self.script.overlays.get(&last).cloned().unwrap_or_default())
    }

    async fn read_profile_header(&mut self) -> BrowserResult<ProfileHeaderSnapshot> {
        Ok(self.script.header.clone())
    }

    async fn trigger_load_more(&mut self, signal: &LoadMoreSignal) -> BrowserResult<()> {
        self.record(|r| r.load_more.push(signal.clone()));
        Ok(())
    }

    async fn wait_for(&mut self, duration: Duration) {
        self.record(|r| r.waits.push(duration));
    }

    async fn release(self: Box<Self>) -> BrowserResult<()> {
        self.record(|r| r.released += 1);
        Ok(())
    }
}

pub struct ScriptedFactory {
    script: FeedScript,
    pub recorder: Arc<Mutex<Recorder>>,
}

impl ScriptedFactory {
    pub fn new(script: FeedScript) -> Self {
        Self {
            script,
            recorder: Arc::new(Mutex::new(Recorder::default())),
        }
    }
}

#[async_trait(?Send)]
impl SessionFactory for ScriptedFactory {
    async fn open(&self) -> BrowserResult<Box<dyn RenderedSurface>> {
        if self.script.fail_open {
            return Err(BrowserError::Launch("no chromium binary".to_string()));
        }
        self.recorder.lock().unwrap().opened += 1;
        Ok(Box::new(ScriptedSurface {
            script: self.script.clone(),
            recorder: Arc::clone(&self.recorder),
        }))
    }
}

/// Default configuration with settle delays removed so recorded waits are discovery and
/// hover pauses only.
pub fn test_config() -> HarvestConfig {
    let mut config = HarvestConfig::default();
    config.session.settle_ms = 0;
    config.feed.settle_ms = 0;
    config
}

pub fn post_key(id: &str) -> String {
    format!("{BASE_URL}/p/{id}/")
}

pub fn post_href(id: &str) -> String {
    format!("/p/{id}/")
}

pub fn post_hrefs(ids: std::ops::RangeInclusive<usize>) -> Vec<String> {
    ids.map(|i| post_href(&format!("P{i}"))).collect()
}

pub fn snapshot(alt: &str, text: &str) -> ItemSnapshot {
    ItemSnapshot {
        thumbnail: Some(format!("https://cdn.example/{alt}.jpg")),
        alt_text: Some(alt.to_string()),
        text: text.to_string(),
    }
}
