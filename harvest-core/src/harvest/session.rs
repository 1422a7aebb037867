use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::browser::{BrowserError, RenderedSurface};

use super::error::{HarvestError, HarvestResult};
use super::metrics::SessionMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// No credential was supplied; only publicly rendered content is reachable.
    Guest,
    Authenticated,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Guest => f.write_str("guest"),
            SessionMode::Authenticated => f.write_str("authenticated"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Unauthenticated,
    CredentialApplied,
    Verifying,
    Authenticated,
    Failed,
}

impl AuthState {
    pub fn can_advance_to(self, next: AuthState) -> bool {
        matches!(
            (self, next),
            (AuthState::Unauthenticated, AuthState::CredentialApplied)
                | (AuthState::CredentialApplied, AuthState::Verifying)
                | (AuthState::Verifying, AuthState::Authenticated)
                | (AuthState::Verifying, AuthState::Failed)
                | (AuthState::Unauthenticated, AuthState::Failed)
                | (AuthState::CredentialApplied, AuthState::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AuthState::Authenticated | AuthState::Failed)
    }
}

/// A rendering surface owned by exactly one pipeline run.
///
/// Consumed by [`RenderingSession::release`], so the underlying engine can only be torn down
/// once.
pub struct RenderingSession {
    surface: Box<dyn RenderedSurface>,
    mode: SessionMode,
    auth_state: AuthState,
    metrics: SessionMetrics,
}

impl RenderingSession {
    pub fn new(surface: Box<dyn RenderedSurface>) -> Self {
        Self {
            surface,
            mode: SessionMode::Guest,
            auth_state: AuthState::Unauthenticated,
            metrics: SessionMetrics::default(),
        }
    }

    pub fn surface(&mut self) -> &mut dyn RenderedSurface {
        self.surface.as_mut()
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn auth_state(&self) -> AuthState {
        self.auth_state
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut SessionMetrics {
        &mut self.metrics
    }

    pub(crate) fn advance(&mut self, next: AuthState) {
        if !self.auth_state.can_advance_to(next) {
            warn!(from = ?self.auth_state, to = ?next, "unexpected authentication transition");
        }
        debug!(from = ?self.auth_state, to = ?next, "authentication state changed");
        self.auth_state = next;
        if next == AuthState::Authenticated {
            self.mode = SessionMode::Authenticated;
        }
    }

    /// Loads `url`, translating an engine timeout into [`HarvestError::NavigationTimeout`].
    pub async fn navigate(&mut self, url: &str, timeout: Duration) -> HarvestResult<()> {
        self.metrics.record_page_open();
        match self.surface.goto(url, timeout).await {
            Ok(()) => Ok(()),
            Err(BrowserError::Timeout(_)) => Err(HarvestError::NavigationTimeout {
                url: url.to_string(),
                timeout_secs: timeout.as_secs(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn pause(&mut self, duration: Duration) {
        if !duration.is_zero() {
            self.surface.wait_for(duration).await;
        }
    }

    /// Tears the surface down and hands back the run's counters. Release problems are logged,
    /// not propagated.
    pub async fn release(self) -> SessionMetrics {
        let RenderingSession {
            surface, metrics, ..
        } = self;
        if let Err(err) = surface.release().await {
            warn!(error = %err, "failed to release rendering session");
        }
        metrics
    }
}

/// Joins `path` onto `base`, treating `base` as a directory.
pub(crate) fn resolve_url(base: &str, path: &str) -> HarvestResult<String> {
    let mut base = url::Url::parse(base)
        .map_err(|err| HarvestError::InvalidRequest(format!("invalid base url {base}: {err}")))?;
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    base.join(path.trim_start_matches('/'))
        .map(String::from)
        .map_err(|err| HarvestError::InvalidRequest(format!("invalid path {path}: {err}")))
}
