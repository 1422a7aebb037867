use tracing::{info, warn};

use crate::browser::{SessionCookie, SessionFactory};
use crate::config::SessionSection;

use super::error::{HarvestError, HarvestResult};
use super::session::{resolve_url, AuthState, RenderingSession};
use super::types::SessionCredential;

/// What the landing surface showed during verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationSignals {
    pub authenticated_indicator: bool,
    pub login_form: bool,
}

impl VerificationSignals {
    /// A login form without any authenticated-only affordance means the credential was refused.
    pub fn rejected(self) -> bool {
        self.login_form && !self.authenticated_indicator
    }
}

/// Opens a rendering session and, when a credential is supplied, proves it is accepted.
pub struct SessionAuthenticator {
    config: SessionSection,
}

impl SessionAuthenticator {
    pub fn new(config: SessionSection) -> Self {
        Self { config }
    }

    /// Returns a session ready for navigation. On failure the freshly opened session has
    /// already been released.
    pub async fn authenticate(
        &self,
        factory: &dyn SessionFactory,
        credential: Option<&SessionCredential>,
    ) -> HarvestResult<RenderingSession> {
        let surface = factory.open().await?;
        let mut session = RenderingSession::new(surface);

        let Some(credential) = credential else {
            warn!("no session credential supplied; continuing in guest mode");
            return Ok(session);
        };

        match self.verify_credential(&mut session, credential).await {
            Ok(()) => {
                info!(mode = %session.mode(), "session authenticated");
                Ok(session)
            }
            Err(err) => {
                if !session.auth_state().is_terminal() {
                    session.advance(AuthState::Failed);
                }
                session.release().await;
                Err(err)
            }
        }
    }

    async fn verify_credential(
        &self,
        session: &mut RenderingSession,
        credential: &SessionCredential,
    ) -> HarvestResult<()> {
        let timeout = self.config.navigation_timeout();

        // Cookies only stick once the cookie domain has been visited.
        session.navigate(&self.config.base_url, timeout).await?;
        let cookies = self.session_cookies(credential);
        session.surface().apply_cookies(&cookies).await?;
        session.advance(AuthState::CredentialApplied);

        let landing = resolve_url(&self.config.base_url, &self.config.landing_path)?;
        session.navigate(&landing, timeout).await?;
        session.pause(self.config.settle_delay()).await;
        session.advance(AuthState::Verifying);

        let signals = self.inspect(session).await?;
        if signals.rejected() {
            session.advance(AuthState::Failed);
            return Err(HarvestError::Authentication {
                reason: "login form shown instead of an authenticated surface".to_string(),
            });
        }
        session.advance(AuthState::Authenticated);
        Ok(())
    }

    async fn inspect(&self, session: &mut RenderingSession) -> HarvestResult<VerificationSignals> {
        let surface = session.surface();
        let authenticated_indicator = surface
            .has_any(&self.config.authenticated_indicators)
            .await?;
        let mut login_form = surface.has_any(&self.config.login_indicators).await?;
        if !login_form && !self.config.login_url_fragment.is_empty() {
            let current = surface.current_url().await?;
            login_form = current.contains(&self.config.login_url_fragment);
        }
        Ok(VerificationSignals {
            authenticated_indicator,
            login_form,
        })
    }

    pub fn session_cookies(&self, credential: &SessionCredential) -> Vec<SessionCookie> {
        let mut cookies = vec![SessionCookie {
            name: self.config.credential_cookie.clone(),
            value: credential.expose().to_string(),
            domain: self.config.cookie_domain.clone(),
            http_only: true,
            same_site_none: true,
        }];
        if let Some(csrf) = &self.config.csrf_cookie {
            cookies.push(SessionCookie {
                name: csrf.clone(),
                value: "missing".to_string(),
                domain: self.config.cookie_domain.clone(),
                http_only: false,
                same_site_none: false,
            });
        }
        cookies
    }
}
