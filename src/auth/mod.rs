pub mod form;
pub mod session;

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::auth::form::{FormLocator, LocatorChain, LoginForm};
use crate::auth::session::Session;
use crate::error::{PortalError, Result};

pub const SSO_URL_MARKERS: [&str; 2] = ["cas", "login"];
pub const SESSION_COOKIES: [&str; 2] = ["TGC", "scodoc_session"];
pub const ERROR_MARKERS: [&str; 3] = ["erreur", "error", "échec"];

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginStage {
    Start,
    TriggerRequested,
    RedirectDetected,
    FormParsed,
    CredentialsSubmitted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AuthEvidence {
    AlreadyAuthenticated,
    SessionCookie { name: String },
    RedirectedToService,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AuthFailure {
    Misconfigured { url: String },
    NoRedirect { status: u16 },
    ErrorPage,
    InvalidAction { action: String, message: String },
    Transport { stage: LoginStage, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum AuthOutcome {
    Authenticated { evidence: AuthEvidence },
    /// Nothing proved success or failure; the first data call decides.
    Uncertain { final_url: String },
    Failed { reason: AuthFailure },
}

impl AuthOutcome {
    pub fn is_usable(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    fn failed(reason: AuthFailure) -> Self {
        Self::Failed { reason }
    }

    fn transport(stage: LoginStage, err: impl Display) -> Self {
        Self::failed(AuthFailure::Transport {
            stage,
            message: err.to_string(),
        })
    }
}

impl Display for AuthOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authenticated { evidence } => match evidence {
                AuthEvidence::AlreadyAuthenticated => write!(f, "already authenticated"),
                AuthEvidence::SessionCookie { name } => {
                    write!(f, "authenticated (cookie {name} found)")
                }
                AuthEvidence::RedirectedToService => {
                    write!(f, "authenticated (redirected back to service)")
                }
            },
            Self::Uncertain { final_url } => write!(f, "login status uncertain at {final_url}"),
            Self::Failed { reason } => match reason {
                AuthFailure::Misconfigured { url } => {
                    write!(f, "login failed: {url} returned 404, check the portal URL")
                }
                AuthFailure::NoRedirect { status } => {
                    write!(f, "login failed: no CAS redirect and HTTP {status}")
                }
                AuthFailure::ErrorPage => write!(f, "login failed: error message in CAS response"),
                AuthFailure::InvalidAction { action, message } => {
                    write!(f, "login failed: form action {action:?} is not a URL ({message})")
                }
                AuthFailure::Transport { stage, message } => {
                    write!(f, "login failed at {stage:?}: {message}")
                }
            },
        }
    }
}

pub struct AuthFlow<'a> {
    session: &'a mut Session,
    credentials: &'a Credentials,
    locator: Box<dyn FormLocator>,
}

impl<'a> AuthFlow<'a> {
    pub fn new(session: &'a mut Session, credentials: &'a Credentials) -> Self {
        Self {
            session,
            credentials,
            locator: Box::new(LocatorChain::cas_default()),
        }
    }

    pub fn with_locator(mut self, locator: Box<dyn FormLocator>) -> Self {
        self.locator = locator;
        self
    }

    /// Runs the handshake. Only a page without any form is an error; every
    /// other problem is reported through [`AuthOutcome::Failed`].
    pub async fn login(&mut self, trigger_path: &str) -> Result<AuthOutcome> {
        debug!(stage = ?LoginStage::Start, "starting CAS login");
        let target = self.session.url(trigger_path);
        info!("accessing {target} to trigger CAS");
        let response = match self.session.get(target.as_str()).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!("trigger request failed: {err}");
                return Ok(AuthOutcome::transport(LoginStage::TriggerRequested, err));
            }
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            warn!("{target} returned 404, check the portal base URL");
            return Ok(AuthOutcome::failed(AuthFailure::Misconfigured { url: target }));
        }

        let page_url = response.url().clone();
        if !redirect_detected(page_url.as_str()) {
            info!("no CAS redirect detected (url {page_url}, status {status})");
            if status == StatusCode::OK {
                return Ok(AuthOutcome::Authenticated {
                    evidence: AuthEvidence::AlreadyAuthenticated,
                });
            }
            return Ok(AuthOutcome::failed(AuthFailure::NoRedirect {
                status: status.as_u16(),
            }));
        }
        info!("redirected to CAS: {page_url}");

        let page = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                warn!("failed reading CAS login page: {err}");
                return Ok(AuthOutcome::transport(LoginStage::RedirectDetected, err));
            }
        };
        let mut form = match LoginForm::extract(&page, &page_url, self.locator.as_ref()) {
            Ok(form) => form,
            Err(PortalError::InvalidUrl { url, source }) => {
                warn!("login form action {url:?} could not be resolved: {source}");
                return Ok(AuthOutcome::failed(AuthFailure::InvalidAction {
                    action: url,
                    message: source.to_string(),
                }));
            }
            Err(err) => return Err(err),
        };
        debug!(stage = ?LoginStage::FormParsed, fields = form.fields().len(), "login form parsed");
        form.apply_credentials(&self.credentials.username, &self.credentials.password);

        info!("submitting credentials to {}", form.action);
        self.session.set_referer(page_url.as_str());
        let response = match self
            .session
            .post(form.action.clone())
            .form(form.fields())
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!("credential submission failed: {err}");
                return Ok(AuthOutcome::transport(LoginStage::CredentialsSubmitted, err));
            }
        };
        debug!(stage = ?LoginStage::CredentialsSubmitted, status = %response.status());

        let final_url = response.url().clone();
        let body = response.text().await.unwrap_or_else(|err| {
            warn!("failed reading CAS response body: {err}");
            String::new()
        });
        let cookies = self
            .session
            .cookie_names(&[&page_url, &form.action, &final_url]);
        let outcome = classify_submission(self.session.base_url(), &cookies, final_url.as_str(), &body);
        match &outcome {
            AuthOutcome::Failed { .. } => warn!("{outcome}"),
            _ => info!("{outcome}"),
        }
        Ok(outcome)
    }
}

pub fn redirect_detected(url: &str) -> bool {
    let lowered = url.to_lowercase();
    SSO_URL_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Decides what a credential POST achieved, strongest evidence first.
pub fn classify_submission(
    base_url: &str,
    cookies: &BTreeSet<String>,
    final_url: &str,
    body: &str,
) -> AuthOutcome {
    if let Some(name) = SESSION_COOKIES
        .into_iter()
        .find(|name| cookies.contains(*name))
    {
        return AuthOutcome::Authenticated {
            evidence: AuthEvidence::SessionCookie {
                name: name.to_string(),
            },
        };
    }
    if final_url.contains(base_url) {
        return AuthOutcome::Authenticated {
            evidence: AuthEvidence::RedirectedToService,
        };
    }
    let lowered = body.to_lowercase();
    if ERROR_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return AuthOutcome::failed(AuthFailure::ErrorPage);
    }
    AuthOutcome::Uncertain {
        final_url: final_url.to_string(),
    }
}
