use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use reqwest::{Client, IntoUrl, RequestBuilder, Url};

use crate::error::{PortalError, Result};

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub base_url: String,
    pub verify_tls: bool,
    pub user_agent: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl SessionSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            verify_tls: true,
            user_agent: BROWSER_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// One HTTP client with its own cookie jar, built fresh for every cycle.
pub struct Session {
    client: Client,
    jar: Arc<Jar>,
    base_url: String,
    base: Url,
    referer: Option<HeaderValue>,
}

impl Session {
    pub fn new(settings: &SessionSettings) -> Result<Self> {
        let base_url = settings.base_url.trim_end_matches('/').to_string();
        let base = Url::parse(&base_url).map_err(|e| PortalError::invalid_url(&base_url, e))?;
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .cookie_provider(Arc::clone(&jar))
            .danger_accept_invalid_certs(!settings.verify_tls)
            .timeout(settings.timeout)
            .connect_timeout(settings.connect_timeout)
            .build()?;
        Ok(Self {
            client,
            jar,
            base_url,
            base,
            referer: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn set_referer(&mut self, url: &str) {
        self.referer = HeaderValue::from_str(url).ok();
    }

    pub fn referer(&self) -> Option<&str> {
        self.referer.as_ref().and_then(|v| v.to_str().ok())
    }

    pub fn get<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.client.get(url).headers(self.default_headers())
    }

    pub fn post<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.client.post(url).headers(self.default_headers())
    }

    pub fn cookie_names(&self, extra: &[&Url]) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for url in std::iter::once(&self.base).chain(extra.iter().copied()) {
            let Some(header) = self.jar.cookies(url) else {
                continue;
            };
            let Ok(raw) = header.to_str() else {
                continue;
            };
            names.extend(parse_cookie_names(raw));
        }
        names
    }

    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(referer) = &self.referer {
            headers.insert(REFERER, referer.clone());
        }
        headers
    }
}

fn parse_cookie_names(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(';')
        .filter_map(|pair| pair.split_once('=').map(|(name, _)| name.trim()))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}
