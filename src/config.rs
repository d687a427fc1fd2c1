use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::alert::AlertRules;
use crate::auth::session::{SessionSettings, BROWSER_USER_AGENT};
use crate::auth::Credentials;
use crate::portal::LOGIN_TRIGGER_PATH;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_trigger_path")]
    pub trigger_path: String,
    #[serde(default = "default_true")]
    pub verify_tls: bool,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_state_path")]
    pub state_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub discord_webhook: String,
    #[serde(default)]
    pub bulletin_url: String,
    #[serde(default = "default_true")]
    pub enable_stdout: bool,
    #[serde(default)]
    pub rules: AlertRules,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub verify_tls: Option<bool>,
    pub discord_webhook: Option<String>,
    pub bulletin_url: Option<String>,
    pub state_path: Option<String>,
}

impl ConfigOverrides {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            base_url: var("SCODOC_URL"),
            username: var("SCODOC_USER"),
            password: var("SCODOC_PASSWORD"),
            verify_tls: var("VERIFY_SSL").map(|v| v.trim().eq_ignore_ascii_case("true")),
            discord_webhook: var("DISCORD_WEBHOOK_URL"),
            bulletin_url: var("BULLETIN_URL"),
            state_path: var("STATE_FILE"),
        }
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/grade-watch/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(base_url) = overrides.base_url {
            self.portal.base_url = base_url;
        }
        if let Some(username) = overrides.username {
            self.credentials.username = username;
        }
        if let Some(password) = overrides.password {
            self.credentials.password = password;
        }
        if let Some(verify_tls) = overrides.verify_tls {
            self.portal.verify_tls = verify_tls;
        }
        if let Some(webhook) = overrides.discord_webhook {
            self.alerts.discord_webhook = webhook;
        }
        if let Some(bulletin_url) = overrides.bulletin_url {
            self.alerts.bulletin_url = bulletin_url;
        }
        if let Some(state_path) = overrides.state_path {
            self.storage.state_path = state_path;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_state_path(&self) -> PathBuf {
        expand_tilde(&self.storage.state_path)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            base_url: self.portal.base_url.clone(),
            verify_tls: self.portal.verify_tls,
            user_agent: self.http.user_agent.clone(),
            timeout: Duration::from_secs(self.http.timeout_secs.max(1)),
            connect_timeout: Duration::from_secs(self.http.connect_timeout_secs.max(1)),
        }
    }

    pub fn credentials(&self) -> Result<Credentials> {
        let creds = &self.credentials;
        if creds.username.trim().is_empty() || creds.password.is_empty() {
            return Err(anyhow!(
                "portal credentials missing: set SCODOC_USER and SCODOC_PASSWORD or [credentials] in the config"
            ));
        }
        Ok(Credentials::new(creds.username.trim(), creds.password.clone()))
    }

    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.credentials.password.is_empty() {
            copy.credentials.password = "<redacted>".to_string();
        }
        copy
    }

    pub fn default_template() -> String {
        let template = r#"[portal]
base_url = "https://scodoc.example.com"
trigger_path = "/services/doAuth.php"
verify_tls = true

[credentials]
username = ""
password = ""

[storage]
state_path = "~/.local/share/grade-watch/state.json"

[http]
timeout_secs = 30
connect_timeout_secs = 10

[alerts]
discord_webhook = ""
bulletin_url = ""
enable_stdout = true

[alerts.rules]
new_grade = true
grade_updated = true

[schedule]
interval_secs = 300
"#;
        template.to_string()
    }
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            trigger_path: default_trigger_path(),
            verify_tls: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            discord_webhook: String::new(),
            bulletin_url: String::new(),
            enable_stdout: true,
            rules: AlertRules::default(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://scodoc.example.com".to_string()
}

fn default_trigger_path() -> String {
    LOGIN_TRIGGER_PATH.to_string()
}

fn default_state_path() -> String {
    "~/.local/share/grade-watch/state.json".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    BROWSER_USER_AGENT.to_string()
}

fn default_interval_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}
