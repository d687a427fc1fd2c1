use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};

use crate::alert::engine::Notification;
use crate::grades::GradeStats;

const NEW_GRADE_COLOR: u32 = 0x43b581;
const UPDATED_COLOR: u32 = 0xffa500;
const FOOTER: &str = "ScodocAlert";

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}

pub struct StdoutSink;

#[async_trait]
impl AlertSink for StdoutSink {
    async fn send(&self, notification: &Notification) -> Result<()> {
        println!("{}", render_line(notification));
        Ok(())
    }
}

pub fn render_line(notification: &Notification) -> String {
    match notification {
        Notification::NewGrade { escalate, .. } => format!(
            "[new grade{}] {} - {}",
            if *escalate { ", @everyone" } else { "" },
            notification.module_label(),
            notification.evaluation()
        ),
        Notification::GradeUpdated { .. } => format!(
            "[grade updated] {} - {}",
            notification.module_label(),
            notification.evaluation()
        ),
    }
}

pub struct WebhookSink {
    client: Client,
    url: String,
    bulletin_url: Option<String>,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, bulletin_url: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("grade-watch/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            bulletin_url: bulletin_url.filter(|u| !u.trim().is_empty()),
        })
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let payload = discord_payload(notification, self.bulletin_url.as_deref());
        self.client
            .post(&self.url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Discord embed for a notification. The grade itself never appears.
pub fn discord_payload(notification: &Notification, bulletin_url: Option<&str>) -> Value {
    let module = notification.module_label();
    let evaluation = notification.evaluation();
    let (title, description, color, mut fields) = match notification {
        Notification::NewGrade { stats, .. } => {
            let mut fields = vec![
                embed_field("Module", &module, true),
                embed_field("Évaluation", evaluation, true),
            ];
            if let Some(bar) = stats_bar(stats) {
                fields.push(embed_field("Statistiques Promo", &bar, false));
            }
            (
                "Nouvelle Note Publiée !",
                format!("Une nouvelle note est disponible en **{module}**."),
                NEW_GRADE_COLOR,
                fields,
            )
        }
        Notification::GradeUpdated { .. } => (
            "Note Modifiée",
            format!("La note de **{evaluation}** ({module}) a été modifiée."),
            UPDATED_COLOR,
            vec![embed_field(
                "Info",
                "Consultez votre relevé pour voir la modification.",
                false,
            )],
        ),
    };
    if let Some(url) = bulletin_url {
        fields.push(embed_field(
            "Lien",
            &format!("[Consulter le bulletin]({url})"),
            false,
        ));
    }

    let mut payload = json!({
        "embeds": [{
            "title": title,
            "description": description,
            "color": color,
            "timestamp": Utc::now().to_rfc3339(),
            "footer": {"text": FOOTER},
            "fields": fields,
        }]
    });
    if notification.escalate() {
        payload["content"] = json!("@everyone");
    }
    payload
}

pub fn stats_bar(stats: &GradeStats) -> Option<String> {
    let parse = |v: &Option<String>| {
        let raw = v.as_deref()?.trim();
        raw.parse::<f64>().ok().map(|_| raw.to_string())
    };
    let min = parse(&stats.min)?;
    let mean = parse(&stats.mean)?;
    let max = parse(&stats.max)?;
    Some(format!(
        "📉 Min: **{min}** | 📊 Moy: **{mean}** | 📈 Max: **{max}**"
    ))
}

fn embed_field(name: &str, value: &str, inline: bool) -> Value {
    json!({"name": name, "value": value, "inline": inline})
}
