use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::alert::{build_notifications, AlertRules, AlertSink, Notification};
use crate::auth::session::{Session, SessionSettings};
use crate::auth::{AuthFlow, AuthOutcome, Credentials};
use crate::error::PortalError;
use crate::grades::{diff, extract_evaluations, ChangeEvent};
use crate::portal::document::{latest_semester, Semester};
use crate::portal::PortalClient;
use crate::snapshot::store::SnapshotStore;

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("{0}")]
    Login(AuthOutcome),
    #[error("login status was uncertain and the portal rejected the session: {source}")]
    UnverifiedSession {
        #[source]
        source: PortalError,
    },
    #[error(transparent)]
    Portal(#[from] PortalError),
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub auth: AuthOutcome,
    pub initialization: bool,
    pub semester: Option<Semester>,
    pub events: Vec<ChangeEvent>,
    pub rejected_records: usize,
    pub notifications: usize,
    pub delivery_failures: usize,
}

pub struct Watcher {
    settings: SessionSettings,
    credentials: Credentials,
    trigger_path: String,
    store: SnapshotStore,
    rules: AlertRules,
    sinks: Vec<Box<dyn AlertSink>>,
}

impl Watcher {
    pub fn new(
        settings: SessionSettings,
        credentials: Credentials,
        trigger_path: impl Into<String>,
        store: SnapshotStore,
    ) -> Self {
        Self {
            settings,
            credentials,
            trigger_path: trigger_path.into(),
            store,
            rules: AlertRules::default(),
            sinks: Vec::new(),
        }
    }

    pub fn with_rules(mut self, rules: AlertRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub async fn login_only(&self) -> Result<AuthOutcome, PortalError> {
        let mut session = Session::new(&self.settings)?;
        AuthFlow::new(&mut session, &self.credentials)
            .login(&self.trigger_path)
            .await
    }

    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let started_at = Utc::now();
        let mut snapshot = self.store.load();
        let initialization = snapshot.is_empty();
        if initialization {
            info!("state is empty, running an initialization cycle without mentions");
        }

        let mut session = Session::new(&self.settings)?;
        let auth = AuthFlow::new(&mut session, &self.credentials)
            .login(&self.trigger_path)
            .await?;
        if !auth.is_usable() {
            return Err(CycleError::Login(auth));
        }

        let portal = PortalClient::new(&session);
        info!("fetching data");
        let initial = match portal.initial_data().await {
            Ok(initial) => initial,
            Err(source) if matches!(auth, AuthOutcome::Uncertain { .. }) => {
                return Err(CycleError::UnverifiedSession { source });
            }
            Err(err) => return Err(err.into()),
        };

        let mut report = CycleReport {
            started_at,
            auth,
            initialization,
            semester: None,
            events: Vec::new(),
            rejected_records: 0,
            notifications: 0,
            delivery_failures: 0,
        };

        let Some(semester) = latest_semester(&initial)? else {
            info!("no semesters found");
            return Ok(report);
        };
        info!("checking semester: {} ({})", semester.title, semester.id);

        let grades = portal.grades(&semester.id).await?;
        let extraction = extract_evaluations(&grades)?;
        let events = diff(&extraction.evaluations, &mut snapshot, initialization);
        self.store.save(&snapshot)?;
        info!(
            "check complete, {} change(s), {} evaluation(s) tracked, state saved",
            events.len(),
            snapshot.len()
        );

        let notifications = build_notifications(&events, &self.rules);
        report.notifications = notifications.len();
        report.delivery_failures = self.dispatch(&notifications).await;
        report.semester = Some(semester);
        report.rejected_records = extraction.rejected.len();
        report.events = events;
        Ok(report)
    }

    async fn dispatch(&self, notifications: &[Notification]) -> usize {
        let mut failures = 0;
        for notification in notifications {
            for sink in &self.sinks {
                if let Err(err) = sink.send(notification).await {
                    warn!("failed sending notification: {err}");
                    failures += 1;
                }
            }
        }
        failures
    }
}
