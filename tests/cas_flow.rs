use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum::extract::{Form, Query, State};
use axum::http::header::{COOKIE, REFERER, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{AppendHeaders, Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use grade_watch::alert::{AlertSink, Notification};
use grade_watch::auth::session::SessionSettings;
use grade_watch::auth::{AuthEvidence, AuthFailure, AuthOutcome, Credentials, LoginStage};
use grade_watch::cycle::{CycleError, Watcher};
use grade_watch::error::PortalError;
use grade_watch::grades::ChangeKind;
use grade_watch::portal::LOGIN_TRIGGER_PATH;
use grade_watch::snapshot::store::SnapshotStore;
use serde_json::{json, Value};
use tokio::net::TcpListener;

const LOGIN_PAGE: &str = r#"<!DOCTYPE html>
<html><body>
  <form id="search" action="/search"><input name="q" value=""></form>
  <form id="fm1" method="post" action="login?service=portal">
    <input id="username" name="username" type="text" value="">
    <input id="password" name="password" type="password" value="">
    <input type="hidden" name="execution" value="e1s1">
    <input type="hidden" name="_eventId" value="submit">
  </form>
</body></html>"#;

#[derive(Clone)]
struct FakeSso {
    portal_base: String,
    cas_base: String,
    grades: Arc<Mutex<Value>>,
}

impl FakeSso {
    fn set_grades(&self, grades: Value) {
        *self.grades.lock().expect("grades lock") = grades;
    }
}

#[derive(Clone, Default)]
struct RecordingSink(Arc<Mutex<Vec<Notification>>>);

impl RecordingSink {
    fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.0.lock().expect("sink lock"))
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn send(&self, notification: &Notification) -> Result<()> {
        self.0.lock().expect("sink lock").push(notification.clone());
        Ok(())
    }
}

fn report(entries: &[(&str, &str)]) -> Value {
    let evaluations: Vec<Value> = entries
        .iter()
        .map(|(id, grade)| {
            json!({
                "id": id.parse::<u64>().expect("numeric id"),
                "description": format!("Contrôle {id}"),
                "note": {"value": grade, "moy": "11.00", "min": "4.00", "max": "18.00"}
            })
        })
        .collect();
    json!({
        "relevé": {
            "ressources": {
                "R1.01": {"titre": "Initiation au développement", "evaluations": evaluations}
            },
            "saes": {}
        }
    })
}

fn has_portal_session(headers: &HeaderMap) -> bool {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains("scodoc_session=s1"))
}

async fn trigger(
    State(sso): State<FakeSso>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if params.get("ticket").map(String::as_str) == Some("ST-1") {
        return (
            AppendHeaders([(SET_COOKIE, "scodoc_session=s1; Path=/")]),
            Html("<h1>ScoDoc</h1>"),
        )
            .into_response();
    }
    Redirect::to(&format!("{}/cas/login?service=portal", sso.cas_base)).into_response()
}

async fn data(
    State(sso): State<FakeSso>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !has_portal_session(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match params.get("q").map(String::as_str) {
        Some("dataPremièreConnexion") => Json(json!({
            "semestres": [
                {"formsemestre_id": 101, "titre": "BUT Info S1"},
                {"formsemestre_id": 202, "titre": "BUT Info S2"}
            ]
        }))
        .into_response(),
        Some("relevéEtudiant") if params.get("semestre").map(String::as_str) == Some("202") => {
            Json(sso.grades.lock().expect("grades lock").clone()).into_response()
        }
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn cas_page() -> Html<&'static str> {
    Html(LOGIN_PAGE)
}

async fn cas_submit(
    State(sso): State<FakeSso>,
    headers: HeaderMap,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    let field = |name: &str| fields.get(name).map(String::as_str);
    let referer_ok = headers
        .get(REFERER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|r| r.ends_with("/cas/login?service=portal"));
    let accepted = referer_ok
        && field("username") == Some("jdoe")
        && field("password") == Some("secret")
        && field("execution") == Some("e1s1")
        && field("submit").is_some()
        && field("q").is_none();
    if !accepted {
        return Html("<div class=\"errors\">Erreur : identifiants invalides</div>").into_response();
    }
    (
        AppendHeaders([(SET_COOKIE, "TGC=TGT-1; Path=/cas")]),
        Redirect::to(&format!(
            "{}{LOGIN_TRIGGER_PATH}?ticket=ST-1",
            sso.portal_base
        )),
    )
        .into_response()
}

async fn start_sso() -> FakeSso {
    let portal_listener = TcpListener::bind("127.0.0.1:0").await.expect("bind portal");
    let cas_listener = TcpListener::bind("127.0.0.1:0").await.expect("bind cas");
    let portal_port = portal_listener.local_addr().expect("portal addr").port();
    let cas_port = cas_listener.local_addr().expect("cas addr").port();

    let sso = FakeSso {
        portal_base: format!("http://127.0.0.1:{portal_port}"),
        cas_base: format!("http://localhost:{cas_port}"),
        grades: Arc::new(Mutex::new(report(&[]))),
    };

    let portal = Router::new()
        .route(LOGIN_TRIGGER_PATH, get(trigger))
        .route("/services/data.php", axum::routing::post(data))
        .with_state(sso.clone());
    let cas = Router::new()
        .route("/cas/login", get(cas_page).post(cas_submit))
        .with_state(sso.clone());

    tokio::spawn(async move {
        axum::serve(portal_listener, portal).await.expect("portal server");
    });
    tokio::spawn(async move {
        axum::serve(cas_listener, cas).await.expect("cas server");
    });
    sso
}

fn watcher(sso: &FakeSso, password: &str, store: SnapshotStore) -> Watcher {
    Watcher::new(
        SessionSettings::new(sso.portal_base.clone()),
        Credentials::new("jdoe", password),
        LOGIN_TRIGGER_PATH,
        store,
    )
}

#[tokio::test]
async fn full_cycles_detect_new_filled_and_updated_grades() {
    let sso = start_sso().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SnapshotStore::new(dir.path().join("state.json"));
    let sink = RecordingSink::default();
    let watcher = watcher(&sso, "secret", store.clone()).with_sink(Box::new(sink.clone()));

    sso.set_grades(report(&[("1", "15"), ("2", "~")]));
    let first = watcher.run_cycle().await.expect("first cycle");
    assert_eq!(
        first.auth,
        AuthOutcome::Authenticated {
            evidence: AuthEvidence::SessionCookie {
                name: "TGC".to_string()
            }
        }
    );
    assert!(first.initialization);
    assert_eq!(first.semester.as_ref().map(|s| s.id.as_str()), Some("202"));
    assert_eq!(first.events.len(), 1);
    assert_eq!(first.events[0].kind, ChangeKind::NewGrade);
    assert!(!first.events[0].escalate);
    let snapshot = store.load();
    assert_eq!(snapshot.get("1"), Some("15"));
    assert_eq!(snapshot.get("2"), Some("~"));
    let sent = sink.take();
    assert_eq!(sent.len(), 1);
    assert!(!sent[0].escalate());

    sso.set_grades(report(&[("1", "12"), ("2", "14.5")]));
    let second = watcher.run_cycle().await.expect("second cycle");
    assert!(!second.initialization);
    let kinds: Vec<_> = second.events.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![ChangeKind::GradeUpdated, ChangeKind::PlaceholderFilled]);
    let sent = sink.take();
    assert_eq!(sent.len(), 2);
    assert!(matches!(sent[0], Notification::GradeUpdated { .. }));
    assert!(sent[1].escalate());
    assert_eq!(store.load().get("2"), Some("14.5"));

    let third = watcher.run_cycle().await.expect("third cycle");
    assert!(third.events.is_empty());
    assert!(sink.take().is_empty());
}

#[tokio::test]
async fn wrong_password_fails_the_cycle_without_touching_state() {
    let sso = start_sso().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SnapshotStore::new(dir.path().join("state.json"));
    sso.set_grades(report(&[("1", "15")]));

    let err = watcher(&sso, "wrong", store.clone())
        .run_cycle()
        .await
        .expect_err("login must fail");
    assert!(matches!(
        err,
        CycleError::Login(AuthOutcome::Failed {
            reason: AuthFailure::ErrorPage
        })
    ));
    assert!(!store.path().exists());
}

#[tokio::test]
async fn missing_trigger_page_is_reported_as_misconfiguration() {
    let sso = start_sso().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let watcher = Watcher::new(
        SessionSettings::new(sso.portal_base.clone()),
        Credentials::new("jdoe", "secret"),
        "/nope",
        SnapshotStore::new(dir.path().join("state.json")),
    );

    let outcome = watcher.login_only().await.expect("login runs");
    assert!(matches!(
        outcome,
        AuthOutcome::Failed {
            reason: AuthFailure::Misconfigured { .. }
        }
    ));
}

/// Portal and CAS on one listener, reached as `127.0.0.1` and `localhost`.
async fn serve_single(build: impl FnOnce(String) -> Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let router = build(format!("http://localhost:{port}/cas/login?service=portal"));
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server");
    });
    format!("http://127.0.0.1:{port}")
}

fn single_watcher(base: String, dir: &tempfile::TempDir) -> Watcher {
    Watcher::new(
        SessionSettings::new(base),
        Credentials::new("jdoe", "secret"),
        LOGIN_TRIGGER_PATH,
        SnapshotStore::new(dir.path().join("state.json")),
    )
}

fn redirect_to_cas(cas: String) -> Router {
    Router::new().route(LOGIN_TRIGGER_PATH, get(move || async move { Redirect::to(&cas) }))
}

#[tokio::test]
async fn trigger_without_redirect_means_already_authenticated() {
    let base = serve_single(|_| {
        Router::new().route(LOGIN_TRIGGER_PATH, get(|| async { Html("<h1>ScoDoc</h1>") }))
    })
    .await;
    let dir = tempfile::tempdir().expect("tempdir");

    let outcome = single_watcher(base, &dir).login_only().await.expect("login runs");
    assert_eq!(
        outcome,
        AuthOutcome::Authenticated {
            evidence: AuthEvidence::AlreadyAuthenticated
        }
    );
}

#[tokio::test]
async fn server_error_without_redirect_fails() {
    let base = serve_single(|_| {
        Router::new().route(
            LOGIN_TRIGGER_PATH,
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        )
    })
    .await;
    let dir = tempfile::tempdir().expect("tempdir");

    let outcome = single_watcher(base, &dir).login_only().await.expect("login runs");
    assert_eq!(
        outcome,
        AuthOutcome::Failed {
            reason: AuthFailure::NoRedirect { status: 500 }
        }
    );
}

#[tokio::test]
async fn cas_page_without_form_is_a_hard_error() {
    let base = serve_single(|cas| {
        redirect_to_cas(cas).route(
            "/cas/login",
            get(|| async { Html("<p>Service en maintenance</p>") }),
        )
    })
    .await;
    let dir = tempfile::tempdir().expect("tempdir");

    let err = single_watcher(base, &dir)
        .login_only()
        .await
        .expect_err("no form to submit");
    assert!(matches!(err, PortalError::NoLoginForm { .. }));
}

#[tokio::test]
async fn unresolvable_form_action_fails_the_login() {
    let base = serve_single(|cas| {
        redirect_to_cas(cas).route(
            "/cas/login",
            get(|| async {
                Html(r#"<form id="fm1" action="http//broken"><input name="username"></form>"#)
            }),
        )
    })
    .await;
    let dir = tempfile::tempdir().expect("tempdir");

    let outcome = single_watcher(base, &dir).login_only().await.expect("login runs");
    assert!(matches!(
        outcome,
        AuthOutcome::Failed {
            reason: AuthFailure::InvalidAction { ref action, .. }
        } if action == "http//broken"
    ));
}

#[tokio::test]
async fn neutral_cas_answer_is_uncertain_and_rejected_session_stops_the_cycle() {
    let base = serve_single(|cas| {
        redirect_to_cas(cas)
            .route(
                "/cas/login",
                get(cas_page).post(|| async { Html("<p>Bienvenue</p>") }),
            )
            .route(
                "/services/data.php",
                axum::routing::post(|| async { StatusCode::UNAUTHORIZED }),
            )
    })
    .await;
    let dir = tempfile::tempdir().expect("tempdir");
    let watcher = single_watcher(base, &dir);

    let outcome = watcher.login_only().await.expect("login runs");
    assert!(matches!(outcome, AuthOutcome::Uncertain { .. }));

    let err = watcher.run_cycle().await.expect_err("portal rejects session");
    assert!(matches!(
        err,
        CycleError::UnverifiedSession {
            source: PortalError::FetchFailed { .. }
        }
    ));
    assert!(!watcher.store().path().exists());
}

#[tokio::test]
async fn unreachable_form_action_fails_at_submission() {
    let base = serve_single(|cas| {
        redirect_to_cas(cas).route(
            "/cas/login",
            get(|| async {
                Html(r#"<form id="fm1" action="http://127.0.0.1:1/cas/login"><input name="username"></form>"#)
            }),
        )
    })
    .await;
    let dir = tempfile::tempdir().expect("tempdir");

    let outcome = single_watcher(base, &dir).login_only().await.expect("login runs");
    assert!(matches!(
        outcome,
        AuthOutcome::Failed {
            reason: AuthFailure::Transport {
                stage: LoginStage::CredentialsSubmitted,
                ..
            }
        }
    ));
}
