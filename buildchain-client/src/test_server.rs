//! In-process stand-in for a Jenkins server
//!
//! Issues crumbs bound to a `JSESSIONID` session cookie and only accepts
//! state-changing requests that carry both, like a real controller does.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use buildchain_core::config::Credential;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use crate::JenkinsClient;

const CRUMB_FIELD: &str = "Jenkins-Crumb";
const SESSION_COOKIE: &str = "JSESSIONID";

#[derive(Clone)]
pub(crate) struct FakeJenkins {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    /// Session id to the crumb issued for it
    sessions: HashMap<String, String>,
    crumb_issuer: bool,
    expire_crumb_once: bool,
    trigger_status: StatusCode,
    stop_status: StatusCode,
    build: Value,
    crumb_requests: usize,
    trigger_requests: usize,
}

impl FakeJenkins {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                sessions: HashMap::new(),
                crumb_issuer: true,
                expire_crumb_once: false,
                trigger_status: StatusCode::CREATED,
                stop_status: StatusCode::FOUND,
                build: json!({"number": 1, "building": true, "result": null}),
                crumb_requests: 0,
                trigger_requests: 0,
            })),
        }
    }

    /// Answer 404 on the crumb issuer and skip crumb checks
    pub(crate) fn without_crumb_issuer(self) -> Self {
        self.inner.lock().unwrap().crumb_issuer = false;
        self
    }

    /// Forget every issued crumb on the first POST that carries a valid one
    pub(crate) fn expire_crumb_once(self) -> Self {
        self.inner.lock().unwrap().expire_crumb_once = true;
        self
    }

    pub(crate) fn trigger_status(self, status: u16) -> Self {
        self.inner.lock().unwrap().trigger_status = status_code(status);
        self
    }

    pub(crate) fn stop_status(self, status: u16) -> Self {
        self.inner.lock().unwrap().stop_status = status_code(status);
        self
    }

    /// Body served for every `job/<name>/<number>/api/json` request
    pub(crate) fn build(self, build: Value) -> Self {
        self.inner.lock().unwrap().build = build;
        self
    }

    pub(crate) fn crumb_requests(&self) -> usize {
        self.inner.lock().unwrap().crumb_requests
    }

    /// Trigger requests that passed the crumb check
    pub(crate) fn trigger_requests(&self) -> usize {
        self.inner.lock().unwrap().trigger_requests
    }

    /// Serve on an ephemeral local port and return the base URL
    pub(crate) async fn start(&self) -> String {
        let app = Router::new()
            .route("/crumbIssuer/api/json", get(crumb_issuer))
            .route("/job/{name}/build", post(trigger))
            .route("/job/{name}/buildWithParameters", post(trigger))
            .route("/job/{name}/{number}/stop", post(stop))
            .route("/job/{name}/{number}/api/json", get(build_status))
            .with_state(self.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}", addr)
    }
}

/// Client with the production HTTP stack pointed at a local server
pub(crate) fn client_for(base_url: &str) -> JenkinsClient {
    let credential = Credential {
        username: "deployer".to_string(),
        secret: "token".to_string(),
    };
    JenkinsClient::new(base_url, credential, Duration::from_secs(5)).unwrap()
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap()
}

fn has_basic_auth(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("Basic "))
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

/// Checks the crumb header against the crumb issued to the caller's session
fn crumb_rejection(inner: &mut Inner, headers: &HeaderMap) -> Option<Response> {
    if !inner.crumb_issuer {
        return None;
    }

    let crumb = headers.get(CRUMB_FIELD).and_then(|value| value.to_str().ok());
    let valid = match (session_cookie(headers), crumb) {
        (Some(session), Some(crumb)) => inner
            .sessions
            .get(&session)
            .is_some_and(|issued| issued == crumb),
        _ => false,
    };

    if valid && inner.expire_crumb_once {
        inner.expire_crumb_once = false;
        inner.sessions.clear();
    } else if valid {
        return None;
    }

    Some(
        (
            StatusCode::FORBIDDEN,
            "No valid crumb was included in the request",
        )
            .into_response(),
    )
}

async fn crumb_issuer(State(server): State<FakeJenkins>, headers: HeaderMap) -> Response {
    if !has_basic_auth(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let mut inner = server.inner.lock().unwrap();
    inner.crumb_requests += 1;
    if !inner.crumb_issuer {
        return StatusCode::NOT_FOUND.into_response();
    }

    let session = format!("node0{}", inner.crumb_requests);
    let crumb = format!("crumb-{}", inner.crumb_requests);
    inner.sessions.insert(session.clone(), crumb.clone());

    (
        StatusCode::OK,
        [(header::SET_COOKIE, format!("{}={}; Path=/", SESSION_COOKIE, session))],
        Json(json!({
            "_class": "hudson.security.csrf.DefaultCrumbIssuer",
            "crumb": crumb,
            "crumbRequestField": CRUMB_FIELD,
        })),
    )
        .into_response()
}

async fn trigger(State(server): State<FakeJenkins>, headers: HeaderMap) -> Response {
    if !has_basic_auth(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let mut inner = server.inner.lock().unwrap();
    if let Some(rejection) = crumb_rejection(&mut inner, &headers) {
        return rejection;
    }
    inner.trigger_requests += 1;

    let status = inner.trigger_status;
    if status.is_success() || status.is_redirection() {
        (status, [(header::LOCATION, "/queue/item/1/")]).into_response()
    } else {
        (status, format!("trigger refused with {}", status.as_u16())).into_response()
    }
}

async fn stop(State(server): State<FakeJenkins>, headers: HeaderMap) -> Response {
    if !has_basic_auth(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let mut inner = server.inner.lock().unwrap();
    if let Some(rejection) = crumb_rejection(&mut inner, &headers) {
        return rejection;
    }

    (inner.stop_status, "stop refused").into_response()
}

async fn build_status(State(server): State<FakeJenkins>, headers: HeaderMap) -> Response {
    if !has_basic_auth(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let inner = server.inner.lock().unwrap();
    Json(inner.build.clone()).into_response()
}
