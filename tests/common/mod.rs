// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use scoutcomp_session::config::ClientConfig;
use scoutcomp_session::error::ClientError;
use scoutcomp_session::models::SessionTokens;
use scoutcomp_session::services::{
    ApiRequest, ApiResponse, HttpTransport, MemoryTokenStorage, Method, ScoutClient,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How long `/slow` takes before its bearer token is checked.
#[allow(dead_code)]
pub const SLOW_PATH_DELAY: Duration = Duration::from_millis(200);

/// How the fake backend answers `POST /auth/refresh`.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum RefreshBehavior {
    /// Issue this access token and accept it afterwards.
    Issue(String),
    /// Issue this access token but keep rejecting it.
    IssueRevoked(String),
    /// 401 "Invalid refresh token".
    Reject,
    /// Never answer.
    Hang,
}

struct BackendState {
    valid_tokens: HashSet<String>,
    refresh: RefreshBehavior,
    role: String,
    profile_fails: bool,
    logout_fails: bool,
    requests: Vec<(Method, String, Option<String>)>,
}

/// In-process ScoutComp backend used as the client's transport.
///
/// Accounts: `alice`/`secret` logs in normally and gets `A1`/`R1`,
/// `bob`/`secret` gets `B1`/`RB`, `forced`/`secret` must change its password
/// first. Requests to `/slow` are answered after [`SLOW_PATH_DELAY`].
pub struct MockBackend {
    pub refresh_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
    refresh_delay: Duration,
    state: Mutex<BackendState>,
}

#[allow(dead_code)]
impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            profile_calls: AtomicUsize::new(0),
            refresh_delay: Duration::from_millis(50),
            state: Mutex::new(BackendState {
                valid_tokens: HashSet::from(["A1".to_string()]),
                refresh: RefreshBehavior::Issue("A2".to_string()),
                role: "member".to_string(),
                profile_fails: false,
                logout_fails: false,
                requests: Vec::new(),
            }),
        })
    }

    pub fn set_refresh(&self, behavior: RefreshBehavior) {
        self.state.lock().unwrap().refresh = behavior;
    }

    pub fn set_role(&self, role: &str) {
        self.state.lock().unwrap().role = role.to_string();
    }

    pub fn set_profile_fails(&self, fails: bool) {
        self.state.lock().unwrap().profile_fails = fails;
    }

    pub fn set_logout_fails(&self, fails: bool) {
        self.state.lock().unwrap().logout_fails = fails;
    }

    /// Expire an access token server-side.
    pub fn revoke(&self, token: &str) {
        self.state.lock().unwrap().valid_tokens.remove(token);
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Bearer tokens seen for `path`, in order.
    pub fn bearers_for(&self, path: &str) -> Vec<Option<String>> {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|(_, p, _)| p == path)
            .map(|(_, _, bearer)| bearer.clone())
            .collect()
    }

    fn authorized(&self, request: &ApiRequest) -> bool {
        let state = self.state.lock().unwrap();
        request
            .bearer
            .as_ref()
            .is_some_and(|t| state.valid_tokens.contains(t))
    }

    fn token_pair(&self, access: &str, refresh: &str) -> ApiResponse {
        self.state
            .lock()
            .unwrap()
            .valid_tokens
            .insert(access.to_string());
        respond(
            200,
            json!({"access_token": access, "refresh_token": refresh, "token_type": "bearer", "expires_in": 900}),
        )
    }

    async fn refresh(&self, request: &ApiRequest) -> ApiResponse {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.refresh_delay).await;

        let presented = request
            .body
            .as_ref()
            .and_then(|b| b["refresh_token"].as_str())
            .unwrap_or_default()
            .to_string();
        let behavior = self.state.lock().unwrap().refresh.clone();

        match behavior {
            _ if presented != "R1" => respond(401, json!({"detail": "Invalid refresh token"})),
            RefreshBehavior::Issue(token) => {
                self.state
                    .lock()
                    .unwrap()
                    .valid_tokens
                    .insert(token.clone());
                respond(200, json!({"access_token": token, "token_type": "bearer", "expires_in": 900}))
            }
            RefreshBehavior::IssueRevoked(token) => {
                respond(200, json!({"access_token": token, "token_type": "bearer", "expires_in": 900}))
            }
            RefreshBehavior::Reject => respond(401, json!({"detail": "Invalid refresh token"})),
            RefreshBehavior::Hang => std::future::pending().await,
        }
    }

    fn profile(&self, request: &ApiRequest) -> ApiResponse {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        if !self.authorized(request) {
            return respond(401, json!({"detail": "Could not validate credentials"}));
        }
        let state = self.state.lock().unwrap();
        if state.profile_fails {
            return respond(500, json!({"detail": "Internal Server Error"}));
        }
        respond(
            200,
            json!({
                "user": {"id": 7, "username": "alice", "real_name": "Alice", "role": state.role},
                "scoreboard": {"total_points": 12.5, "member_rank": 1, "team_rank": null}
            }),
        )
    }
}

#[async_trait]
impl HttpTransport for MockBackend {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        self.state.lock().unwrap().requests.push((
            request.method,
            request.path.clone(),
            request.bearer.clone(),
        ));
        tokio::task::yield_now().await;
        if request.path == "/slow" {
            tokio::time::sleep(SLOW_PATH_DELAY).await;
        }

        let body = request.body.clone().unwrap_or(Value::Null);
        let response = match (request.method, request.path.as_str()) {
            (Method::Post, "/auth/login") => match (body["username"].as_str(), body["password"].as_str()) {
                (Some("alice"), Some("secret")) => self.token_pair("A1", "R1"),
                (Some("bob"), Some("secret")) => self.token_pair("B1", "RB"),
                (Some("forced"), Some("secret")) => respond(
                    200,
                    json!({"requires_password_change": true, "message": "Password change required"}),
                ),
                _ => respond(401, json!({"detail": "Invalid credentials"})),
            },
            (Method::Post, "/auth/register") => {
                if body["password"].as_str().map_or(0, str::len) < 8 {
                    respond(
                        422,
                        json!({"detail": [{"loc": ["body", "password"], "msg": "String should have at least 8 characters", "type": "string_too_short"}]}),
                    )
                } else {
                    self.token_pair("A1", "R1")
                }
            }
            (Method::Post, "/auth/change-password") => match body["old_password"].as_str() {
                Some("secret") => self.token_pair("A1", "R1"),
                _ => respond(401, json!({"detail": "Invalid credentials"})),
            },
            (Method::Post, "/auth/refresh") => self.refresh(&request).await,
            (Method::Post, "/auth/logout") => {
                self.logout_calls.fetch_add(1, Ordering::SeqCst);
                if self.state.lock().unwrap().logout_fails {
                    return Err(ClientError::Transport("connection reset by peer".to_string()));
                }
                ApiResponse::new(204, Vec::new())
            }
            (Method::Get, "/auth/options") => respond(
                200,
                json!({"allow_member_registration": true, "allow_admin_bootstrap": false}),
            ),
            (Method::Get, "/config") => respond(
                200,
                json!({"app_name": "ScoutComp", "app_icon": "", "leaderboard_default_view": "total", "allow_self_registration": true}),
            ),
            (Method::Get, "/users/me") => self.profile(&request),
            (Method::Put, "/users/me/password") if self.authorized(&request) => {
                ApiResponse::new(204, Vec::new())
            }
            (Method::Get, "/missing") => respond(404, json!({"detail": "Not Found"})),
            _ if self.authorized(&request) => {
                respond(200, json!({"path": request.path, "token": request.bearer}))
            }
            _ => respond(401, json!({"detail": "Could not validate credentials"})),
        };
        Ok(response)
    }
}

pub fn respond(status: u16, body: Value) -> ApiResponse {
    ApiResponse::new(status, serde_json::to_vec(&body).unwrap())
}

#[allow(dead_code)]
pub fn alice_tokens() -> SessionTokens {
    SessionTokens {
        access_token: "A1".to_string(),
        refresh_token: "R1".to_string(),
        expires_in: 900,
    }
}

/// Client over the mock backend with in-memory storage.
#[allow(dead_code)]
pub fn test_client(backend: &Arc<MockBackend>) -> (ScoutClient, Arc<MemoryTokenStorage>) {
    test_client_with(backend, ClientConfig::default(), MemoryTokenStorage::new())
}

#[allow(dead_code)]
pub fn test_client_with(
    backend: &Arc<MockBackend>,
    config: ClientConfig,
    storage: MemoryTokenStorage,
) -> (ScoutClient, Arc<MemoryTokenStorage>) {
    let storage = Arc::new(storage);
    let client = ScoutClient::with_parts(&config, backend.clone(), storage.clone());
    (client, storage)
}

/// Client that starts with alice's persisted session.
#[allow(dead_code)]
pub fn restored_client(backend: &Arc<MockBackend>) -> (ScoutClient, Arc<MemoryTokenStorage>) {
    let storage = MemoryTokenStorage::with_tokens(&alice_tokens()).unwrap();
    test_client_with(backend, ClientConfig::default(), storage)
}
