// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authenticated request gateway.
//!
//! Handles:
//! - Bearer token on every request while a session is active
//! - Single-flight token refresh when the backend answers 401
//! - Replay of the rejected request (once) with the refreshed token
//! - Session teardown when the refresh token itself is rejected

use crate::error::{ClientError, RefreshFailure};
use crate::models::{RefreshRequest, RefreshTokenResponse};
use crate::services::session::SessionStore;
use crate::services::transport::{ApiRequest, ApiResponse, HttpTransport};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

type RefreshOutcome = Result<String, RefreshFailure>;

/// Refresh coordination state. Waiters are released in arrival order.
#[derive(Default)]
enum RefreshState {
    #[default]
    Idle,
    InFlight(Vec<oneshot::Sender<RefreshOutcome>>),
}

/// What a request rejected with 401 does next.
enum RefreshTurn {
    /// A refresh is in flight; wait for its result.
    Wait(oneshot::Receiver<RefreshOutcome>),
    /// Run the refresh for this session generation and refresh token.
    Initiate { generation: u64, refresh_token: String },
}

/// Sends API requests on behalf of the current session.
pub struct Gateway {
    transport: Arc<dyn HttpTransport>,
    session: Arc<SessionStore>,
    refresh: Mutex<RefreshState>,
    refresh_timeout: Duration,
}

impl Gateway {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        session: Arc<SessionStore>,
        refresh_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            session,
            refresh: Mutex::new(RefreshState::Idle),
            refresh_timeout,
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Send a request with the active access token.
    ///
    /// A 401 triggers one token refresh (shared with every other request
    /// rejected at the same time) and a single replay. Whatever the replay
    /// returns is final, including a second 401.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let used_token = self.session.access_token();
        let response = self.dispatch(request.clone(), used_token.clone()).await?;
        if !response.is_unauthorized() {
            return Ok(response);
        }

        if self.session.refresh_token().is_none() {
            return Ok(response);
        }

        let token = self.refreshed_access_token(used_token.as_deref()).await?;
        self.dispatch(request, Some(token)).await
    }

    /// GET and decode a JSON response.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(ApiRequest::get(path)).await?.into_result()?.json()
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::post(path, body)?)
            .await?
            .into_result()?
            .json()
    }

    /// PUT a JSON body and decode the JSON response.
    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::put(path, body)?)
            .await?
            .into_result()?
            .json()
    }

    /// PUT a JSON body, ignoring the response body.
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), ClientError> {
        self.send(ApiRequest::put(path, body)?).await?.into_result()?;
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.send(ApiRequest::delete(path)).await?.into_result()?;
        Ok(())
    }

    async fn dispatch(
        &self,
        request: ApiRequest,
        token: Option<String>,
    ) -> Result<ApiResponse, ClientError> {
        let request = match token {
            Some(token) => request.with_bearer(token),
            None => request,
        };
        self.transport.send(request).await
    }

    /// Get a refreshed access token, joining the in-flight refresh if there is one.
    async fn refreshed_access_token(&self, rejected: Option<&str>) -> Result<String, ClientError> {
        // Check-and-set under one lock with no await in between: exactly one
        // caller sees Idle and becomes the initiator.
        let turn = {
            let mut state = self.refresh.lock();
            match &mut *state {
                RefreshState::InFlight(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    RefreshTurn::Wait(rx)
                }
                RefreshState::Idle => {
                    // A refresh that finished while this request was out
                    // already rotated the token, or ended the session.
                    let Some((generation, tokens)) = self.session.versioned_tokens() else {
                        return Err(RefreshFailure::new("session ended").into());
                    };
                    if Some(tokens.access_token.as_str()) != rejected {
                        return Ok(tokens.access_token);
                    }
                    *state = RefreshState::InFlight(Vec::new());
                    RefreshTurn::Initiate {
                        generation,
                        refresh_token: tokens.refresh_token,
                    }
                }
            }
        };

        let (generation, refresh_token) = match turn {
            RefreshTurn::Wait(rx) => {
                tracing::debug!("Token refresh in flight, waiting for result");
                let outcome = rx.await.unwrap_or_else(|_| {
                    Err(RefreshFailure::abandoned("token refresh was abandoned"))
                });
                return outcome.map_err(ClientError::from);
            }
            RefreshTurn::Initiate {
                generation,
                refresh_token,
            } => (generation, refresh_token),
        };

        let mut cycle = RefreshCycle {
            state: &self.refresh,
            finished: false,
        };
        let outcome = self.perform_refresh(generation, &refresh_token).await;
        let waiters = cycle.finish();

        tracing::debug!(waiters = waiters.len(), ok = outcome.is_ok(), "Releasing refresh waiters");
        for waiter in waiters {
            // A waiter whose request was dropped no longer cares.
            let _ = waiter.send(outcome.clone());
        }

        outcome.map_err(ClientError::from)
    }

    /// Call the refresh endpoint and apply the result to the session.
    ///
    /// Nothing is applied, and nothing is cleared, once `generation` has been
    /// replaced by a logout or a new login.
    async fn perform_refresh(&self, generation: u64, refresh_token: &str) -> RefreshOutcome {
        tracing::info!("Access token rejected, refreshing");

        let result = match self.request_refresh(refresh_token).await {
            Ok(response) => response,
            Err(failure) => {
                if !self.session.clear_generation(generation) {
                    tracing::info!("Session changed during failed token refresh, keeping it");
                    return Err(RefreshFailure::superseded(
                        "session changed during token refresh",
                    ));
                }
                tracing::warn!(reason = %failure, "Token refresh failed, session ended");
                return Err(failure);
            }
        };

        match self.session.replace_access_token(
            generation,
            result.access_token.clone(),
            result.expires_in,
        ) {
            Ok(true) => {
                tracing::info!("Access token refreshed");
                Ok(result.access_token)
            }
            Ok(false) => {
                tracing::info!("Session changed during token refresh, discarding result");
                Err(RefreshFailure::superseded(
                    "session changed during token refresh",
                ))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to persist refreshed token, ending session");
                self.session.clear_generation(generation);
                Err(RefreshFailure::new(e.to_string()))
            }
        }
    }

    async fn request_refresh(
        &self,
        refresh_token: &str,
    ) -> Result<RefreshTokenResponse, RefreshFailure> {
        let body = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };
        let request = ApiRequest::post("/auth/refresh", &body)
            .map_err(|e| RefreshFailure::new(e.to_string()))?;

        let response = tokio::time::timeout(self.refresh_timeout, self.transport.send(request))
            .await
            .map_err(|_| {
                RefreshFailure::new(format!(
                    "token refresh timed out after {}s",
                    self.refresh_timeout.as_secs_f64()
                ))
            })?
            .map_err(|e| RefreshFailure::new(e.to_string()))?;

        if !response.is_success() {
            return Err(RefreshFailure::new(format!(
                "refresh rejected (HTTP {}): {}",
                response.status,
                response.error_detail()
            )));
        }

        response
            .json::<RefreshTokenResponse>()
            .map_err(|e| RefreshFailure::new(e.to_string()))
    }
}

/// Resets the refresh state when the initiator finishes or is cancelled.
///
/// On cancellation the queued senders are dropped, which rejects every waiter.
struct RefreshCycle<'a> {
    state: &'a Mutex<RefreshState>,
    finished: bool,
}

impl RefreshCycle<'_> {
    fn finish(&mut self) -> Vec<oneshot::Sender<RefreshOutcome>> {
        self.finished = true;
        match std::mem::take(&mut *self.state.lock()) {
            RefreshState::InFlight(waiters) => waiters,
            RefreshState::Idle => Vec::new(),
        }
    }
}

impl Drop for RefreshCycle<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("Token refresh cancelled, rejecting waiters");
            self.finish();
        }
    }
}
