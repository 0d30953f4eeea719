// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! High-level ScoutComp client: login, registration, password changes and
//! logout on top of the session store, gateway and profile resolver.

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::models::{
    AppConfig, Capabilities, ForcePasswordChangeRequest, LoginRequest, LoginResponse,
    PasswordChangeRequest, Profile, RefreshRequest, RegistrationRequest, RegistrationSettings,
    TokenPair,
};
use crate::services::gateway::Gateway;
use crate::services::profile::ProfileResolver;
use crate::services::session::{SessionSnapshot, SessionStore};
use crate::services::storage::{FileTokenStorage, TokenStorage};
use crate::services::transport::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// One per process; share it by `Arc`.
pub struct ScoutClient {
    transport: Arc<dyn HttpTransport>,
    session: Arc<SessionStore>,
    gateway: Arc<Gateway>,
    profiles: Arc<ProfileResolver>,
}

impl ScoutClient {
    /// Client using reqwest and the session file from `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let transport = ReqwestTransport::new(config)?;
        let storage = FileTokenStorage::new(&config.session_dir, &config.storage_key);
        Ok(Self::with_parts(
            config,
            Arc::new(transport),
            Arc::new(storage),
        ))
    }

    /// Client over an arbitrary transport and storage.
    pub fn with_parts(
        config: &ClientConfig,
        transport: Arc<dyn HttpTransport>,
        storage: Arc<dyn TokenStorage>,
    ) -> Self {
        let session = Arc::new(SessionStore::load(storage));
        let gateway = Arc::new(Gateway::new(
            transport.clone(),
            session.clone(),
            config.refresh_timeout,
        ));
        let profiles = Arc::new(ProfileResolver::new(gateway.clone()));

        Self {
            transport,
            session,
            gateway,
            profiles,
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Gateway for authenticated calls to the rest of the API.
    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    pub fn profiles(&self) -> &Arc<ProfileResolver> {
        &self.profiles
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.session.capabilities()
    }

    /// Keep the profile resolved across token refreshes in the background.
    pub fn spawn_profile_watcher(&self) -> JoinHandle<()> {
        self.profiles.spawn_watcher()
    }

    /// Resolve the profile of a restored session.
    pub async fn resume(&self) -> Result<Option<Profile>, ClientError> {
        self.profiles.sync().await
    }

    /// Exchange username and password for a session.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<SessionSnapshot, ClientError> {
        let response = self
            .transport
            .send(ApiRequest::post("/auth/login", credentials)?)
            .await?;

        if response.is_unauthorized() {
            tracing::info!(username = %credentials.username, "Login rejected");
            return Err(ClientError::InvalidCredentials(response.error_detail()));
        }

        let pair = token_pair(response)?;
        tracing::info!(username = %credentials.username, "Logged in");
        self.start_session(pair).await
    }

    /// Register a new account and start its session.
    pub async fn register(
        &self,
        payload: &RegistrationRequest,
    ) -> Result<SessionSnapshot, ClientError> {
        let response = self
            .transport
            .send(ApiRequest::post("/auth/register", payload)?)
            .await?;

        let pair = token_pair(response)?;
        tracing::info!(username = %payload.username, "Registered");
        self.start_session(pair).await
    }

    /// Set a new password for an account that must change it before logging in.
    pub async fn change_password(
        &self,
        payload: &ForcePasswordChangeRequest,
    ) -> Result<SessionSnapshot, ClientError> {
        let response = self
            .transport
            .send(ApiRequest::post("/auth/change-password", payload)?)
            .await?;

        if response.is_unauthorized() {
            return Err(ClientError::InvalidCredentials(response.error_detail()));
        }

        let pair = token_pair(response)?;
        tracing::info!(username = %payload.username, "Password changed");
        self.start_session(pair).await
    }

    /// Change the password of the logged-in user. The session is kept.
    pub async fn change_own_password(
        &self,
        payload: &PasswordChangeRequest,
    ) -> Result<(), ClientError> {
        if !self.session.snapshot().is_authenticated() {
            return Err(ClientError::NotAuthenticated);
        }
        self.gateway.put("/users/me/password", payload).await
    }

    /// End the session.
    ///
    /// The backend is asked to revoke the refresh token on a best-effort
    /// basis; local state is cleared whatever it answers.
    pub async fn logout(&self) {
        if let Some(refresh_token) = self.session.refresh_token() {
            if let Err(e) = self.notify_logout(refresh_token).await {
                tracing::warn!(error = %e, "Logout notification failed, clearing session anyway");
            }
        }

        self.session.clear();
        self.profiles.reset().await;
        tracing::info!("Logged out");
    }

    pub async fn registration_options(&self) -> Result<RegistrationSettings, ClientError> {
        self.gateway.get_json("/auth/options").await
    }

    pub async fn app_config(&self) -> Result<AppConfig, ClientError> {
        self.gateway.get_json("/config").await
    }

    async fn start_session(&self, pair: TokenPair) -> Result<SessionSnapshot, ClientError> {
        self.session.activate(pair.into())?;
        self.profiles.sync().await?;
        Ok(self.session.snapshot())
    }

    async fn notify_logout(&self, refresh_token: String) -> Result<(), ClientError> {
        let request = ApiRequest::post("/auth/logout", &RefreshRequest { refresh_token })?;
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| ClientError::LogoutNotification(e.to_string()))?;

        if !response.is_success() {
            return Err(ClientError::LogoutNotification(format!(
                "HTTP {}: {}",
                response.status,
                response.error_detail()
            )));
        }
        Ok(())
    }
}

/// Extract the token pair from an auth response, recognizing the
/// password-change demand in both success and error bodies.
fn token_pair(response: ApiResponse) -> Result<TokenPair, ClientError> {
    if !response.is_success() {
        let detail = response.error_detail();
        if let Some(message) = detail.password_change_message() {
            return Err(ClientError::PasswordChangeRequired { message });
        }
        return Err(ClientError::Api {
            status: response.status,
            detail,
        });
    }

    match response.json::<LoginResponse>()? {
        LoginResponse::Tokens(pair) => Ok(pair),
        LoginResponse::PasswordChange(demand) if demand.requires_password_change => {
            let message = if demand.message.is_empty() {
                "Password change required".to_string()
            } else {
                demand.message
            };
            Err(ClientError::PasswordChangeRequired { message })
        }
        LoginResponse::PasswordChange(_) => Err(ClientError::Decode(
            "auth response carried neither tokens nor a password-change demand".to_string(),
        )),
    }
}
