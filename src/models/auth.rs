// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token and authentication payloads.

use super::profile::Role;
use serde::{Deserialize, Serialize};

/// Active session credentials, persisted as `{accessToken, refreshToken, expiresIn}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    /// Short-lived bearer credential
    pub access_token: String,
    /// Credential used to mint new access tokens
    pub refresh_token: String,
    /// Seconds until the access token expires (advisory)
    pub expires_in: u64,
}

impl SessionTokens {
    /// Both tokens are present. Anything else is not a session.
    pub fn is_complete(&self) -> bool {
        !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }
}

/// Token pair issued by login, registration and password change.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "bearer")]
    pub token_type: String,
    pub expires_in: u64,
}

impl From<TokenPair> for SessionTokens {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
        }
    }
}

fn bearer() -> String {
    "bearer".to_string()
}

/// Response of `POST /auth/refresh`. Only the access token is rotated.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTokenResponse {
    pub access_token: String,
    #[serde(default = "bearer")]
    pub token_type: String,
    pub expires_in: u64,
}

/// Body of `POST /auth/refresh` and `POST /auth/logout`.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Signal that the account must change its password before a session is issued.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordChangeRequired {
    pub requires_password_change: bool,
    #[serde(default)]
    pub message: String,
}

/// Successful login body: either tokens or a password-change demand.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LoginResponse {
    Tokens(TokenPair),
    PasswordChange(PasswordChangeRequired),
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistrationRequest {
    pub username: String,
    pub real_name: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_language: Option<String>,
}

/// Forced password change for an account that cannot log in yet.
#[derive(Debug, Clone, Serialize)]
pub struct ForcePasswordChangeRequest {
    pub username: String,
    pub old_password: String,
    pub new_password: String,
}

/// Password change for the logged-in user.
#[derive(Debug, Clone, Serialize)]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Which self-service registrations the backend accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationSettings {
    pub allow_member_registration: bool,
    pub allow_admin_bootstrap: bool,
}

/// Public application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub app_name: String,
    #[serde(default)]
    pub app_icon: String,
    #[serde(default)]
    pub leaderboard_default_view: String,
    #[serde(default)]
    pub allow_self_registration: bool,
}
