// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the ScoutComp API.

pub mod auth;
pub mod profile;

pub use auth::{
    AppConfig, ForcePasswordChangeRequest, LoginRequest, LoginResponse, PasswordChangeRequest,
    PasswordChangeRequired, RefreshRequest, RefreshTokenResponse, RegistrationRequest,
    RegistrationSettings, SessionTokens, TokenPair,
};
pub use profile::{Capabilities, Profile, Role, ScoreSummary, UserPublic};
