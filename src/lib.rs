// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! ScoutComp session client.
//!
//! This crate keeps a ScoutComp user's session: it logs in, persists the
//! token pair, attaches it to API calls, refreshes it once for any number of
//! concurrently rejected requests, and tracks the user's profile and role.

pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use config::ClientConfig;
pub use error::{ClientError, ErrorDetail, RefreshFailure, RefreshFailureKind};
pub use services::ScoutClient;
