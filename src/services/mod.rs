// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - session, gateway and transport layers.

pub mod client;
pub mod gateway;
pub mod profile;
pub mod session;
pub mod storage;
pub mod transport;

pub use client::ScoutClient;
pub use gateway::Gateway;
pub use profile::ProfileResolver;
pub use session::{SessionPhase, SessionSnapshot, SessionStore};
pub use storage::{FileTokenStorage, MemoryTokenStorage, TokenStorage};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, ReqwestTransport};
