// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session store: the single source of truth for authentication state.
//!
//! Every token mutation writes durable storage and in-memory state under the
//! same write lock, storage first. A failed storage write leaves memory
//! untouched.
//!
//! Each login and each logout starts a new generation. A token refresh stays
//! within its generation, so work started for one session can tell when it
//! has been overtaken by another.

use crate::error::ClientError;
use crate::models::{Capabilities, Profile, SessionTokens};
use crate::services::storage::TokenStorage;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Default)]
struct SessionState {
    generation: u64,
    tokens: Option<SessionTokens>,
    profile: Option<Profile>,
    loading: bool,
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Anonymous,
    /// `loading` while the profile for the current token is being fetched.
    Authenticated { loading: bool },
}

/// Point-in-time copy of the session.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub tokens: Option<SessionTokens>,
    pub profile: Option<Profile>,
    pub loading: bool,
}

impl SessionSnapshot {
    pub fn phase(&self) -> SessionPhase {
        match self.tokens {
            None => SessionPhase::Anonymous,
            Some(_) => SessionPhase::Authenticated {
                loading: self.loading,
            },
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_some()
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::from_role(self.profile.as_ref().map(|p| p.user.role))
    }
}

impl From<&SessionState> for SessionSnapshot {
    fn from(state: &SessionState) -> Self {
        Self {
            tokens: state.tokens.clone(),
            profile: state.profile.clone(),
            loading: state.loading,
        }
    }
}

/// Authentication state plus its persistence.
pub struct SessionStore {
    state: RwLock<SessionState>,
    storage: Arc<dyn TokenStorage>,
    /// Active access token; receivers wake on every change.
    access_tx: watch::Sender<Option<String>>,
}

impl SessionStore {
    /// Restore the session persisted in `storage`, if any.
    pub fn load(storage: Arc<dyn TokenStorage>) -> Self {
        let tokens = match storage.load() {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load persisted session, starting anonymous");
                None
            }
        };

        if tokens.is_some() {
            tracing::info!("Restored persisted session");
        }

        let (access_tx, _) = watch::channel(tokens.as_ref().map(|t| t.access_token.clone()));
        let state = SessionState {
            generation: 0,
            loading: tokens.is_some(),
            tokens,
            profile: None,
        };

        Self {
            state: RwLock::new(state),
            storage,
            access_tx,
        }
    }

    /// Persist and activate a fresh token pair. The profile is reset.
    pub fn activate(&self, tokens: SessionTokens) -> Result<(), ClientError> {
        if !tokens.is_complete() {
            return Err(ClientError::Decode("incomplete token pair".to_string()));
        }

        let mut state = self.state.write();
        self.storage.save(&tokens)?;
        let generation = state.generation + 1;
        *state = SessionState {
            generation,
            tokens: Some(tokens),
            profile: None,
            loading: true,
        };
        self.publish(&state);
        Ok(())
    }

    /// Rotate the access token after a refresh.
    ///
    /// Applies only while `generation` is still current; returns `false` if
    /// the session was replaced or ended in the meantime.
    pub fn replace_access_token(
        &self,
        generation: u64,
        access_token: String,
        expires_in: u64,
    ) -> Result<bool, ClientError> {
        let mut state = self.state.write();
        if state.generation != generation {
            return Ok(false);
        }
        let Some(current) = state.tokens.as_ref() else {
            return Ok(false);
        };

        let updated = SessionTokens {
            access_token,
            refresh_token: current.refresh_token.clone(),
            expires_in,
        };
        self.storage.save(&updated)?;
        state.tokens = Some(updated);
        self.publish(&state);
        Ok(true)
    }

    /// Mark the profile as being (re)fetched.
    pub fn mark_loading(&self) {
        let mut state = self.state.write();
        if state.tokens.is_some() {
            state.loading = true;
        }
    }

    /// Store a profile resolved for `generation`. Ignored once that session
    /// has ended or been replaced.
    pub fn set_profile(&self, generation: u64, profile: Profile) -> bool {
        let mut state = self.state.write();
        if state.generation != generation || state.tokens.is_none() {
            return false;
        }
        state.profile = Some(profile);
        state.loading = false;
        true
    }

    /// Drop tokens and profile, in memory and in storage.
    pub fn clear(&self) {
        let mut state = self.state.write();
        self.clear_locked(&mut state);
    }

    fn clear_locked(&self, state: &mut SessionState) {
        if let Err(e) = self.storage.clear() {
            tracing::error!(error = %e, "Failed to remove persisted session");
        }
        let generation = state.generation + 1;
        *state = SessionState {
            generation,
            ..SessionState::default()
        };
        self.publish(state);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::from(&*self.state.read())
    }

    /// Clear the session only while `generation` is still current.
    pub fn clear_generation(&self, generation: u64) -> bool {
        let mut state = self.state.write();
        if state.generation != generation {
            return false;
        }
        self.clear_locked(&mut state);
        true
    }

    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// Current generation and token pair, read together.
    pub fn versioned_tokens(&self) -> Option<(u64, SessionTokens)> {
        let state = self.state.read();
        state.tokens.clone().map(|tokens| (state.generation, tokens))
    }

    pub fn access_token(&self) -> Option<String> {
        self.state
            .read()
            .tokens
            .as_ref()
            .map(|t| t.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state
            .read()
            .tokens
            .as_ref()
            .map(|t| t.refresh_token.clone())
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::from_role(self.state.read().profile.as_ref().map(|p| p.user.role))
    }

    /// Watch the active access token. `None` means anonymous.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.access_tx.subscribe()
    }

    fn publish(&self, state: &SessionState) {
        let next = state.tokens.as_ref().map(|t| t.access_token.clone());
        self.access_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}
