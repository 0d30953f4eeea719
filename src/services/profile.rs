// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Keeps the current-user profile in step with the active access token.

use crate::error::{ClientError, RefreshFailureKind};
use crate::models::Profile;
use crate::services::gateway::Gateway;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Fetches `GET /users/me` whenever the access token changes.
pub struct ProfileResolver {
    gateway: Arc<Gateway>,
    /// Session generation and access token the stored profile was resolved for.
    resolved_for: Mutex<Option<(u64, String)>>,
}

impl ProfileResolver {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            resolved_for: Mutex::new(None),
        }
    }

    /// Resolve the profile for the active token unless already done.
    ///
    /// A failed fetch ends the session: a fresh token whose profile cannot be
    /// loaded is not trusted.
    pub async fn sync(&self) -> Result<Option<Profile>, ClientError> {
        let mut resolved_for = self.resolved_for.lock().await;
        let session = self.gateway.session();

        let Some((generation, tokens)) = session.versioned_tokens() else {
            *resolved_for = None;
            return Ok(None);
        };
        let key = (generation, tokens.access_token);
        if resolved_for.as_ref() == Some(&key) {
            return Ok(session.snapshot().profile);
        }

        session.mark_loading();
        match self.gateway.get_json::<Profile>("/users/me").await {
            Ok(profile) => {
                if !session.set_profile(generation, profile.clone()) {
                    *resolved_for = None;
                    return Ok(None);
                }
                // The fetch may have refreshed the token; the profile belongs to the new one.
                *resolved_for = session
                    .versioned_tokens()
                    .map(|(generation, tokens)| (generation, tokens.access_token));
                tracing::info!(
                    user_id = profile.user.id,
                    role = ?profile.user.role,
                    "Profile resolved"
                );
                Ok(Some(profile))
            }
            Err(e) if e.is_session_ended() => {
                *resolved_for = None;
                Err(e)
            }
            // A newer session owns the store now and resolves its own profile.
            Err(ClientError::RefreshFailed(failure))
                if failure.kind() == RefreshFailureKind::Superseded =>
            {
                *resolved_for = None;
                Err(ClientError::RefreshFailed(failure))
            }
            Err(e) => {
                *resolved_for = None;
                if !session.clear_generation(generation) {
                    return Err(e);
                }
                tracing::warn!(error = %e, "Profile fetch failed, session ended");
                Err(ClientError::ProfileFetch(e.to_string()))
            }
        }
    }

    /// Forget the resolved token (after logout).
    pub async fn reset(&self) {
        *self.resolved_for.lock().await = None;
    }

    /// Re-resolve the profile on every access-token change.
    ///
    /// The task ends once the session store is dropped.
    pub fn spawn_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let resolver: Weak<Self> = Arc::downgrade(self);
        let mut changes = self.gateway.session().subscribe();

        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let Some(resolver) = resolver.upgrade() else {
                    break;
                };
                if let Err(e) = resolver.sync().await {
                    tracing::warn!(error = %e, "Background profile resolution failed");
                }
            }
        })
    }
}
