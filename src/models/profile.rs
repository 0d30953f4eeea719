// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Current-user profile and role-derived capabilities.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// User role as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    GroupAdmin,
    Member,
    #[serde(other)]
    Unknown,
}

/// Public user record from `GET /users/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPublic {
    pub id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub real_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_language")]
    pub preferred_language: String,
    pub role: Role,
    #[serde(default)]
    pub team_id: Option<i64>,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default = "active")]
    pub is_active: bool,
    #[serde(default, with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    /// First login; the user should pick a new password
    #[serde(default)]
    pub needs_password_change: bool,
    /// Teams a group admin manages
    #[serde(default)]
    pub managed_team_ids: Vec<i64>,
}

fn default_language() -> String {
    "cs".to_string()
}

fn active() -> bool {
    true
}

/// Score summary attached to the profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    #[serde(default)]
    pub total_points: f64,
    #[serde(default)]
    pub member_rank: Option<u32>,
    #[serde(default)]
    pub team_rank: Option<u32>,
}

/// Snapshot of the logged-in user, derived from the active access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user: UserPublic,
    #[serde(default)]
    pub scoreboard: ScoreSummary,
}

impl Profile {
    pub fn capabilities(&self) -> Capabilities {
        Capabilities::from_role(Some(self.user.role))
    }
}

/// What the current user may do. A pure function of the role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub is_admin: bool,
    pub is_group_admin: bool,
    pub can_manage_users: bool,
    pub can_review_completions: bool,
}

impl Capabilities {
    /// Capabilities for a role; `None` (no profile) grants nothing.
    pub fn from_role(role: Option<Role>) -> Self {
        match role {
            Some(Role::Admin) => Self {
                is_admin: true,
                is_group_admin: false,
                can_manage_users: true,
                can_review_completions: true,
            },
            Some(Role::GroupAdmin) => Self {
                is_admin: false,
                is_group_admin: true,
                can_manage_users: true,
                can_review_completions: true,
            },
            Some(Role::Member) | Some(Role::Unknown) | None => Self::default(),
        }
    }
}

/// Timestamps arrive either as RFC 3339 or as naive UTC (`2024-01-01T10:00:00.123`).
mod lenient_timestamp {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_some(&ts.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(Some(ts.with_timezone(&Utc)));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Some(naive.and_utc()))
            .map_err(serde::de::Error::custom)
    }
}
