//! Attendee profile entities.
//!
//! All of these are owned by the profile store; the agent core only reads
//! them through the store contract. `ProfileCard` is the model-visible
//! projection: it carries the minimal public user fields (id, name, image)
//! and deliberately excludes email.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user (created at first OAuth sign-in).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An attendee's professional profile, at most one per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    #[serde(default)]
    pub tech_skills: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
}

/// A profile joined with the minimal public user fields.
///
/// This is what the `fetch_profiles` tool returns to the model: no email.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileCard {
    pub user_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    #[serde(default)]
    pub tech_skills: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
}

/// A persistent connection between two attendees.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    pub requester_id: String,
    pub target_id: String,
    pub created_at: DateTime<Utc>,
}

/// A connection formatted from one user's perspective: the "other" user
/// plus their profile, as the connections listing returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionView {
    pub id: String,
    pub connected_at: DateTime<Utc>,
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    pub is_requester: bool,
}
