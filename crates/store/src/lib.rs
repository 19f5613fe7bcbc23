//! Profile store adapter — CRUD access to Users, Profiles, and Connections.
//!
//! The agent core treats this as a black box satisfying simple contracts:
//! it reads profiles during a turn and never writes inside the agent loop.
//! Writes (profile edits, connection creation) happen only through the
//! separate CRUD surface.

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tentacool_core::error::StoreError;
use tentacool_core::profile::{Connection, ConnectionView, Profile, ProfileCard, User};

/// The fields a user may set on their own profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDraft {
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub tech_skills: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
}

/// The store contract the rest of the system programs against.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Create a user at first sign-in, or refresh name/image on later ones.
    /// Keyed by email.
    async fn upsert_user(
        &self,
        name: &str,
        email: &str,
        image: Option<&str>,
    ) -> Result<User, StoreError>;

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Create or update the user's profile (at most one per user).
    async fn upsert_profile(
        &self,
        user_id: &str,
        draft: ProfileDraft,
    ) -> Result<Profile, StoreError>;

    async fn find_profile_by_user_id(&self, user_id: &str) -> Result<Option<Profile>, StoreError>;

    /// All profiles joined with the minimal public user fields (no email).
    async fn list_profiles(&self) -> Result<Vec<ProfileCard>, StoreError>;

    /// Create a connection. Fails with `ConnectionExists` when one already
    /// exists in either direction, and with `NotFound` for unknown users.
    async fn create_connection(
        &self,
        requester_id: &str,
        target_id: &str,
    ) -> Result<Connection, StoreError>;

    /// All connections touching the user, newest first, formatted from
    /// their perspective.
    async fn list_connections(&self, user_id: &str) -> Result<Vec<ConnectionView>, StoreError>;
}

/// Format a raw connection from one user's perspective.
pub(crate) fn connection_view(
    conn: &Connection,
    viewer_id: &str,
    other: User,
    other_profile: Option<Profile>,
) -> ConnectionView {
    ConnectionView {
        id: conn.id.clone(),
        connected_at: conn.created_at,
        user: other,
        profile: other_profile,
        is_requester: conn.requester_id == viewer_id,
    }
}
