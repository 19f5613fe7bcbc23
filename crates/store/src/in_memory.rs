//! In-memory profile store.
//!
//! Backs unit tests and local development; same contract as the SQLite
//! store, no persistence.

use crate::{ProfileDraft, ProfileStore, connection_view};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tentacool_core::error::StoreError;
use tentacool_core::profile::{Connection, ConnectionView, Profile, ProfileCard, User};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    users: HashMap<String, User>,
    profiles: HashMap<String, Profile>,
    connections: Vec<Connection>,
}

/// An in-process, ephemeral profile store.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: seed a user with a profile in one call.
    pub async fn seed_user(
        &self,
        name: &str,
        email: &str,
        draft: ProfileDraft,
    ) -> Result<User, StoreError> {
        let user = self.upsert_user(name, email, None).await?;
        self.upsert_profile(&user.id, draft).await?;
        Ok(user)
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn upsert_user(
        &self,
        name: &str,
        email: &str,
        image: Option<&str>,
    ) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner.users.values_mut().find(|u| u.email == email) {
            existing.name = name.to_string();
            existing.image = image.map(String::from);
            return Ok(existing.clone());
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            image: image.map(String::from),
            created_at: Utc::now(),
        };
        inner.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn upsert_profile(
        &self,
        user_id: &str,
        draft: ProfileDraft,
    ) -> Result<Profile, StoreError> {
        let mut inner = self.inner.write().await;

        if !inner.users.contains_key(user_id) {
            return Err(StoreError::NotFound {
                entity: "user",
                id: user_id.to_string(),
            });
        }

        let profile = Profile {
            user_id: user_id.to_string(),
            job_title: draft.job_title,
            company: draft.company,
            experience: draft.experience,
            tech_skills: draft.tech_skills,
            interests: draft.interests,
        };
        inner.profiles.insert(user_id.to_string(), profile.clone());
        Ok(profile)
    }

    async fn find_profile_by_user_id(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        Ok(self.inner.read().await.profiles.get(user_id).cloned())
    }

    async fn list_profiles(&self) -> Result<Vec<ProfileCard>, StoreError> {
        let inner = self.inner.read().await;
        let mut cards: Vec<ProfileCard> = inner
            .profiles
            .values()
            .filter_map(|p| {
                let user = inner.users.get(&p.user_id)?;
                Some(ProfileCard {
                    user_id: user.id.clone(),
                    name: user.name.clone(),
                    image: user.image.clone(),
                    job_title: p.job_title.clone(),
                    company: p.company.clone(),
                    experience: p.experience.clone(),
                    tech_skills: p.tech_skills.clone(),
                    interests: p.interests.clone(),
                })
            })
            .collect();
        cards.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(cards)
    }

    async fn create_connection(
        &self,
        requester_id: &str,
        target_id: &str,
    ) -> Result<Connection, StoreError> {
        let mut inner = self.inner.write().await;

        if !inner.users.contains_key(requester_id) {
            return Err(StoreError::NotFound {
                entity: "user",
                id: requester_id.to_string(),
            });
        }
        if !inner.users.contains_key(target_id) {
            return Err(StoreError::NotFound {
                entity: "user",
                id: target_id.to_string(),
            });
        }

        let exists = inner.connections.iter().any(|c| {
            (c.requester_id == requester_id && c.target_id == target_id)
                || (c.requester_id == target_id && c.target_id == requester_id)
        });
        if exists {
            return Err(StoreError::ConnectionExists {
                requester_id: requester_id.to_string(),
                target_id: target_id.to_string(),
            });
        }

        let connection = Connection {
            id: Uuid::new_v4().to_string(),
            requester_id: requester_id.to_string(),
            target_id: target_id.to_string(),
            created_at: Utc::now(),
        };
        inner.connections.push(connection.clone());
        Ok(connection)
    }

    async fn list_connections(&self, user_id: &str) -> Result<Vec<ConnectionView>, StoreError> {
        let inner = self.inner.read().await;

        let mut views: Vec<ConnectionView> = inner
            .connections
            .iter()
            .filter(|c| c.requester_id == user_id || c.target_id == user_id)
            .filter_map(|c| {
                let other_id = if c.requester_id == user_id {
                    &c.target_id
                } else {
                    &c.requester_id
                };
                let other = inner.users.get(other_id)?.clone();
                let profile = inner.profiles.get(other_id).cloned();
                Some(connection_view(c, user_id, other, profile))
            })
            .collect();

        views.sort_by(|a, b| b.connected_at.cmp(&a.connected_at));
        Ok(views)
    }
}
