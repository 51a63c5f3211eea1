//! In-process profile cache keyed by account id.
//!
//! A profile is fetched from the store the first time an account id is seen
//! and served from memory afterwards. Writes go through the cache so the quota
//! counter stays current without a round-trip per request.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::profile::{DailyUsage, TeacherProfile};
use crate::profile::store::ProfileStore;

#[derive(Clone, Default)]
pub struct ProfileCache {
    profiles: Arc<RwLock<HashMap<Uuid, TeacherProfile>>>,
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached profile, loading it only for an account id not yet cached.
    pub async fn get_or_load(
        &self,
        account_id: Uuid,
        store: &dyn ProfileStore,
    ) -> Result<TeacherProfile, AppError> {
        if let Some(profile) = self.profiles.read().await.get(&account_id) {
            return Ok(profile.clone());
        }

        debug!("Profile cache miss for account {account_id}");
        let profile = store
            .load_profile(account_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile {account_id} not found")))?;

        self.profiles
            .write()
            .await
            .insert(account_id, profile.clone());
        Ok(profile)
    }

    pub async fn put(&self, profile: TeacherProfile) {
        self.profiles.write().await.insert(profile.id, profile);
    }

    /// Replaces only the usage counter of a cached profile, leaving any edit
    /// that landed since the caller's snapshot intact. No-op if not cached.
    pub async fn set_usage(&self, account_id: Uuid, usage: Option<DailyUsage>) {
        if let Some(profile) = self.profiles.write().await.get_mut(&account_id) {
            profile.daily_usage = usage;
        }
    }

    pub async fn evict(&self, account_id: Uuid) {
        self.profiles.write().await.remove(&account_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::models::profile::{NewProfile, ProfileUpdate};
    use crate::models::student::{Course, Gender};

    struct CountingStore {
        loads: AtomicUsize,
    }

    #[async_trait]
    impl ProfileStore for CountingStore {
        async fn load_profile(&self, id: Uuid) -> Result<Option<TeacherProfile>, AppError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if id.is_nil() {
                return Ok(None);
            }
            Ok(Some(TeacherProfile {
                id,
                email: "mestre@escola.cat".to_string(),
                display_name: "Pere".to_string(),
                current_course: Course::Second,
                gender: Gender::Male,
                is_premium: false,
                daily_usage: None,
                llm_api_key: None,
            }))
        }

        async fn create_profile(
            &self,
            _id: Uuid,
            _profile: &NewProfile,
        ) -> Result<TeacherProfile, AppError> {
            Err(AppError::Validation("profiles are read-only here".to_string()))
        }

        async fn update_profile(&self, _id: Uuid, _update: &ProfileUpdate) -> Result<(), AppError> {
            Ok(())
        }
    }

    fn store() -> CountingStore {
        CountingStore {
            loads: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_same_account_is_loaded_once() {
        let cache = ProfileCache::new();
        let store = store();
        let id = Uuid::new_v4();

        for _ in 0..3 {
            cache.get_or_load(id, &store).await.unwrap();
        }
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_account_change_triggers_load() {
        let cache = ProfileCache::new();
        let store = store();

        cache.get_or_load(Uuid::new_v4(), &store).await.unwrap();
        cache.get_or_load(Uuid::new_v4(), &store).await.unwrap();
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_put_replaces_cached_profile() {
        let cache = ProfileCache::new();
        let store = store();
        let id = Uuid::new_v4();

        let mut profile = cache.get_or_load(id, &store).await.unwrap();
        profile.is_premium = true;
        cache.put(profile).await;

        assert!(cache.get_or_load(id, &store).await.unwrap().is_premium);
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_evict_forces_reload() {
        let cache = ProfileCache::new();
        let store = store();
        let id = Uuid::new_v4();

        cache.get_or_load(id, &store).await.unwrap();
        cache.evict(id).await;
        cache.get_or_load(id, &store).await.unwrap();
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_account_is_not_found() {
        let cache = ProfileCache::new();
        let result = cache.get_or_load(Uuid::nil(), &store()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_set_usage_keeps_edits_made_after_snapshot() {
        let cache = ProfileCache::new();
        let store = store();
        let id = Uuid::new_v4();

        let snapshot = cache.get_or_load(id, &store).await.unwrap();

        let mut upgraded = snapshot.clone();
        upgraded.is_premium = true;
        upgraded.llm_api_key = Some("sk-own".to_string());
        cache.put(upgraded).await;

        let today = chrono::NaiveDate::from_ymd_opt(2024, 11, 4).unwrap();
        let advanced = crate::evaluation::quota::record_usage(snapshot, today);
        cache.set_usage(id, advanced.daily_usage).await;

        let cached = cache.get_or_load(id, &store).await.unwrap();
        assert!(cached.is_premium);
        assert_eq!(cached.llm_api_key.as_deref(), Some("sk-own"));
        assert_eq!(cached.daily_usage, Some(DailyUsage { date: today, count: 1 }));
    }

    #[tokio::test]
    async fn test_set_usage_ignores_evicted_account() {
        let cache = ProfileCache::new();
        let store = store();
        let id = Uuid::new_v4();

        cache.get_or_load(id, &store).await.unwrap();
        cache.evict(id).await;
        cache
            .set_usage(
                id,
                Some(DailyUsage {
                    date: chrono::NaiveDate::from_ymd_opt(2024, 11, 4).unwrap(),
                    count: 3,
                }),
            )
            .await;

        assert!(cache.get_or_load(id, &store).await.unwrap().daily_usage.is_none());
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);
    }
}
