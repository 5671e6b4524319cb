//! Admin role registry: environment-listed admins plus the `admins` table.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use sqlx::postgres::PgPool;
use tracing::{info, warn};

use crate::db;
use crate::models::AdminRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminChange {
    Added,
    AlreadyAdmin,
    Removed,
    /// Environment admins and the super admin cannot be removed
    Protected,
    NotAdmin,
}

pub struct AdminRegistry {
    pool: PgPool,
    env_ids: Vec<u64>,
    super_admin: Option<u64>,
    db_ids: Mutex<BTreeSet<u64>>,
}

impl AdminRegistry {
    pub fn new(pool: PgPool, env_ids: Vec<u64>, super_admin: Option<u64>) -> Self {
        Self {
            pool,
            env_ids,
            super_admin,
            db_ids: Mutex::new(BTreeSet::new()),
        }
    }

    /// Ids are stored in BIGINT columns
    fn db_id(user_id: u64) -> Result<i64> {
        i64::try_from(user_id).map_err(|_| anyhow!("user id {user_id} does not fit a BIGINT column"))
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<u64>> {
        self.db_ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reload table admins, seeding the super admin first when configured
    pub async fn load(&self) -> Result<usize> {
        if let Some(id) = self.super_admin {
            db::seed_super_admin(&self.pool, Self::db_id(id)?).await?;
        }
        let records = db::list_admins(&self.pool).await?;
        let ids: BTreeSet<u64> = records
            .iter()
            .filter_map(|r| u64::try_from(r.user_id).ok())
            .filter(|id| *id > 0)
            .collect();
        let count = ids.len();
        *self.lock() = ids;
        info!(env_admins = self.env_ids.len(), db_admins = count, "Admin registry loaded");
        Ok(count)
    }

    pub fn is_admin(&self, user_id: u64) -> bool {
        self.env_ids.contains(&user_id)
            || self.super_admin == Some(user_id)
            || self.lock().contains(&user_id)
    }

    pub fn is_protected(&self, user_id: u64) -> bool {
        self.env_ids.contains(&user_id) || self.super_admin == Some(user_id)
    }

    /// Every admin id, deduplicated, for notification fan-out
    pub fn ids(&self) -> Vec<u64> {
        let mut all: BTreeSet<u64> = self.lock().clone();
        all.extend(self.env_ids.iter().copied());
        all.extend(self.super_admin);
        all.into_iter().collect()
    }

    /// Admin ids as Telegram chat ids; ids outside the i64 range are skipped
    pub fn chat_ids(&self) -> Vec<i64> {
        self.ids().into_iter().filter_map(|id| i64::try_from(id).ok()).collect()
    }

    pub fn env_ids(&self) -> &[u64] {
        &self.env_ids
    }

    pub async fn list(&self) -> Result<Vec<AdminRecord>> {
        db::list_admins(&self.pool).await
    }

    pub async fn add(&self, user_id: u64, username: Option<&str>, added_by: u64) -> Result<AdminChange> {
        if self.is_admin(user_id) {
            return Ok(AdminChange::AlreadyAdmin);
        }
        let inserted = db::add_admin(&self.pool, Self::db_id(user_id)?, username, Self::db_id(added_by)?).await?;
        self.lock().insert(user_id);
        Ok(if inserted { AdminChange::Added } else { AdminChange::AlreadyAdmin })
    }

    pub async fn remove(&self, user_id: u64) -> Result<AdminChange> {
        if self.is_protected(user_id) {
            warn!(user_id, "Refusing to remove protected admin");
            return Ok(AdminChange::Protected);
        }
        if !self.lock().contains(&user_id) {
            return Ok(AdminChange::NotAdmin);
        }
        if db::remove_admin(&self.pool, Self::db_id(user_id)?).await? {
            self.lock().remove(&user_id);
            Ok(AdminChange::Removed)
        } else {
            Ok(AdminChange::Protected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn registry() -> AdminRegistry {
        // Lazy pools never connect unless a query runs
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        AdminRegistry::new(pool, vec![10, 20], Some(1))
    }

    #[tokio::test]
    async fn test_env_and_super_admins() {
        let registry = registry();
        assert!(registry.is_admin(10));
        assert!(registry.is_admin(1));
        assert!(!registry.is_admin(5));
        assert_eq!(registry.ids(), vec![1, 10, 20]);
    }

    #[tokio::test]
    async fn test_protected_admins_are_not_removed() {
        let registry = registry();
        assert_eq!(registry.remove(10).await.unwrap(), AdminChange::Protected);
        assert_eq!(registry.remove(1).await.unwrap(), AdminChange::Protected);
        assert_eq!(registry.remove(5).await.unwrap(), AdminChange::NotAdmin);
        assert_eq!(registry.add(20, None, 1).await.unwrap(), AdminChange::AlreadyAdmin);
    }

    #[tokio::test]
    async fn test_out_of_range_id_is_rejected_before_any_query() {
        let registry = registry();
        assert!(registry.add(u64::MAX, None, 1).await.is_err());
        assert!(!registry.is_admin(u64::MAX));
    }

    #[tokio::test]
    async fn test_db_admins_join_fan_out() {
        let registry = registry();
        registry.lock().insert(7);
        assert!(registry.is_admin(7));
        assert_eq!(registry.ids(), vec![1, 7, 10, 20]);
    }

    #[tokio::test]
    async fn test_chat_ids_skip_ids_outside_bigint() {
        let registry = registry();
        registry.lock().insert(u64::MAX);
        assert!(registry.ids().contains(&u64::MAX));
        assert_eq!(registry.chat_ids(), vec![1, 10, 20]);
    }
}
