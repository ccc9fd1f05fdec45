//! In-memory user store
//!
//! Backs local runs without a database, and every test. All mutations go
//! through one `RwLock`, which serializes upgrades the same way the
//! Postgres store's conditional update does.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{NewUser, Transaction, User};

use super::{StoreError, TierState, UserStore};

struct Record {
    user: User,
    transactions: Vec<Transaction>,
}

#[derive(Default)]
pub struct MemoryUserStore {
    records: RwLock<HashMap<Uuid, Record>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed user, bypassing registration. Lets tests set
    /// balances the way external credit events would.
    #[cfg(test)]
    pub async fn insert(&self, user: User) {
        let mut records = self.records.write().await;
        records.insert(
            user.id,
            Record {
                user,
                transactions: Vec::new(),
            },
        );
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(&id).map(|r| r.user.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| r.user.email == email)
            .map(|r| r.user.clone()))
    }

    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| r.user.username == username || r.user.email == email)
            .map(|r| r.user.clone()))
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut records = self.records.write().await;
        for record in records.values() {
            if record.user.username == new_user.username {
                return Err(StoreError::Duplicate("username".to_string()));
            }
            if record.user.email == new_user.email {
                return Err(StoreError::Duplicate("email".to_string()));
            }
            if record.user.referral_code == new_user.referral_code {
                return Err(StoreError::Duplicate("referral_code".to_string()));
            }
        }

        let user = User::new(new_user);
        records.insert(
            user.id,
            Record {
                user: user.clone(),
                transactions: Vec::new(),
            },
        );
        Ok(user)
    }

    async fn apply_upgrade(
        &self,
        id: Uuid,
        from_tier: i32,
        cost: i64,
        description: &str,
    ) -> Result<Option<TierState>, StoreError> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(&id) else {
            return Ok(None);
        };

        // Precondition re-checked under the write lock.
        if record.user.tier != from_tier || record.user.balance < cost {
            return Ok(None);
        }

        record.user.balance -= cost;
        record.user.tier += 1;
        record.user.updated_at = Utc::now();
        record
            .transactions
            .push(Transaction::tier_upgrade(cost, description.to_string()));

        Ok(Some(TierState {
            tier: record.user.tier,
            balance: record.user.balance,
        }))
    }

    async fn transactions_for(&self, id: Uuid) -> Result<Option<Vec<Transaction>>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(&id).map(|r| r.transactions.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionKind;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            referral_code: username.to_string(),
            referred_by: None,
        }
    }

    #[tokio::test]
    async fn create_and_find() {
        let store = MemoryUserStore::new();
        let user = store
            .create(new_user("alice", "alice@example.com"))
            .await
            .unwrap();

        let by_id = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "alice");

        let by_email = store
            .find_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, user.id);

        assert!(store
            .find_by_email("nobody@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn create_rejects_duplicates() {
        let store = MemoryUserStore::new();
        store
            .create(new_user("alice", "alice@example.com"))
            .await
            .unwrap();

        let err = store
            .create(new_user("alice", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(ref f) if f == "username"));

        let err = store
            .create(new_user("bob", "alice@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(ref f) if f == "email"));
    }

    #[tokio::test]
    async fn find_by_username_or_email_matches_either() {
        let store = MemoryUserStore::new();
        store
            .create(new_user("alice", "alice@example.com"))
            .await
            .unwrap();

        assert!(store
            .find_by_username_or_email("alice", "x@example.com")
            .await
            .unwrap()
            .is_some());
        assert!(store
            .find_by_username_or_email("x", "alice@example.com")
            .await
            .unwrap()
            .is_some());
        assert!(store
            .find_by_username_or_email("x", "x@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn apply_upgrade_debits_and_records() {
        let store = MemoryUserStore::new();
        let mut user = User::new(new_user("alice", "alice@example.com"));
        user.balance = 10_000;
        let id = user.id;
        store.insert(user).await;

        let state = store
            .apply_upgrade(id, 1, 7_000, "Upgraded to Tier 2")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.tier, 2);
        assert_eq!(state.balance, 3_000);

        let log = store.transactions_for(id).await.unwrap().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, TransactionKind::TierUpgrade);
        assert_eq!(log[0].amount, 7_000);
        assert_eq!(log[0].description, "Upgraded to Tier 2");
    }

    #[tokio::test]
    async fn apply_upgrade_refuses_stale_or_poor_state() {
        let store = MemoryUserStore::new();
        let mut user = User::new(new_user("alice", "alice@example.com"));
        user.balance = 5_000;
        let id = user.id;
        store.insert(user).await;

        // Balance below cost.
        assert!(store
            .apply_upgrade(id, 1, 7_000, "Upgraded to Tier 2")
            .await
            .unwrap()
            .is_none());
        // Stale tier.
        assert!(store
            .apply_upgrade(id, 2, 1_000, "Upgraded to Tier 3")
            .await
            .unwrap()
            .is_none());
        // Unknown user.
        assert!(store
            .apply_upgrade(Uuid::new_v4(), 1, 1_000, "x")
            .await
            .unwrap()
            .is_none());

        // Nothing changed and nothing was logged.
        let user = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.balance, 5_000);
        assert_eq!(user.tier, 1);
        assert!(store
            .transactions_for(id)
            .await
            .unwrap()
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn transactions_for_unknown_user_is_none() {
        let store = MemoryUserStore::new();
        assert!(store
            .transactions_for(Uuid::new_v4())
            .await
            .unwrap()
            .is_none());
    }
}
