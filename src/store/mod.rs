//! User store
//!
//! The store owns every account record and is the only place balance and
//! tier state can change. Implementations must make `apply_upgrade`
//! atomic per user: the tier and balance preconditions and the debit are
//! checked and applied as one step, so concurrent upgrades can never
//! double-charge.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{NewUser, Transaction, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique field (username, email or referral code) is already taken.
    #[error("duplicate value for {0}")]
    Duplicate(String),

    /// A stored record failed to map back into the domain model.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Tier and balance right after an upgrade, reported by the atomic update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierState {
    pub tier: i32,
    pub balance: i64,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Lookup matching either unique identity field. Used as the
    /// registration pre-check.
    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError>;

    /// Persist a new account. Unique-field collisions surface as
    /// [`StoreError::Duplicate`].
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Debit `cost`, advance the tier by one and append the matching
    /// ledger entry, but only while the user still sits at `from_tier`
    /// with `balance >= cost`. Returns the resulting state, or `None`
    /// when the user is missing or the precondition no longer holds.
    async fn apply_upgrade(
        &self,
        id: Uuid,
        from_tier: i32,
        cost: i64,
        description: &str,
    ) -> Result<Option<TierState>, StoreError>;

    /// The user's ledger in append order, or `None` for an unknown user.
    async fn transactions_for(&self, id: Uuid) -> Result<Option<Vec<Transaction>>, StoreError>;
}
