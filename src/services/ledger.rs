//! Ledger / tier engine
//!
//! The balance-and-tier state machine: price the next tier, check the
//! balance covers it, debit, advance, and append the ledger entry. The
//! debit and advance happen in one atomic store update keyed on the tier
//! the validation saw, so two racing upgrades can never both spend the
//! same balance.

use std::sync::Arc;

use uuid::Uuid;

use crate::models::Transaction;
use crate::store::{StoreError, TierState, UserStore};

/// Highest purchasable tier.
pub const MAX_TIER: i32 = 3;

/// Cost in balance units to reach `tier` from the tier below it.
///
/// The tier-4 row is priced but sits behind the max-tier rule.
pub fn upgrade_cost(tier: i32) -> Option<i64> {
    match tier {
        2 => Some(7_000),
        3 => Some(12_000),
        4 => Some(35_000),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("User not found")]
    UserNotFound,

    #[error("Already at maximum tier")]
    AlreadyMaxTier,

    #[error("Insufficient balance for upgrade")]
    InsufficientBalance { required: i64, current: i64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct LedgerService {
    store: Arc<dyn UserStore>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Buy the next tier for `user_id`, returning the tier and balance
    /// after the debit.
    ///
    /// Validation runs against a fresh read; the store applies the debit
    /// only while that read is still current. A lost race re-reads and
    /// re-validates rather than charging a stale balance.
    pub async fn upgrade_tier(&self, user_id: Uuid) -> Result<TierState, LedgerError> {
        loop {
            let user = self
                .store
                .find_by_id(user_id)
                .await?
                .ok_or(LedgerError::UserNotFound)?;

            if user.tier >= MAX_TIER {
                return Err(LedgerError::AlreadyMaxTier);
            }

            let next_tier = user.tier + 1;
            let Some(cost) = upgrade_cost(next_tier) else {
                // Off-table tiers cannot occur below MAX_TIER; refuse them
                // the same way just in case.
                return Err(LedgerError::AlreadyMaxTier);
            };

            if user.balance < cost {
                return Err(LedgerError::InsufficientBalance {
                    required: cost,
                    current: user.balance,
                });
            }

            let description = format!("Upgraded to Tier {}", next_tier);
            match self
                .store
                .apply_upgrade(user_id, user.tier, cost, &description)
                .await?
            {
                Some(state) => {
                    tracing::info!(
                        "Tier upgrade - user: {}, tier: {} -> {}, cost: {}, balance: {}",
                        user_id,
                        user.tier,
                        state.tier,
                        cost,
                        state.balance
                    );
                    return Ok(state);
                }
                // A concurrent upgrade won the race; validate the new state.
                None => continue,
            }
        }
    }

    /// The user's ledger in append order.
    pub async fn transactions(&self, user_id: Uuid) -> Result<Vec<Transaction>, LedgerError> {
        self.store
            .transactions_for(user_id)
            .await?
            .ok_or(LedgerError::UserNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewUser, TransactionKind, User};
    use crate::store::MemoryUserStore;

    fn service() -> (LedgerService, Arc<MemoryUserStore>) {
        let store = Arc::new(MemoryUserStore::new());
        (LedgerService::new(store.clone()), store)
    }

    async fn seed_user(store: &MemoryUserStore, tier: i32, balance: i64) -> Uuid {
        let mut user = User::new(NewUser {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "hash".to_string(),
            referral_code: "alice".to_string(),
            referred_by: None,
        });
        user.tier = tier;
        user.balance = balance;
        let id = user.id;
        store.insert(user).await;
        id
    }

    #[test]
    fn cost_table_prices_each_reachable_tier() {
        assert_eq!(upgrade_cost(2), Some(7_000));
        assert_eq!(upgrade_cost(3), Some(12_000));
        assert_eq!(upgrade_cost(4), Some(35_000));
        assert_eq!(upgrade_cost(1), None);
        assert_eq!(upgrade_cost(5), None);
    }

    #[tokio::test]
    async fn exact_balance_buys_each_tier() {
        for tier in [1, 2] {
            let (ledger, store) = service();
            let cost = upgrade_cost(tier + 1).unwrap();
            let id = seed_user(&store, tier, cost).await;

            let state = ledger.upgrade_tier(id).await.unwrap();
            assert_eq!(state.tier, tier + 1);
            assert_eq!(state.balance, 0);

            let log = ledger.transactions(id).await.unwrap();
            assert_eq!(log.len(), 1);
            assert_eq!(log[0].kind, TransactionKind::TierUpgrade);
            assert_eq!(log[0].amount, cost);
            assert_eq!(log[0].description, format!("Upgraded to Tier {}", tier + 1));
        }
    }

    #[tokio::test]
    async fn max_tier_refuses_any_balance() {
        let (ledger, store) = service();
        let id = seed_user(&store, 3, 1_000_000).await;

        let err = ledger.upgrade_tier(id).await.unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyMaxTier));

        let user = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.tier, 3);
        assert_eq!(user.balance, 1_000_000);
    }

    #[tokio::test]
    async fn short_balance_fails_without_side_effects() {
        let (ledger, store) = service();
        let id = seed_user(&store, 1, 6_999).await;

        for _ in 0..2 {
            // Retrying with unchanged balance fails identically.
            let err = ledger.upgrade_tier(id).await.unwrap_err();
            assert!(matches!(
                err,
                LedgerError::InsufficientBalance {
                    required: 7_000,
                    current: 6_999,
                }
            ));
        }

        let user = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.tier, 1);
        assert_eq!(user.balance, 6_999);
        assert!(ledger.transactions(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upgrade_then_immediate_retry_reports_shortfall() {
        let (ledger, store) = service();
        let id = seed_user(&store, 1, 7_000).await;

        let state = ledger.upgrade_tier(id).await.unwrap();
        assert_eq!(state.tier, 2);
        assert_eq!(state.balance, 0);

        let log = ledger.transactions(id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, TransactionKind::TierUpgrade);
        assert_eq!(log[0].amount, 7_000);

        let err = ledger.upgrade_tier(id).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientBalance {
                required: 12_000,
                current: 0,
            }
        ));
        let user = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.tier, 2);
    }

    #[tokio::test]
    async fn ledger_keeps_append_order_across_upgrades() {
        let (ledger, store) = service();
        let id = seed_user(&store, 1, 19_000).await;

        ledger.upgrade_tier(id).await.unwrap();
        ledger.upgrade_tier(id).await.unwrap();

        let log = ledger.transactions(id).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].amount, 7_000);
        assert_eq!(log[0].description, "Upgraded to Tier 2");
        assert_eq!(log[1].amount, 12_000);
        assert_eq!(log[1].description, "Upgraded to Tier 3");
        assert!(log[0].date <= log[1].date);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let (ledger, _) = service();
        let id = Uuid::new_v4();

        assert!(matches!(
            ledger.upgrade_tier(id).await.unwrap_err(),
            LedgerError::UserNotFound
        ));
        assert!(matches!(
            ledger.transactions(id).await.unwrap_err(),
            LedgerError::UserNotFound
        ));
    }

    #[tokio::test]
    async fn racing_upgrades_spend_the_balance_once() {
        let (ledger, store) = service();
        let id = seed_user(&store, 1, 7_000).await;

        let (a, b) = tokio::join!(ledger.upgrade_tier(id), ledger.upgrade_tier(id));

        // Exactly one call wins; the loser re-validates against the new
        // state and reports the tier-3 shortfall.
        let (won, lost) = match (a, b) {
            (Ok(won), Err(lost)) => (won, lost),
            (Err(lost), Ok(won)) => (won, lost),
            other => panic!("expected exactly one success, got {:?}", other),
        };
        assert_eq!(won.tier, 2);
        assert_eq!(won.balance, 0);
        assert!(matches!(
            lost,
            LedgerError::InsufficientBalance {
                required: 12_000,
                current: 0,
            }
        ));

        let user = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.tier, 2);
        assert_eq!(user.balance, 0);
        assert_eq!(ledger.transactions(id).await.unwrap().len(), 1);
    }
}
