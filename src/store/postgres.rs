//! PostgreSQL user store
//!
//! Production backend. The upgrade path is a single conditional UPDATE
//! plus the ledger insert, inside one database transaction; a guard that
//! no longer holds simply matches zero rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{NewUser, Transaction, TransactionKind, User, UserRole};

use super::{StoreError, TierState, UserStore};

const USER_COLUMNS: &str = "id, username, email, password_hash, referral_code, referred_by, \
     referrals, balance, tier, verified, role, created_at, updated_at";

type UserRow = (
    Uuid,
    String,
    String,
    String,
    String,
    Option<String>,
    i32,
    i64,
    i32,
    bool,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn user_from_row(row: UserRow) -> User {
    let (
        id,
        username,
        email,
        password_hash,
        referral_code,
        referred_by,
        referrals,
        balance,
        tier,
        verified,
        role,
        created_at,
        updated_at,
    ) = row;
    User {
        id,
        username,
        email,
        password_hash,
        referral_code,
        referred_by,
        referrals,
        balance,
        tier,
        verified,
        role: UserRole::from_str(&role),
        created_at,
        updated_at,
    }
}

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(user_from_row))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE username = $1 OR email = $2",
            USER_COLUMNS
        ))
        .bind(username)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let user = User::new(new_user);

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, referral_code, referred_by,
                               referrals, balance, tier, verified, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.referral_code)
        .bind(&user.referred_by)
        .bind(user.referrals)
        .bind(user.balance)
        .bind(user.tier)
        .bind(user.verified)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Duplicate(db.constraint().unwrap_or("user").to_string())
            }
            _ => StoreError::Database(e),
        })?;

        Ok(user)
    }

    async fn apply_upgrade(
        &self,
        id: Uuid,
        from_tier: i32,
        cost: i64,
        description: &str,
    ) -> Result<Option<TierState>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated: Option<(i32, i64)> = sqlx::query_as(
            r#"
            UPDATE users
            SET balance = balance - $3, tier = tier + 1, updated_at = NOW()
            WHERE id = $1 AND tier = $2 AND balance >= $3
            RETURNING tier, balance
            "#,
        )
        .bind(id)
        .bind(from_tier)
        .bind(cost)
        .fetch_optional(&mut *tx)
        .await?;

        // Guard missed: tx drops here and rolls back the empty update.
        let Some((tier, balance)) = updated else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO transactions (user_id, kind, amount, description, date)
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind(id)
        .bind(TransactionKind::TierUpgrade.to_string())
        .bind(cost)
        .bind(description)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(TierState { tier, balance }))
    }

    async fn transactions_for(&self, id: Uuid) -> Result<Option<Vec<Transaction>>, StoreError> {
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Ok(None);
        }

        let rows: Vec<(String, i64, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT kind, amount, description, date FROM transactions WHERE user_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let transactions = rows
            .into_iter()
            .map(|(kind, amount, description, date)| {
                let kind = kind.parse().map_err(StoreError::Corrupt)?;
                Ok(Transaction {
                    kind,
                    amount,
                    description,
                    date,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(Some(transactions))
    }
}
