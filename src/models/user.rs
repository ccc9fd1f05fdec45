//! Account model
//!
//! User records, their public projection, and ledger entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Roles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    /// Parse a stored role string, defaulting unknowns to `User`.
    pub fn from_str(s: &str) -> Self {
        match s {
            "admin" => UserRole::Admin,
            _ => UserRole::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// User
// ============================================================================

/// A registered account.
///
/// `balance` and `tier` only change through the store's atomic upgrade
/// path. `referrals` and `verified` are written by external processes and
/// are read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Code other users supply as `ref` when registering.
    pub referral_code: String,
    /// Raw referral string given at registration, unvalidated.
    pub referred_by: Option<String>,
    pub referrals: i32,
    pub balance: i64,
    pub tier: i32,
    pub verified: bool,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a fresh account with ledger defaults applied.
    pub fn new(new_user: NewUser) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            referral_code: new_user.referral_code,
            referred_by: new_user.referred_by,
            referrals: 0,
            balance: 0,
            tier: 1,
            verified: false,
            role: UserRole::User,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for creating an account, after validation and password hashing.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub referral_code: String,
    pub referred_by: Option<String>,
}

/// The slice of a user that goes out on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub tier: i32,
    pub verified: bool,
    pub balance: i64,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            tier: user.tier,
            verified: user.verified,
            balance: user.balance,
        }
    }
}

// ============================================================================
// Transactions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionKind {
    Referral,
    Withdrawal,
    TierUpgrade,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionKind::Referral => "referral",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::TierUpgrade => "tier-upgrade",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "referral" => Ok(TransactionKind::Referral),
            "withdrawal" => Ok(TransactionKind::Withdrawal),
            "tier-upgrade" => Ok(TransactionKind::TierUpgrade),
            other => Err(format!("unknown transaction kind: {}", other)),
        }
    }
}

/// One ledger entry. Amounts are positive magnitudes; the kind says which
/// way the balance moved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: i64,
    pub description: String,
    pub date: DateTime<Utc>,
}

impl Transaction {
    pub fn tier_upgrade(amount: i64, description: String) -> Self {
        Self {
            kind: TransactionKind::TierUpgrade,
            amount,
            description,
            date: Utc::now(),
        }
    }
}

// ============================================================================
// Request Types
// ============================================================================

/// Registration payload. Every field is optional at the boundary so the
/// presence rules answer with a 400 instead of a deserialize rejection.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Referral code of the referring user, stored as given.
    #[serde(default, rename = "ref")]
    pub referred_by: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}
