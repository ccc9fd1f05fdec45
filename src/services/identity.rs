//! Identity service
//!
//! Registration and login. Owns the presence rules for both operations,
//! delegates persistence to the user store and credential handling to the
//! password hasher and token signer.

use std::sync::Arc;

use uuid::Uuid;

use crate::auth::jwt::{JwtManager, TokenError};
use crate::auth::password::{self, HashError};
use crate::models::{LoginRequest, NewUser, PublicUser, RegisterRequest};
use crate::store::{StoreError, UserStore};

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Please provide all required fields")]
    MissingFields,

    #[error("Email and password required")]
    MissingCredentials,

    #[error("User already exists")]
    AlreadyExists,

    /// Unknown email and wrong password share one message on purpose.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Successful login: the signed session token plus the public projection.
#[derive(Debug)]
pub struct Session {
    pub token: String,
    pub user: PublicUser,
}

pub struct IdentityService {
    store: Arc<dyn UserStore>,
    jwt: JwtManager,
}

impl IdentityService {
    pub fn new(store: Arc<dyn UserStore>, jwt: JwtManager) -> Self {
        Self { store, jwt }
    }

    /// Create an account and return its id.
    ///
    /// The referral code defaults to the username. A supplied `ref` code is
    /// stored verbatim without checking that it belongs to anyone.
    pub async fn register(&self, req: RegisterRequest) -> Result<Uuid, IdentityError> {
        let (Some(username), Some(email), Some(pass)) = (req.username, req.email, req.password)
        else {
            return Err(IdentityError::MissingFields);
        };
        if username.is_empty() || email.is_empty() || pass.is_empty() {
            return Err(IdentityError::MissingFields);
        }

        if self
            .store
            .find_by_username_or_email(&username, &email)
            .await?
            .is_some()
        {
            return Err(IdentityError::AlreadyExists);
        }

        let password_hash = password::hash_password(&pass)?;

        let new_user = NewUser {
            referral_code: username.clone(),
            username,
            email,
            password_hash,
            referred_by: req.referred_by.filter(|code| !code.is_empty()),
        };

        // A racing registration can slip past the pre-check; the unique
        // index reports it as the same conflict.
        let user = match self.store.create(new_user).await {
            Ok(user) => user,
            Err(StoreError::Duplicate(_)) => return Err(IdentityError::AlreadyExists),
            Err(e) => return Err(e.into()),
        };

        tracing::info!("User registered - username: {}, id: {}", user.username, user.id);

        Ok(user.id)
    }

    /// Check credentials and mint a session token.
    pub async fn authenticate(&self, req: LoginRequest) -> Result<Session, IdentityError> {
        let (Some(email), Some(pass)) = (req.email, req.password) else {
            return Err(IdentityError::MissingCredentials);
        };
        if email.is_empty() || pass.is_empty() {
            return Err(IdentityError::MissingCredentials);
        }

        let Some(user) = self.store.find_by_email(&email).await? else {
            return Err(IdentityError::InvalidCredentials);
        };

        if !password::verify_password(&pass, &user.password_hash) {
            return Err(IdentityError::InvalidCredentials);
        }

        let token = self.jwt.generate_token(user.id, user.role)?;

        tracing::info!("User logged in - id: {}", user.id);

        Ok(Session {
            token,
            user: PublicUser::from(user),
        })
    }
}
