//! Account business logic: registration, login and profile changes

use crate::domain::{
    NewUser, SigninInput, SignupInput, UpdateAvatarInput, UpdateProfileInput, User,
    DEFAULT_ABOUT, DEFAULT_AVATAR, DEFAULT_NAME,
};
use crate::error::{ApiError, AuthFailure, Result};
use crate::jwt::JwtManager;
use crate::repository::UserRepository;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

pub struct AccountService<R: UserRepository> {
    repo: Arc<R>,
    jwt: JwtManager,
}

impl<R: UserRepository> AccountService<R> {
    pub fn new(repo: Arc<R>, jwt: JwtManager) -> Self {
        Self { repo, jwt }
    }

    /// Register a new user; the email must not be taken
    pub async fn register(&self, input: SignupInput) -> Result<User> {
        input.validate()?;

        let password_hash = hash_password(&input.password)?;
        let user = self
            .repo
            .create(&NewUser {
                email: input.email,
                password_hash,
                name: input.name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
                about: input.about.unwrap_or_else(|| DEFAULT_ABOUT.to_string()),
                avatar: input.avatar.unwrap_or_else(|| DEFAULT_AVATAR.to_string()),
            })
            .await?;

        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Check credentials and issue a session token.
    ///
    /// Unknown email and wrong password fail identically.
    pub async fn login(&self, input: SigninInput) -> Result<(User, String)> {
        input.validate()?;

        let user = match self.repo.find_by_email(&input.email).await? {
            Some(user) => user,
            None => {
                debug!("Login for unknown email");
                return Err(bad_credentials());
            }
        };

        if !verify_password(&input.password, &user.password_hash)? {
            return Err(bad_credentials());
        }

        let token = self.jwt.create_token(user.id)?;
        counter!("mesto_auth_login_total", "result" => "success").increment(1);
        info!(user_id = %user.id, "User signed in");
        Ok((user, token))
    }

    pub async fn get(&self, id: Uuid) -> Result<User> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        self.repo.list().await
    }

    pub async fn update_profile(&self, id: Uuid, input: UpdateProfileInput) -> Result<User> {
        input.validate()?;
        self.repo.update_profile(id, &input).await
    }

    pub async fn update_avatar(&self, id: Uuid, input: UpdateAvatarInput) -> Result<User> {
        input.validate()?;
        self.repo.update_avatar(id, &input.avatar).await
    }
}

fn bad_credentials() -> ApiError {
    counter!("mesto_auth_login_total", "result" => "failure").increment(1);
    ApiError::AuthenticationFailed(AuthFailure::BadCredentials)
}

/// Hash a password using Argon2
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Verify a password against its PHC hash
fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
