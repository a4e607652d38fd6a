//! Authentication service: login, token issuance and password changes

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        account::{Account, ChangePassword, CurrentUser, LoginResponse, Role, UserClaims},
        member::CreateMember,
        staff::CreateStaff,
    },
    repository::{accounts::AccountProfile, Repository},
};

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a password against a stored Argon2 hash
pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Authenticate by email and password and return a signed token
    pub async fn login(&self, email: &str, password: &str) -> AppResult<LoginResponse> {
        let invalid = || AppError::Authentication("Invalid email or password".to_string());

        let account = match self.repository.accounts.find_by_email(email).await? {
            Some(account) => account,
            None => {
                tracing::warn!(email = %email, "Login rejected: unknown email");
                return Err(invalid());
            }
        };

        if !verify_password(&account.password_hash, password)? {
            tracing::warn!(account_id = account.id, "Login rejected: wrong password");
            return Err(invalid());
        }

        let profile = self.repository.accounts.profile(&account).await?;
        if !account.is_active || !profile.active {
            tracing::warn!(account_id = account.id, "Login rejected: account disabled");
            return Err(AppError::Authentication("Account is disabled".to_string()));
        }

        self.repository.accounts.touch_login(account.id).await?;
        tracing::info!(account_id = account.id, user_type = %account.user_type, "User logged in");

        self.issue(&account, &profile)
    }

    /// Build and sign claims for an account
    fn issue(&self, account: &Account, profile: &AccountProfile) -> AppResult<LoginResponse> {
        let now = Utc::now().timestamp();
        let expires_in = self.config.jwt_expiration_hours as i64 * 3600;

        let claims = UserClaims {
            sub: account.id.to_string(),
            email: account.email.clone(),
            name: profile.full_name.clone(),
            role: account.role,
            user_type: account.user_type,
            profile_id: profile.profile_id,
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
            exp: now + expires_in,
            iat: now,
        };

        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        Ok(LoginResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in,
            user: CurrentUser::try_from(&claims)?,
        })
    }

    /// Current principal, re-read from the database
    pub async fn me(&self, claims: &UserClaims) -> AppResult<CurrentUser> {
        let account = self.repository.accounts.get_by_id(claims.account_id()?).await?;
        let profile = self.repository.accounts.profile(&account).await?;
        Ok(CurrentUser {
            account_id: account.id,
            email: account.email,
            name: profile.full_name,
            role: account.role,
            user_type: account.user_type,
            profile_id: profile.profile_id,
        })
    }

    pub async fn change_password(&self, claims: &UserClaims, data: &ChangePassword) -> AppResult<()> {
        let account = self.repository.accounts.get_by_id(claims.account_id()?).await?;
        if !verify_password(&account.password_hash, &data.current_password)? {
            return Err(AppError::Authentication("Current password is incorrect".to_string()));
        }
        let hash = hash_password(&data.new_password)?;
        self.repository.accounts.update_password(account.id, &hash).await?;
        tracing::info!(account_id = account.id, "Password changed");
        Ok(())
    }

    /// Member self-registration; signs the new member in
    pub async fn register(&self, data: &CreateMember) -> AppResult<LoginResponse> {
        let hash = hash_password(&data.password)?;
        let member_id = self.repository.members.create(data, &hash).await?;
        tracing::info!(member_id, "Member registered");
        self.login(&data.email, &data.password).await
    }

    /// Create the first administrator when the staff table is empty
    pub async fn ensure_bootstrap_admin(&self) -> AppResult<()> {
        let (Some(email), Some(password)) = (
            self.config.bootstrap_admin_email.as_deref(),
            self.config.bootstrap_admin_password.as_deref(),
        ) else {
            return Ok(());
        };

        if self.repository.accounts.count_staff().await? > 0 {
            return Ok(());
        }

        let admin = CreateStaff {
            email: email.to_string(),
            password: password.to_string(),
            role: Role::Admin,
            full_name: "Administrator".to_string(),
            phone: None,
            position: None,
            hire_date: None,
        };
        let hash = hash_password(password)?;
        let id = self.repository.staff.create(&admin, &hash).await?;
        tracing::info!(staff_id = id, email = %email, "Bootstrap administrator created");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "correct horse").unwrap());
        assert!(!verify_password(&hash, "wrong horse").unwrap());
    }

    #[test]
    fn malformed_hash_is_an_internal_error() {
        assert!(matches!(
            verify_password("not-a-hash", "whatever"),
            Err(AppError::Internal(_))
        ));
    }
}
