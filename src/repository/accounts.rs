//! Accounts repository: credentials, login bookkeeping and the profile
//! (member or staff row) behind each account

use sqlx::{Pool, Postgres, Transaction};

use super::{violation, Violation};
use crate::{
    error::{AppError, AppResult},
    models::{
        account::{Account, Role, UserType},
        member::MemberStatus,
    },
};

/// Profile facts needed to admit a login
#[derive(Debug, Clone, PartialEq)]
pub struct AccountProfile {
    pub profile_id: i32,
    pub full_name: String,
    /// Set for members only
    pub member_status: Option<MemberStatus>,
    /// Staff `is_active`, or member status other than inactive
    pub active: bool,
}

fn duplicate_email(e: sqlx::Error) -> AppError {
    match violation(&e) {
        Some(Violation::Unique) => AppError::Conflict("Email already registered".to_string()),
        _ => e.into(),
    }
}

#[derive(Clone)]
pub struct AccountsRepository {
    pool: Pool<Postgres>,
}

impl AccountsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Account> {
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account {} not found", id)))
    }

    /// Lookup by email, case-insensitive
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT * FROM accounts WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    /// Member or staff row owning the account
    pub async fn profile(&self, account: &Account) -> AppResult<AccountProfile> {
        let profile = match account.user_type {
            UserType::Member => {
                let (id, full_name, status): (i32, String, MemberStatus) = sqlx::query_as(
                    "SELECT id, full_name, status FROM members WHERE account_id = $1",
                )
                .bind(account.id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| AppError::NotFound("Member profile not found".to_string()))?;
                AccountProfile {
                    profile_id: id,
                    full_name,
                    member_status: Some(status),
                    active: status.can_log_in(),
                }
            }
            UserType::Staff => {
                let (id, full_name, is_active): (i32, String, bool) = sqlx::query_as(
                    "SELECT id, full_name, is_active FROM staff WHERE account_id = $1",
                )
                .bind(account.id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| AppError::NotFound("Staff profile not found".to_string()))?;
                AccountProfile {
                    profile_id: id,
                    full_name,
                    member_status: None,
                    active: is_active,
                }
            }
        };
        Ok(profile)
    }

    pub async fn touch_login(&self, id: i32) -> AppResult<()> {
        sqlx::query("UPDATE accounts SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_password(&self, id: i32, password_hash: &str) -> AppResult<()> {
        sqlx::query("UPDATE accounts SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn count_staff(&self) -> AppResult<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM staff")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    // =========================================================================
    // Helpers for profile repositories (run inside their transaction)
    // =========================================================================

    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        email: &str,
        password_hash: &str,
        user_type: UserType,
        role: Role,
    ) -> AppResult<i32> {
        if !role.is_valid_for(user_type) {
            return Err(AppError::Validation(format!(
                "Role {} is not valid for {} accounts",
                role, user_type
            )));
        }
        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO accounts (email, password_hash, user_type, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(email.trim())
        .bind(password_hash)
        .bind(user_type)
        .bind(role)
        .fetch_one(&mut **tx)
        .await
        .map_err(duplicate_email)?;
        Ok(id)
    }

    pub async fn update_identity(
        tx: &mut Transaction<'_, Postgres>,
        id: i32,
        email: Option<&str>,
        role: Option<Role>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE accounts SET email = COALESCE($2, email), role = COALESCE($3, role)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(email.map(str::trim))
        .bind(role)
        .execute(&mut **tx)
        .await
        .map_err(duplicate_email)?;
        Ok(())
    }

    pub async fn set_active(
        tx: &mut Transaction<'_, Postgres>,
        id: i32,
        active: bool,
    ) -> AppResult<()> {
        sqlx::query("UPDATE accounts SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}
