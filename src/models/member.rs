//! Member model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::text_enum;
use crate::error::{AppError, AppResult};

/// Membership status; members are never hard-deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Active,
    Suspended,
    Inactive,
}

text_enum!(MemberStatus {
    Active => "active",
    Suspended => "suspended",
    Inactive => "inactive",
});

impl MemberStatus {
    pub fn check_can_borrow(self) -> AppResult<()> {
        match self {
            MemberStatus::Active => Ok(()),
            MemberStatus::Suspended => Err(AppError::Conflict(
                "Member is suspended and cannot borrow".to_string(),
            )),
            MemberStatus::Inactive => Err(AppError::Conflict(
                "Member account is inactive".to_string(),
            )),
        }
    }

    /// Suspended members keep read access to their loans and inbox
    pub fn can_log_in(self) -> bool {
        self != MemberStatus::Inactive
    }
}

/// Member with account email
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Member {
    pub id: i32,
    pub account_id: i32,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub membership_date: NaiveDate,
    pub status: MemberStatus,
    /// Open loans (computed)
    #[sqlx(default)]
    pub open_loans: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Member list filters
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct MemberQuery {
    /// Search in name or email
    pub search: Option<String>,
    pub status: Option<MemberStatus>,
}

/// Create member request (staff side or self-registration)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateMember {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 200, message = "Full name must be 1-200 characters"))]
    pub full_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

/// Update member request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateMember {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Full name must be 1-200 characters"))]
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    /// Staff only: suspend or reactivate
    pub status: Option<MemberStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_members_borrow() {
        assert!(MemberStatus::Active.check_can_borrow().is_ok());
        assert!(matches!(
            MemberStatus::Suspended.check_can_borrow(),
            Err(AppError::Conflict(_))
        ));
        assert!(MemberStatus::Inactive.check_can_borrow().is_err());
    }

    #[test]
    fn suspended_members_still_log_in() {
        assert!(MemberStatus::Suspended.can_log_in());
        assert!(!MemberStatus::Inactive.can_log_in());
    }
}
