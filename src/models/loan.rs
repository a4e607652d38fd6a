//! Loan model and lifecycle rules
//!
//! Overdue is never written to the database: a stored `active` loan whose due
//! date has passed is reported as `overdue` by every read path. The SQL
//! fragment [`EFFECTIVE_STATUS_SQL`] and [`LoanStatus::effective`] are the two
//! renderings of that single rule.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::text_enum;
use crate::error::{AppError, AppResult};

/// SQL expression computing the reported status of loan alias `l`
pub const EFFECTIVE_STATUS_SQL: &str =
    "CASE WHEN l.status = 'active' AND l.due_date < NOW() THEN 'overdue' ELSE l.status END";

/// Loan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Returned,
    Overdue,
    Lost,
}

text_enum!(LoanStatus {
    Active => "active",
    Returned => "returned",
    Overdue => "overdue",
    Lost => "lost",
});

impl LoanStatus {
    /// Status as reported at `now`
    pub fn effective(self, due_date: DateTime<Utc>, now: DateTime<Utc>) -> LoanStatus {
        match self {
            LoanStatus::Active if due_date < now => LoanStatus::Overdue,
            other => other,
        }
    }

    /// Open loans hold their copy
    pub fn is_open(self) -> bool {
        matches!(self, LoanStatus::Active | LoanStatus::Overdue)
    }
}

/// Loan row from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub member_id: i32,
    pub copy_id: i32,
    pub staff_id: Option<i32>,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub renewal_count: i32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    /// Closing (return or loss) is only possible while the loan is open
    pub fn check_closable(&self) -> AppResult<()> {
        match self.status {
            LoanStatus::Active | LoanStatus::Overdue => Ok(()),
            LoanStatus::Returned => Err(AppError::Conflict(format!(
                "Loan {} has already been returned",
                self.id
            ))),
            LoanStatus::Lost => Err(AppError::Conflict(format!(
                "Loan {} was closed as lost",
                self.id
            ))),
        }
    }

    /// Validate a return date against the loan window
    pub fn check_return_date(&self, return_date: DateTime<Utc>) -> AppResult<()> {
        if return_date < self.loan_date {
            return Err(AppError::Validation(
                "Return date cannot precede the loan date".to_string(),
            ));
        }
        Ok(())
    }

    /// Compute the new due date of a renewal, enforcing renewal rules
    pub fn renewed_due_date(
        &self,
        now: DateTime<Utc>,
        renewal_days: i64,
        max_renewals: i32,
    ) -> AppResult<DateTime<Utc>> {
        self.check_closable()?;
        if self.status.effective(self.due_date, now) == LoanStatus::Overdue {
            return Err(AppError::BusinessRule(
                "Overdue loans cannot be renewed".to_string(),
            ));
        }
        if self.renewal_count >= max_renewals {
            return Err(AppError::BusinessRule(format!(
                "Maximum renewals reached ({}/{})",
                self.renewal_count, max_renewals
            )));
        }
        Ok(self.due_date + Duration::days(renewal_days))
    }
}

/// Resolve the loan window of a new loan.
///
/// Missing dates default to `now` and `loan_date + default_days`.
pub fn loan_window(
    now: DateTime<Utc>,
    loan_date: Option<DateTime<Utc>>,
    due_date: Option<DateTime<Utc>>,
    default_days: i64,
) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
    let loan_date = loan_date.unwrap_or(now);
    let due_date = due_date.unwrap_or_else(|| loan_date + Duration::days(default_days));
    if due_date < loan_date {
        return Err(AppError::Validation(
            "Due date cannot precede the loan date".to_string(),
        ));
    }
    Ok((loan_date, due_date))
}

/// Loan with member, copy, book and staff names for display
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanDetails {
    pub id: i32,
    pub member_id: i32,
    pub member_name: String,
    pub copy_id: i32,
    pub barcode: String,
    pub book_id: i32,
    pub book_title: String,
    pub staff_id: Option<i32>,
    pub staff_name: Option<String>,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    /// Reported status; `overdue` when active past its due date
    pub status: LoanStatus,
    pub renewal_count: i32,
    pub notes: Option<String>,
}

/// Validated input of the loan ledger
#[derive(Debug, Clone, PartialEq)]
pub struct NewLoan {
    pub member_id: i32,
    pub copy_id: i32,
    pub staff_id: Option<i32>,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub max_open_per_member: i64,
}

/// Create loan request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateLoan {
    #[validate(range(min = 1))]
    pub member_id: i32,
    #[validate(range(min = 1))]
    pub copy_id: i32,
    /// Defaults to now
    pub loan_date: Option<DateTime<Utc>>,
    /// Defaults to loan date + configured loan period
    pub due_date: Option<DateTime<Utc>>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Return loan request
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReturnLoan {
    /// Defaults to now
    pub return_date: Option<DateTime<Utc>>,
}

/// Report lost request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct ReportLost {
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Loan list filters
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
pub struct LoanQuery {
    pub member_id: Option<i32>,
    pub copy_id: Option<i32>,
    pub book_id: Option<i32>,
    /// Reported status (overdue matches active loans past due)
    pub status: Option<LoanStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0).unwrap()
    }

    fn loan(status: LoanStatus, due_day: u32, renewals: i32) -> Loan {
        Loan {
            id: 1,
            member_id: 1,
            copy_id: 10,
            staff_id: Some(2),
            loan_date: at(1),
            due_date: at(due_day),
            return_date: None,
            status,
            renewal_count: renewals,
            notes: None,
            created_at: at(1),
            updated_at: at(1),
        }
    }

    #[test]
    fn active_past_due_reads_as_overdue() {
        assert_eq!(LoanStatus::Active.effective(at(15), at(16)), LoanStatus::Overdue);
        assert_eq!(LoanStatus::Active.effective(at(15), at(15)), LoanStatus::Active);
        assert_eq!(LoanStatus::Returned.effective(at(15), at(20)), LoanStatus::Returned);
        assert_eq!(LoanStatus::Lost.effective(at(15), at(20)), LoanStatus::Lost);
    }

    #[test]
    fn open_statuses() {
        assert!(LoanStatus::Active.is_open());
        assert!(LoanStatus::Overdue.is_open());
        assert!(!LoanStatus::Returned.is_open());
        assert!(!LoanStatus::Lost.is_open());
    }

    #[test]
    fn window_defaults_to_loan_period() {
        let (start, due) = loan_window(at(1), None, None, 14).unwrap();
        assert_eq!(start, at(1));
        assert_eq!(due, at(15));
    }

    #[test]
    fn window_rejects_due_before_loan() {
        let err = loan_window(at(5), Some(at(5)), Some(at(4)), 14).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(loan_window(at(5), Some(at(5)), Some(at(5)), 14).is_ok());
    }

    #[test]
    fn second_close_is_a_conflict() {
        assert!(loan(LoanStatus::Active, 15, 0).check_closable().is_ok());
        assert!(loan(LoanStatus::Overdue, 15, 0).check_closable().is_ok());
        assert!(matches!(
            loan(LoanStatus::Returned, 15, 0).check_closable(),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            loan(LoanStatus::Lost, 15, 0).check_closable(),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn return_date_must_follow_loan_date() {
        let l = loan(LoanStatus::Active, 15, 0);
        assert!(l.check_return_date(at(6)).is_ok());
        let before = at(1) - Duration::hours(1);
        assert!(matches!(l.check_return_date(before), Err(AppError::Validation(_))));
    }

    #[test]
    fn renewal_extends_from_due_date() {
        let l = loan(LoanStatus::Active, 15, 0);
        assert_eq!(l.renewed_due_date(at(10), 14, 2).unwrap(), at(29));
    }

    #[test]
    fn renewal_limits() {
        let maxed = loan(LoanStatus::Active, 15, 2);
        assert!(matches!(
            maxed.renewed_due_date(at(10), 14, 2),
            Err(AppError::BusinessRule(_))
        ));

        let late = loan(LoanStatus::Active, 15, 0);
        assert!(matches!(
            late.renewed_due_date(at(20), 14, 2),
            Err(AppError::BusinessRule(_))
        ));

        let returned = loan(LoanStatus::Returned, 15, 0);
        assert!(matches!(
            returned.renewed_due_date(at(10), 14, 2),
            Err(AppError::Conflict(_))
        ));
    }
}
