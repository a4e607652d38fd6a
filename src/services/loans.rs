//! Loan management service
//!
//! Applies who-may-do-what and the circulation rules from configuration, then
//! hands the write to the [`LoanLedger`].

use std::sync::Arc;

use chrono::Utc;

use crate::{
    config::LoansConfig,
    error::AppResult,
    models::{
        account::UserClaims,
        loan::{loan_window, CreateLoan, LoanDetails, LoanQuery, NewLoan, ReportLost, ReturnLoan},
        PageQuery,
    },
    repository::loans::LoanLedger,
};

#[derive(Clone)]
pub struct LoansService {
    ledger: Arc<dyn LoanLedger>,
    config: LoansConfig,
}

impl LoansService {
    pub fn new(ledger: Arc<dyn LoanLedger>, config: LoansConfig) -> Self {
        Self { ledger, config }
    }

    /// List loans. Members are restricted to their own loans.
    pub async fn list(
        &self,
        claims: &UserClaims,
        mut query: LoanQuery,
        page: PageQuery,
    ) -> AppResult<(Vec<LoanDetails>, i64)> {
        if let Some(member_id) = claims.member_id() {
            query.member_id = Some(member_id);
        }
        self.ledger.list(query, page).await
    }

    /// Loans of one member
    pub async fn member_loans(
        &self,
        claims: &UserClaims,
        member_id: i32,
        query: LoanQuery,
        page: PageQuery,
    ) -> AppResult<(Vec<LoanDetails>, i64)> {
        claims.require_member_access(member_id)?;
        let query = LoanQuery {
            member_id: Some(member_id),
            ..query
        };
        self.ledger.list(query, page).await
    }

    pub async fn get(&self, claims: &UserClaims, id: i32) -> AppResult<LoanDetails> {
        let loan = self.ledger.details(id).await?;
        claims.require_member_access(loan.member_id)?;
        Ok(loan)
    }

    /// Check out a copy to a member
    pub async fn create(&self, claims: &UserClaims, data: CreateLoan) -> AppResult<LoanDetails> {
        claims.require_staff()?;

        let (loan_date, due_date) = loan_window(
            Utc::now(),
            data.loan_date,
            data.due_date,
            self.config.default_period_days,
        )?;

        let id = self
            .ledger
            .open_loan(NewLoan {
                member_id: data.member_id,
                copy_id: data.copy_id,
                staff_id: claims.staff_id(),
                loan_date,
                due_date,
                notes: data.notes,
                max_open_per_member: self.config.max_active_per_member,
            })
            .await?;

        tracing::info!(
            loan_id = id,
            member_id = data.member_id,
            copy_id = data.copy_id,
            due_date = %due_date,
            "Loan opened"
        );
        self.ledger.details(id).await
    }

    /// Check a copy back in
    pub async fn return_loan(
        &self,
        claims: &UserClaims,
        id: i32,
        data: ReturnLoan,
    ) -> AppResult<LoanDetails> {
        claims.require_staff()?;
        let return_date = data.return_date.unwrap_or_else(Utc::now);
        self.ledger.close_loan(id, return_date).await?;
        tracing::info!(loan_id = id, return_date = %return_date, "Loan returned");
        self.ledger.details(id).await
    }

    pub async fn report_lost(
        &self,
        claims: &UserClaims,
        id: i32,
        data: ReportLost,
    ) -> AppResult<LoanDetails> {
        claims.require_staff()?;
        self.ledger.mark_lost(id, data.notes).await?;
        tracing::info!(loan_id = id, "Loan closed as lost");
        self.ledger.details(id).await
    }

    /// Extend the due date of an open loan. Members may renew their own.
    pub async fn renew(&self, claims: &UserClaims, id: i32) -> AppResult<LoanDetails> {
        let loan = self.ledger.get(id).await?;
        claims.require_member_access(loan.member_id)?;

        let due_date = loan.renewed_due_date(
            Utc::now(),
            self.config.renewal_period_days,
            self.config.max_renewals,
        )?;
        self.ledger
            .extend_due_date(id, loan.renewal_count, due_date)
            .await?;

        tracing::info!(
            loan_id = id,
            renewal = loan.renewal_count + 1,
            due_date = %due_date,
            "Loan renewed"
        );
        self.ledger.details(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::AppError,
        models::{
            account::{Role, UserType},
            loan::{Loan, LoanStatus},
        },
        repository::loans::MockLoanLedger,
    };
    use chrono::{DateTime, Duration};
    use mockall::predicate::eq;

    fn claims(user_type: UserType, role: Role, profile_id: i32) -> UserClaims {
        UserClaims {
            sub: "1".to_string(),
            email: "desk@example.org".to_string(),
            name: "Desk".to_string(),
            role,
            user_type,
            profile_id,
            iss: "stacks".to_string(),
            aud: "stacks-console".to_string(),
            exp: 0,
            iat: 0,
        }
    }

    fn librarian() -> UserClaims {
        claims(UserType::Staff, Role::Librarian, 2)
    }

    fn member(id: i32) -> UserClaims {
        claims(UserType::Member, Role::Member, id)
    }

    fn details(id: i32, member_id: i32) -> LoanDetails {
        let now = Utc::now();
        LoanDetails {
            id,
            member_id,
            member_name: "Ada".to_string(),
            copy_id: 10,
            barcode: "B-0010".to_string(),
            book_id: 4,
            book_title: "Dune".to_string(),
            staff_id: Some(2),
            staff_name: Some("Desk".to_string()),
            loan_date: now,
            due_date: now + Duration::days(14),
            return_date: None,
            status: LoanStatus::Active,
            renewal_count: 0,
            notes: None,
        }
    }

    fn stored(member_id: i32, due_date: DateTime<Utc>, renewal_count: i32) -> Loan {
        let now = Utc::now();
        Loan {
            id: 1,
            member_id,
            copy_id: 10,
            staff_id: Some(2),
            loan_date: now - Duration::days(3),
            due_date,
            return_date: None,
            status: LoanStatus::Active,
            renewal_count,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn service(ledger: MockLoanLedger) -> LoansService {
        LoansService::new(Arc::new(ledger), LoansConfig::default())
    }

    fn create_request() -> CreateLoan {
        CreateLoan {
            member_id: 1,
            copy_id: 10,
            loan_date: None,
            due_date: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn create_applies_default_period_and_issuing_staff() {
        let mut ledger = MockLoanLedger::new();
        ledger
            .expect_open_loan()
            .withf(|l| {
                l.member_id == 1
                    && l.copy_id == 10
                    && l.staff_id == Some(2)
                    && l.due_date - l.loan_date == Duration::days(14)
                    && l.max_open_per_member == 5
            })
            .times(1)
            .returning(|_| Ok(42));
        ledger
            .expect_details()
            .with(eq(42))
            .returning(|id| Ok(details(id, 1)));

        let loan = service(ledger)
            .create(&librarian(), create_request())
            .await
            .unwrap();
        assert_eq!(loan.id, 42);
        assert_eq!(loan.status, LoanStatus::Active);
        assert!(loan.return_date.is_none());
    }

    #[tokio::test]
    async fn members_cannot_check_out() {
        let mut ledger = MockLoanLedger::new();
        ledger.expect_open_loan().never();

        let err = service(ledger)
            .create(&member(1), create_request())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[tokio::test]
    async fn due_before_loan_is_rejected_before_any_write() {
        let mut ledger = MockLoanLedger::new();
        ledger.expect_open_loan().never();

        let now = Utc::now();
        let request = CreateLoan {
            loan_date: Some(now),
            due_date: Some(now - Duration::days(1)),
            ..create_request()
        };
        let err = service(ledger).create(&librarian(), request).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn conflict_from_ledger_is_passed_through() {
        let mut ledger = MockLoanLedger::new();
        ledger
            .expect_open_loan()
            .returning(|_| Err(AppError::Conflict("Copy 10 is not available".to_string())));
        ledger.expect_details().never();

        let err = service(ledger)
            .create(&librarian(), create_request())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn return_defaults_to_now() {
        let before = Utc::now();
        let mut ledger = MockLoanLedger::new();
        ledger
            .expect_close_loan()
            .withf(move |id, at| *id == 7 && *at >= before && *at <= Utc::now())
            .times(1)
            .returning(|_, _| Ok(()));
        ledger.expect_details().returning(|id| {
            let mut d = details(id, 1);
            d.status = LoanStatus::Returned;
            d.return_date = Some(Utc::now());
            Ok(d)
        });

        let loan = service(ledger)
            .return_loan(&librarian(), 7, ReturnLoan::default())
            .await
            .unwrap();
        assert_eq!(loan.status, LoanStatus::Returned);
        assert!(loan.return_date.is_some());
    }

    #[tokio::test]
    async fn renewal_extends_due_date_once() {
        let due = Utc::now() + Duration::days(2);
        let mut ledger = MockLoanLedger::new();
        ledger
            .expect_get()
            .returning(move |_| Ok(stored(3, due, 0)));
        ledger
            .expect_extend_due_date()
            .with(eq(1), eq(0), eq(due + Duration::days(14)))
            .times(1)
            .returning(|_, _, _| Ok(()));
        ledger.expect_details().returning(|id| Ok(details(id, 3)));

        service(ledger).renew(&member(3), 1).await.unwrap();
    }

    #[tokio::test]
    async fn renewal_limit_is_a_business_rule() {
        let due = Utc::now() + Duration::days(2);
        let mut ledger = MockLoanLedger::new();
        ledger.expect_get().returning(move |_| Ok(stored(3, due, 2)));
        ledger.expect_extend_due_date().never();

        let err = service(ledger).renew(&librarian(), 1).await.unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
    }

    #[tokio::test]
    async fn members_cannot_renew_someone_elses_loan() {
        let due = Utc::now() + Duration::days(2);
        let mut ledger = MockLoanLedger::new();
        ledger.expect_get().returning(move |_| Ok(stored(3, due, 0)));
        ledger.expect_extend_due_date().never();

        let err = service(ledger).renew(&member(4), 1).await.unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[tokio::test]
    async fn member_listing_is_scoped_to_self() {
        let mut ledger = MockLoanLedger::new();
        ledger
            .expect_list()
            .withf(|q, _| q.member_id == Some(3))
            .times(1)
            .returning(|_, _| Ok((Vec::new(), 0)));

        let query = LoanQuery {
            member_id: Some(99),
            ..LoanQuery::default()
        };
        service(ledger)
            .list(&member(3), query, PageQuery::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn members_cannot_read_other_loans() {
        let mut ledger = MockLoanLedger::new();
        ledger.expect_details().returning(|id| Ok(details(id, 8)));

        let err = service(ledger).get(&member(3), 1).await.unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }
}
