//! Loan ledger: the only code that writes loans or moves a copy in and out
//! of `borrowed`.
//!
//! Writes run in one transaction under READ COMMITTED. Opening a loan locks
//! the copy row, closing one locks the loan row then the copy row, so two
//! requests racing on the same copy serialize on that lock. The partial unique
//! index `ux_loans_open_copy` backs this up: a residual race surfaces as a
//! unique violation, reported as a conflict.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use super::{violation, Violation};
use crate::{
    error::{AppError, AppResult},
    models::{
        copy::CopyStatus,
        loan::{Loan, LoanDetails, LoanQuery, NewLoan, EFFECTIVE_STATUS_SQL},
        member::MemberStatus,
        PageQuery,
    },
};

/// Loan storage operations used by the loans service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoanLedger: Send + Sync {
    /// Stored loan row
    async fn get(&self, id: i32) -> AppResult<Loan>;

    /// Loan with display names and reported status
    async fn details(&self, id: i32) -> AppResult<LoanDetails>;

    async fn list(&self, query: LoanQuery, page: PageQuery) -> AppResult<(Vec<LoanDetails>, i64)>;

    /// Open a loan and mark its copy borrowed. Returns the loan id.
    async fn open_loan(&self, loan: NewLoan) -> AppResult<i32>;

    /// Return an open loan and put its copy back on the shelf
    async fn close_loan(&self, id: i32, return_date: DateTime<Utc>) -> AppResult<()>;

    /// Close an open loan as lost, together with its copy
    async fn mark_lost(&self, id: i32, notes: Option<String>) -> AppResult<()>;

    /// Move the due date of an active loan, provided no other renewal landed
    /// since `renewal_count` was read
    async fn extend_due_date(
        &self,
        id: i32,
        renewal_count: i32,
        due_date: DateTime<Utc>,
    ) -> AppResult<()>;
}

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn details_select() -> String {
        format!(
            r#"
            SELECT l.id, l.member_id, m.full_name AS member_name,
                   l.copy_id, c.barcode, b.id AS book_id, b.title AS book_title,
                   l.staff_id, s.full_name AS staff_name,
                   l.loan_date, l.due_date, l.return_date,
                   {EFFECTIVE_STATUS_SQL} AS status,
                   l.renewal_count, l.notes
            FROM loans l
            JOIN members m ON m.id = l.member_id
            JOIN book_copies c ON c.id = l.copy_id
            JOIN books b ON b.id = c.book_id
            LEFT JOIN staff s ON s.id = l.staff_id
            "#
        )
    }

    fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, query: &LoanQuery) {
        qb.push(" WHERE TRUE");
        if let Some(member_id) = query.member_id {
            qb.push(" AND l.member_id = ").push_bind(member_id);
        }
        if let Some(copy_id) = query.copy_id {
            qb.push(" AND l.copy_id = ").push_bind(copy_id);
        }
        if let Some(book_id) = query.book_id {
            qb.push(" AND c.book_id = ").push_bind(book_id);
        }
        if let Some(status) = query.status {
            qb.push(format!(" AND ({}) = ", EFFECTIVE_STATUS_SQL))
                .push_bind(status.as_str());
        }
    }

    /// Most recent loans, for the dashboard snapshot
    pub async fn recent(
        tx: &mut Transaction<'_, Postgres>,
        limit: i64,
    ) -> AppResult<Vec<LoanDetails>> {
        let sql = format!("{} ORDER BY l.loan_date DESC, l.id DESC LIMIT $1", Self::details_select());
        let loans = sqlx::query_as::<_, LoanDetails>(&sql)
            .bind(limit)
            .fetch_all(&mut **tx)
            .await?;
        Ok(loans)
    }

    async fn lock_loan(tx: &mut Transaction<'_, Postgres>, id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan {} not found", id)))
    }

    async fn set_copy_status(
        tx: &mut Transaction<'_, Postgres>,
        copy_id: i32,
        status: CopyStatus,
    ) -> AppResult<()> {
        sqlx::query("UPDATE book_copies SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(copy_id)
            .bind(status)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl LoanLedger for LoansRepository {
    async fn get(&self, id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan {} not found", id)))
    }

    async fn details(&self, id: i32) -> AppResult<LoanDetails> {
        let sql = format!("{} WHERE l.id = $1", Self::details_select());
        sqlx::query_as::<_, LoanDetails>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan {} not found", id)))
    }

    async fn list(&self, query: LoanQuery, page: PageQuery) -> AppResult<(Vec<LoanDetails>, i64)> {
        let mut count = QueryBuilder::new(
            "SELECT COUNT(*) FROM loans l JOIN book_copies c ON c.id = l.copy_id",
        );
        Self::push_filters(&mut count, &query);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::new(Self::details_select());
        Self::push_filters(&mut select, &query);
        select
            .push(" ORDER BY l.loan_date DESC, l.id DESC LIMIT ")
            .push_bind(page.per_page())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let loans = select.build_query_as::<LoanDetails>().fetch_all(&self.pool).await?;

        Ok((loans, total))
    }

    async fn open_loan(&self, loan: NewLoan) -> AppResult<i32> {
        let mut tx = self.pool.begin().await?;

        let copy_status: CopyStatus =
            sqlx::query_scalar("SELECT status FROM book_copies WHERE id = $1 FOR UPDATE")
                .bind(loan.copy_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Copy {} not found", loan.copy_id)))?;
        if copy_status != CopyStatus::Available {
            return Err(AppError::Conflict(format!(
                "Copy {} is not available (status: {})",
                loan.copy_id, copy_status
            )));
        }

        // Member row lock serializes concurrent checkouts by the same member
        // so the open-loan quota cannot be overrun.
        let member_status: MemberStatus =
            sqlx::query_scalar("SELECT status FROM members WHERE id = $1 FOR UPDATE")
                .bind(loan.member_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Member {} not found", loan.member_id))
                })?;
        member_status.check_can_borrow()?;

        let open: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE member_id = $1 AND status IN ('active', 'overdue')",
        )
        .bind(loan.member_id)
        .fetch_one(&mut *tx)
        .await?;
        if open >= loan.max_open_per_member {
            return Err(AppError::Conflict(format!(
                "Member already holds the maximum number of loans ({}/{})",
                open, loan.max_open_per_member
            )));
        }

        if let Some(staff_id) = loan.staff_id {
            let staff_ok: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM staff WHERE id = $1 AND is_active)",
            )
            .bind(staff_id)
            .fetch_one(&mut *tx)
            .await?;
            if !staff_ok {
                return Err(AppError::NotFound(format!("Staff {} not found", staff_id)));
            }
        }

        let loan_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO loans (member_id, copy_id, staff_id, loan_date, due_date, status, notes)
            VALUES ($1, $2, $3, $4, $5, 'active', $6)
            RETURNING id
            "#,
        )
        .bind(loan.member_id)
        .bind(loan.copy_id)
        .bind(loan.staff_id)
        .bind(loan.loan_date)
        .bind(loan.due_date)
        .bind(&loan.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match violation(&e) {
            Some(Violation::Unique) => AppError::Conflict(format!(
                "Copy {} already has an open loan",
                loan.copy_id
            )),
            Some(Violation::Check) => {
                AppError::Validation("Due date cannot precede the loan date".to_string())
            }
            _ => e.into(),
        })?;

        Self::set_copy_status(&mut tx, loan.copy_id, CopyStatus::Borrowed).await?;

        tx.commit().await?;
        Ok(loan_id)
    }

    async fn close_loan(&self, id: i32, return_date: DateTime<Utc>) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let loan = Self::lock_loan(&mut tx, id).await?;
        loan.check_closable()?;
        loan.check_return_date(return_date)?;

        sqlx::query(
            r#"
            UPDATE loans SET status = 'returned', return_date = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(return_date)
        .execute(&mut *tx)
        .await?;

        Self::set_copy_status(&mut tx, loan.copy_id, CopyStatus::Available).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn mark_lost(&self, id: i32, notes: Option<String>) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let loan = Self::lock_loan(&mut tx, id).await?;
        loan.check_closable()?;

        sqlx::query(
            r#"
            UPDATE loans SET status = 'lost', notes = COALESCE($2, notes), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(notes)
        .execute(&mut *tx)
        .await?;

        Self::set_copy_status(&mut tx, loan.copy_id, CopyStatus::Lost).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn extend_due_date(
        &self,
        id: i32,
        renewal_count: i32,
        due_date: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE loans
            SET due_date = $3, renewal_count = renewal_count + 1, updated_at = NOW()
            WHERE id = $1 AND renewal_count = $2 AND status = 'active'
            "#,
        )
        .bind(id)
        .bind(renewal_count)
        .bind(due_date)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Loan {} changed while renewing; reload and retry",
                id
            )));
        }
        Ok(())
    }
}
