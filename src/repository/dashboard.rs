//! Dashboard rollups, read from a single snapshot

use sqlx::{Pool, Postgres};

use super::loans::LoansRepository;
use crate::{
    error::AppResult,
    models::{
        copy::CopyStatus,
        dashboard::{BorrowedBook, CategoryCount, CopyCounts, DashboardStats, LoanCounts},
        loan::EFFECTIVE_STATUS_SQL,
    },
};

#[derive(Clone)]
pub struct DashboardRepository {
    pool: Pool<Postgres>,
}

impl DashboardRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// All counters come from one REPEATABLE READ transaction, so they agree
    /// with each other even while loans are being written.
    pub async fn stats(&self, top_n: i64) -> AppResult<DashboardStats> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let loans_sql = format!(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE s = 'active'),
                   COUNT(*) FILTER (WHERE s = 'overdue'),
                   COUNT(*) FILTER (WHERE s = 'returned'),
                   COUNT(*) FILTER (WHERE s = 'lost')
            FROM (SELECT {EFFECTIVE_STATUS_SQL} AS s FROM loans l) t
            "#
        );
        let (total, active, overdue, returned, lost): (i64, i64, i64, i64, i64) =
            sqlx::query_as(&loans_sql).fetch_one(&mut *tx).await?;

        let grouped: Vec<(CopyStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM book_copies GROUP BY status")
                .fetch_all(&mut *tx)
                .await?;

        let (total_books, total_members, total_staff): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT (SELECT COUNT(*) FROM books),
                   (SELECT COUNT(*) FROM members),
                   (SELECT COUNT(*) FROM staff)
            "#,
        )
        .fetch_one(&mut *tx)
        .await?;

        let top_categories = sqlx::query_as::<_, CategoryCount>(
            r#"
            SELECT c.id AS category_id, c.name, COUNT(bc.book_id) AS book_count
            FROM categories c
            LEFT JOIN book_categories bc ON bc.category_id = c.id
            GROUP BY c.id, c.name
            ORDER BY book_count DESC, c.name
            LIMIT $1
            "#,
        )
        .bind(top_n)
        .fetch_all(&mut *tx)
        .await?;

        let most_borrowed_books = sqlx::query_as::<_, BorrowedBook>(
            r#"
            SELECT b.id AS book_id, b.title, COUNT(l.id) AS loan_count
            FROM loans l
            JOIN book_copies c ON c.id = l.copy_id
            JOIN books b ON b.id = c.book_id
            GROUP BY b.id, b.title
            ORDER BY loan_count DESC, b.title
            LIMIT $1
            "#,
        )
        .bind(top_n)
        .fetch_all(&mut *tx)
        .await?;

        let recent_loans = LoansRepository::recent(&mut tx, top_n).await?;

        tx.commit().await?;

        Ok(DashboardStats {
            loans: LoanCounts {
                total,
                active,
                overdue,
                returned,
                lost,
            },
            copies: CopyCounts::from_grouped(grouped),
            total_books,
            total_members,
            total_staff,
            top_categories,
            most_borrowed_books,
            recent_loans,
        })
    }
}
