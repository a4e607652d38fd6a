//! Book copies repository

use sqlx::{Pool, Postgres};

use super::{violation, Violation};
use crate::{
    error::{AppError, AppResult},
    models::copy::{BookCopy, CopyStatus, CreateCopy, UpdateCopy},
};

fn write_error(e: sqlx::Error) -> AppError {
    match violation(&e) {
        Some(Violation::Unique) => {
            AppError::Conflict("A copy with this barcode already exists".to_string())
        }
        Some(Violation::ForeignKey) => AppError::NotFound("Book not found".to_string()),
        _ => e.into(),
    }
}

#[derive(Clone)]
pub struct CopiesRepository {
    pool: Pool<Postgres>,
}

impl CopiesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Copies of a book, by barcode
    pub async fn list_for_book(&self, book_id: i32) -> AppResult<Vec<BookCopy>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
            .bind(book_id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(AppError::NotFound(format!("Book {} not found", book_id)));
        }

        let copies = sqlx::query_as::<_, BookCopy>(
            "SELECT * FROM book_copies WHERE book_id = $1 ORDER BY barcode",
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(copies)
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<BookCopy> {
        sqlx::query_as::<_, BookCopy>("SELECT * FROM book_copies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Copy {} not found", id)))
    }

    pub async fn create(&self, book_id: i32, data: &CreateCopy) -> AppResult<BookCopy> {
        let status = data.status.unwrap_or(CopyStatus::Available);
        CopyStatus::Available.check_manual_transition(status)?;

        let copy = sqlx::query_as::<_, BookCopy>(
            r#"
            INSERT INTO book_copies (book_id, barcode, status, location, acquisition_date, price)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(&data.barcode)
        .bind(status)
        .bind(&data.location)
        .bind(data.acquisition_date)
        .bind(data.price)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error)?;
        Ok(copy)
    }

    /// Update a copy. The row is locked so a concurrent checkout cannot slip
    /// between the status check and the write.
    pub async fn update(&self, id: i32, data: &UpdateCopy) -> AppResult<BookCopy> {
        let mut tx = self.pool.begin().await?;

        let current: CopyStatus =
            sqlx::query_scalar("SELECT status FROM book_copies WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Copy {} not found", id)))?;

        if let Some(to) = data.status {
            current.check_manual_transition(to)?;
        }

        let copy = sqlx::query_as::<_, BookCopy>(
            r#"
            UPDATE book_copies SET
                barcode = COALESCE($2, barcode),
                status = COALESCE($3, status),
                location = COALESCE($4, location),
                acquisition_date = COALESCE($5, acquisition_date),
                price = COALESCE($6, price),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.barcode)
        .bind(data.status)
        .bind(&data.location)
        .bind(data.acquisition_date)
        .bind(data.price)
        .fetch_one(&mut *tx)
        .await
        .map_err(write_error)?;

        tx.commit().await?;
        Ok(copy)
    }

    /// Delete a copy that never circulated
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM book_copies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match violation(&e) {
                Some(Violation::ForeignKey) => AppError::Conflict(format!(
                    "Copy {} has loan history; retire it instead",
                    id
                )),
                _ => e.into(),
            })?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Copy {} not found", id)));
        }
        Ok(())
    }
}
