//! Authors repository

use sqlx::{Pool, Postgres, QueryBuilder};

use super::{violation, Violation};
use crate::{
    error::{AppError, AppResult},
    models::{
        author::{Author, AuthorQuery, CreateAuthor, UpdateAuthor},
        like_pattern, PageQuery,
    },
};

#[derive(Clone)]
pub struct AuthorsRepository {
    pool: Pool<Postgres>,
}

impl AuthorsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, query: &AuthorQuery) {
        qb.push(" WHERE TRUE");
        if let Some(ref search) = query.search {
            qb.push(" AND name ILIKE ").push_bind(like_pattern(search));
        }
    }

    /// List authors with search and pagination
    pub async fn list(&self, query: &AuthorQuery, page: &PageQuery) -> AppResult<(Vec<Author>, i64)> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM authors");
        Self::push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::new("SELECT * FROM authors");
        Self::push_filters(&mut select, query);
        select
            .push(" ORDER BY name LIMIT ")
            .push_bind(page.per_page())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = select.build_query_as::<Author>().fetch_all(&self.pool).await?;

        Ok((rows, total))
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Author> {
        sqlx::query_as::<_, Author>("SELECT * FROM authors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Author {} not found", id)))
    }

    pub async fn create(&self, data: &CreateAuthor) -> AppResult<Author> {
        let row = sqlx::query_as::<_, Author>(
            r#"
            INSERT INTO authors (name, biography, birth_date, nationality)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&data.name)
        .bind(&data.biography)
        .bind(data.birth_date)
        .bind(&data.nationality)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn update(&self, id: i32, data: &UpdateAuthor) -> AppResult<Author> {
        sqlx::query_as::<_, Author>(
            r#"
            UPDATE authors SET
                name = COALESCE($2, name),
                biography = COALESCE($3, biography),
                birth_date = COALESCE($4, birth_date),
                nationality = COALESCE($5, nationality)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.biography)
        .bind(data.birth_date)
        .bind(&data.nationality)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Author {} not found", id)))
    }

    /// Delete an author no book refers to
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM authors WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match violation(&e) {
                Some(Violation::ForeignKey) => {
                    AppError::Conflict(format!("Author {} is linked to books", id))
                }
                _ => e.into(),
            })?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Author {} not found", id)));
        }
        Ok(())
    }
}
