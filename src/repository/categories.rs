//! Categories repository

use sqlx::{Pool, Postgres, QueryBuilder};

use super::{violation, Violation};
use crate::{
    error::{AppError, AppResult},
    models::{
        category::{Category, CategoryQuery, CreateCategory, UpdateCategory},
        like_pattern, PageQuery,
    },
};

#[derive(Clone)]
pub struct CategoriesRepository {
    pool: Pool<Postgres>,
}

fn duplicate_name(e: sqlx::Error) -> AppError {
    match violation(&e) {
        Some(Violation::Unique) => AppError::Conflict("Category name already exists".to_string()),
        _ => e.into(),
    }
}

impl CategoriesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, query: &CategoryQuery) {
        qb.push(" WHERE TRUE");
        if let Some(ref search) = query.search {
            qb.push(" AND name ILIKE ").push_bind(like_pattern(search));
        }
    }

    pub async fn list(&self, query: &CategoryQuery, page: &PageQuery) -> AppResult<(Vec<Category>, i64)> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM categories");
        Self::push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::new("SELECT * FROM categories");
        Self::push_filters(&mut select, query);
        select
            .push(" ORDER BY name LIMIT ")
            .push_bind(page.per_page())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = select.build_query_as::<Category>().fetch_all(&self.pool).await?;

        Ok((rows, total))
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Category> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category {} not found", id)))
    }

    pub async fn create(&self, data: &CreateCategory) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, description) VALUES ($1, $2) RETURNING *",
        )
        .bind(&data.name)
        .bind(&data.description)
        .fetch_one(&self.pool)
        .await
        .map_err(duplicate_name)
    }

    pub async fn update(&self, id: i32, data: &UpdateCategory) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories SET
                name = COALESCE($2, name),
                description = COALESCE($3, description)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(duplicate_name)?
        .ok_or_else(|| AppError::NotFound(format!("Category {} not found", id)))
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match violation(&e) {
                Some(Violation::ForeignKey) => {
                    AppError::Conflict(format!("Category {} is linked to books", id))
                }
                _ => e.into(),
            })?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Category {} not found", id)));
        }
        Ok(())
    }
}
