//! Publishers repository

use sqlx::{Pool, Postgres, QueryBuilder};

use super::{violation, Violation};
use crate::{
    error::{AppError, AppResult},
    models::{
        like_pattern,
        publisher::{CreatePublisher, Publisher, PublisherQuery, UpdatePublisher},
        PageQuery,
    },
};

#[derive(Clone)]
pub struct PublishersRepository {
    pool: Pool<Postgres>,
}

fn duplicate_name(e: sqlx::Error) -> AppError {
    match violation(&e) {
        Some(Violation::Unique) => AppError::Conflict("Publisher name already exists".to_string()),
        _ => e.into(),
    }
}

impl PublishersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, query: &PublisherQuery) {
        qb.push(" WHERE TRUE");
        if let Some(ref search) = query.search {
            qb.push(" AND name ILIKE ").push_bind(like_pattern(search));
        }
    }

    pub async fn list(&self, query: &PublisherQuery, page: &PageQuery) -> AppResult<(Vec<Publisher>, i64)> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM publishers");
        Self::push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::new("SELECT * FROM publishers");
        Self::push_filters(&mut select, query);
        select
            .push(" ORDER BY name LIMIT ")
            .push_bind(page.per_page())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = select.build_query_as::<Publisher>().fetch_all(&self.pool).await?;

        Ok((rows, total))
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Publisher> {
        sqlx::query_as::<_, Publisher>("SELECT * FROM publishers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Publisher {} not found", id)))
    }

    pub async fn create(&self, data: &CreatePublisher) -> AppResult<Publisher> {
        sqlx::query_as::<_, Publisher>(
            r#"
            INSERT INTO publishers (name, address, phone, email, website)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&data.name)
        .bind(&data.address)
        .bind(&data.phone)
        .bind(&data.email)
        .bind(&data.website)
        .fetch_one(&self.pool)
        .await
        .map_err(duplicate_name)
    }

    pub async fn update(&self, id: i32, data: &UpdatePublisher) -> AppResult<Publisher> {
        sqlx::query_as::<_, Publisher>(
            r#"
            UPDATE publishers SET
                name = COALESCE($2, name),
                address = COALESCE($3, address),
                phone = COALESCE($4, phone),
                email = COALESCE($5, email),
                website = COALESCE($6, website)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.address)
        .bind(&data.phone)
        .bind(&data.email)
        .bind(&data.website)
        .fetch_optional(&self.pool)
        .await
        .map_err(duplicate_name)?
        .ok_or_else(|| AppError::NotFound(format!("Publisher {} not found", id)))
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM publishers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match violation(&e) {
                Some(Violation::ForeignKey) => {
                    AppError::Conflict(format!("Publisher {} still has books", id))
                }
                _ => e.into(),
            })?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Publisher {} not found", id)));
        }
        Ok(())
    }
}
