//! Staff repository

use sqlx::{Pool, Postgres, QueryBuilder};

use super::accounts::AccountsRepository;
use crate::{
    error::{AppError, AppResult},
    models::{
        account::UserType,
        like_pattern,
        staff::{CreateStaff, Staff, StaffQuery, UpdateStaff},
        PageQuery,
    },
};

const STAFF_SELECT: &str = r#"
    SELECT s.*, a.email, a.role
    FROM staff s
    JOIN accounts a ON a.id = s.account_id
"#;

#[derive(Clone)]
pub struct StaffRepository {
    pool: Pool<Postgres>,
}

impl StaffRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, query: &StaffQuery) {
        qb.push(" WHERE TRUE");
        if let Some(ref search) = query.search {
            let pattern = like_pattern(search);
            qb.push(" AND (s.full_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR a.email ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(is_active) = query.is_active {
            qb.push(" AND s.is_active = ").push_bind(is_active);
        }
    }

    pub async fn list(&self, query: &StaffQuery, page: &PageQuery) -> AppResult<(Vec<Staff>, i64)> {
        let mut count = QueryBuilder::new(
            "SELECT COUNT(*) FROM staff s JOIN accounts a ON a.id = s.account_id",
        );
        Self::push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::new(STAFF_SELECT);
        Self::push_filters(&mut select, query);
        select
            .push(" ORDER BY s.full_name, s.id LIMIT ")
            .push_bind(page.per_page())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let staff = select.build_query_as::<Staff>().fetch_all(&self.pool).await?;

        Ok((staff, total))
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Staff> {
        let sql = format!("{} WHERE s.id = $1", STAFF_SELECT);
        sqlx::query_as::<_, Staff>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Staff {} not found", id)))
    }

    pub async fn create(&self, data: &CreateStaff, password_hash: &str) -> AppResult<i32> {
        let mut tx = self.pool.begin().await?;

        let account_id = AccountsRepository::insert(
            &mut tx,
            &data.email,
            password_hash,
            UserType::Staff,
            data.role,
        )
        .await?;

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO staff (account_id, full_name, phone, position, hire_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(account_id)
        .bind(&data.full_name)
        .bind(&data.phone)
        .bind(&data.position)
        .bind(data.hire_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(id)
    }

    pub async fn update(&self, id: i32, data: &UpdateStaff) -> AppResult<()> {
        if let Some(role) = data.role {
            if !role.is_valid_for(UserType::Staff) {
                return Err(AppError::Validation(format!("Role {} is not a staff role", role)));
            }
        }

        let mut tx = self.pool.begin().await?;

        let account_id: i32 = sqlx::query_scalar(
            r#"
            UPDATE staff SET
                full_name = COALESCE($2, full_name),
                phone = COALESCE($3, phone),
                position = COALESCE($4, position),
                hire_date = COALESCE($5, hire_date),
                is_active = COALESCE($6, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING account_id
            "#,
        )
        .bind(id)
        .bind(&data.full_name)
        .bind(&data.phone)
        .bind(&data.position)
        .bind(data.hire_date)
        .bind(data.is_active)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Staff {} not found", id)))?;

        AccountsRepository::update_identity(&mut tx, account_id, data.email.as_deref(), data.role)
            .await?;
        if let Some(active) = data.is_active {
            AccountsRepository::set_active(&mut tx, account_id, active).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Soft delete
    pub async fn deactivate(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let account_id: i32 = sqlx::query_scalar(
            "UPDATE staff SET is_active = FALSE, updated_at = NOW() WHERE id = $1 RETURNING account_id",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Staff {} not found", id)))?;

        AccountsRepository::set_active(&mut tx, account_id, false).await?;

        tx.commit().await?;
        Ok(())
    }
}
