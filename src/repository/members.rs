//! Members repository

use sqlx::{Pool, Postgres, QueryBuilder};

use super::accounts::AccountsRepository;
use crate::{
    error::{AppError, AppResult},
    models::{
        account::{Role, UserType},
        like_pattern,
        member::{CreateMember, Member, MemberQuery, MemberStatus, UpdateMember},
        PageQuery,
    },
};

const MEMBER_SELECT: &str = r#"
    SELECT m.*, a.email,
           (SELECT COUNT(*) FROM loans l
             WHERE l.member_id = m.id AND l.status IN ('active', 'overdue')) AS open_loans
    FROM members m
    JOIN accounts a ON a.id = m.account_id
"#;

#[derive(Clone)]
pub struct MembersRepository {
    pool: Pool<Postgres>,
}

impl MembersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, query: &MemberQuery) {
        qb.push(" WHERE TRUE");
        if let Some(ref search) = query.search {
            let pattern = like_pattern(search);
            qb.push(" AND (m.full_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR a.email ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(status) = query.status {
            qb.push(" AND m.status = ").push_bind(status);
        }
    }

    /// List members with filters and pagination
    pub async fn list(&self, query: &MemberQuery, page: &PageQuery) -> AppResult<(Vec<Member>, i64)> {
        let mut count = QueryBuilder::new(
            "SELECT COUNT(*) FROM members m JOIN accounts a ON a.id = m.account_id",
        );
        Self::push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::new(MEMBER_SELECT);
        Self::push_filters(&mut select, query);
        select
            .push(" ORDER BY m.full_name, m.id LIMIT ")
            .push_bind(page.per_page())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let members = select.build_query_as::<Member>().fetch_all(&self.pool).await?;

        Ok((members, total))
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Member> {
        let sql = format!("{} WHERE m.id = $1", MEMBER_SELECT);
        sqlx::query_as::<_, Member>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member {} not found", id)))
    }

    /// Create the account and the member row together
    pub async fn create(&self, data: &CreateMember, password_hash: &str) -> AppResult<i32> {
        let mut tx = self.pool.begin().await?;

        let account_id = AccountsRepository::insert(
            &mut tx,
            &data.email,
            password_hash,
            UserType::Member,
            Role::Member,
        )
        .await?;

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO members (account_id, full_name, phone, address, date_of_birth)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(account_id)
        .bind(&data.full_name)
        .bind(&data.phone)
        .bind(&data.address)
        .bind(data.date_of_birth)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(id)
    }

    pub async fn update(&self, id: i32, data: &UpdateMember) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let account_id: i32 = sqlx::query_scalar(
            r#"
            UPDATE members SET
                full_name = COALESCE($2, full_name),
                phone = COALESCE($3, phone),
                address = COALESCE($4, address),
                date_of_birth = COALESCE($5, date_of_birth),
                status = COALESCE($6, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING account_id
            "#,
        )
        .bind(id)
        .bind(&data.full_name)
        .bind(&data.phone)
        .bind(&data.address)
        .bind(data.date_of_birth)
        .bind(data.status)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member {} not found", id)))?;

        AccountsRepository::update_identity(&mut tx, account_id, data.email.as_deref(), None).await?;
        if let Some(status) = data.status {
            AccountsRepository::set_active(&mut tx, account_id, status.can_log_in()).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Soft delete: the member becomes inactive and loses login
    pub async fn deactivate(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let account_id: i32 = sqlx::query_scalar(
            "UPDATE members SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING account_id",
        )
        .bind(id)
        .bind(MemberStatus::Inactive)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member {} not found", id)))?;

        AccountsRepository::set_active(&mut tx, account_id, false).await?;

        tx.commit().await?;
        Ok(())
    }
}
