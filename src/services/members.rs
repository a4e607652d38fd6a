//! Member directory service

use crate::{
    error::{AppError, AppResult},
    models::{
        account::UserClaims,
        member::{CreateMember, Member, MemberQuery, UpdateMember},
        PageQuery,
    },
    repository::Repository,
};

use super::auth::hash_password;

#[derive(Clone)]
pub struct MembersService {
    repository: Repository,
}

impl MembersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn search(
        &self,
        claims: &UserClaims,
        query: &MemberQuery,
        page: &PageQuery,
    ) -> AppResult<(Vec<Member>, i64)> {
        claims.require_staff()?;
        self.repository.members.list(query, page).await
    }

    pub async fn get(&self, claims: &UserClaims, id: i32) -> AppResult<Member> {
        claims.require_member_access(id)?;
        self.repository.members.get_by_id(id).await
    }

    pub async fn create(&self, claims: &UserClaims, data: &CreateMember) -> AppResult<Member> {
        claims.require_staff()?;
        let hash = hash_password(&data.password)?;
        let id = self.repository.members.create(data, &hash).await?;
        tracing::info!(member_id = id, staff_id = ?claims.staff_id(), "Member created");
        self.repository.members.get_by_id(id).await
    }

    /// Members may edit their own contact details; status is staff-only
    pub async fn update(&self, claims: &UserClaims, id: i32, data: &UpdateMember) -> AppResult<Member> {
        claims.require_member_access(id)?;
        if data.status.is_some() && !claims.is_staff() {
            return Err(AppError::Authorization(
                "Only staff can change membership status".to_string(),
            ));
        }
        self.repository.members.update(id, data).await?;
        if let Some(status) = data.status {
            tracing::info!(member_id = id, status = %status, "Membership status changed");
        }
        self.repository.members.get_by_id(id).await
    }

    pub async fn deactivate(&self, claims: &UserClaims, id: i32) -> AppResult<()> {
        claims.require_staff()?;
        self.repository.members.deactivate(id).await?;
        tracing::info!(member_id = id, "Member deactivated");
        Ok(())
    }
}
