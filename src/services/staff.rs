//! Staff directory service (administrators manage staff)

use crate::{
    error::{AppError, AppResult},
    models::{
        account::{UserClaims, UserType},
        staff::{CreateStaff, Staff, StaffQuery, UpdateStaff},
        PageQuery,
    },
    repository::Repository,
};

use super::auth::hash_password;

#[derive(Clone)]
pub struct StaffService {
    repository: Repository,
}

impl StaffService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn search(
        &self,
        claims: &UserClaims,
        query: &StaffQuery,
        page: &PageQuery,
    ) -> AppResult<(Vec<Staff>, i64)> {
        claims.require_staff()?;
        self.repository.staff.list(query, page).await
    }

    pub async fn get(&self, claims: &UserClaims, id: i32) -> AppResult<Staff> {
        claims.require_staff()?;
        self.repository.staff.get_by_id(id).await
    }

    pub async fn create(&self, claims: &UserClaims, data: &CreateStaff) -> AppResult<Staff> {
        claims.require_admin()?;
        if !data.role.is_valid_for(UserType::Staff) {
            return Err(AppError::Validation(format!("Role {} is not a staff role", data.role)));
        }
        let hash = hash_password(&data.password)?;
        let id = self.repository.staff.create(data, &hash).await?;
        tracing::info!(staff_id = id, role = %data.role, "Staff created");
        self.repository.staff.get_by_id(id).await
    }

    pub async fn update(&self, claims: &UserClaims, id: i32, data: &UpdateStaff) -> AppResult<Staff> {
        claims.require_admin()?;
        if claims.staff_id() == Some(id) && data.is_active == Some(false) {
            return Err(AppError::BusinessRule("You cannot deactivate yourself".to_string()));
        }
        self.repository.staff.update(id, data).await?;
        self.repository.staff.get_by_id(id).await
    }

    pub async fn deactivate(&self, claims: &UserClaims, id: i32) -> AppResult<()> {
        claims.require_admin()?;
        if claims.staff_id() == Some(id) {
            return Err(AppError::BusinessRule("You cannot deactivate yourself".to_string()));
        }
        self.repository.staff.deactivate(id).await?;
        tracing::info!(staff_id = id, "Staff deactivated");
        Ok(())
    }
}
