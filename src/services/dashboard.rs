//! Dashboard statistics service

use crate::{
    config::DashboardConfig,
    error::AppResult,
    models::{
        account::UserClaims,
        dashboard::{DashboardQuery, DashboardStats},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct DashboardService {
    repository: Repository,
    config: DashboardConfig,
}

impl DashboardService {
    pub fn new(repository: Repository, config: DashboardConfig) -> Self {
        Self { repository, config }
    }

    pub async fn stats(&self, claims: &UserClaims, query: &DashboardQuery) -> AppResult<DashboardStats> {
        claims.require_staff()?;
        self.repository
            .dashboard
            .stats(query.limit(self.config.top_n))
            .await
    }
}
