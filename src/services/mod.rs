//! Business logic services

pub mod auth;
pub mod catalog;
pub mod chat;
pub mod dashboard;
pub mod inventory;
pub mod loans;
pub mod members;
pub mod messaging;
pub mod staff;

use std::sync::Arc;

use crate::{config::AppConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    repository: Repository,
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub inventory: inventory::InventoryService,
    pub loans: loans::LoansService,
    pub members: members::MembersService,
    pub staff: staff::StaffService,
    pub messaging: messaging::MessagingService,
    pub dashboard: dashboard::DashboardService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        let hub = chat::ChatHub::new(config.chat.channel_capacity);
        Self {
            auth: auth::AuthService::new(repository.clone(), config.auth.clone()),
            catalog: catalog::CatalogService::new(repository.clone()),
            inventory: inventory::InventoryService::new(repository.clone()),
            loans: loans::LoansService::new(
                Arc::new(repository.loans.clone()),
                config.loans.clone(),
            ),
            members: members::MembersService::new(repository.clone()),
            staff: staff::StaffService::new(repository.clone()),
            messaging: messaging::MessagingService::new(repository.clone(), hub),
            dashboard: dashboard::DashboardService::new(repository.clone(), config.dashboard.clone()),
            repository,
        }
    }

    /// Database readiness
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.ping().await
    }
}
