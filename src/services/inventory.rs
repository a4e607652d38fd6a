//! Copy inventory service

use crate::{
    error::AppResult,
    models::{
        account::UserClaims,
        copy::{BookCopy, CreateCopy, UpdateCopy},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct InventoryService {
    repository: Repository,
}

impl InventoryService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list_copies(&self, book_id: i32) -> AppResult<Vec<BookCopy>> {
        self.repository.copies.list_for_book(book_id).await
    }

    pub async fn get_copy(&self, id: i32) -> AppResult<BookCopy> {
        self.repository.copies.get_by_id(id).await
    }

    pub async fn create_copy(
        &self,
        claims: &UserClaims,
        book_id: i32,
        data: &CreateCopy,
    ) -> AppResult<BookCopy> {
        claims.require_staff()?;
        let copy = self.repository.copies.create(book_id, data).await?;
        tracing::info!(copy_id = copy.id, book_id, barcode = %copy.barcode, "Copy added");
        Ok(copy)
    }

    pub async fn update_copy(
        &self,
        claims: &UserClaims,
        id: i32,
        data: &UpdateCopy,
    ) -> AppResult<BookCopy> {
        claims.require_staff()?;
        let copy = self.repository.copies.update(id, data).await?;
        if data.status.is_some() {
            tracing::info!(copy_id = id, status = %copy.status, "Copy status changed");
        }
        Ok(copy)
    }

    pub async fn delete_copy(&self, claims: &UserClaims, id: i32) -> AppResult<()> {
        claims.require_staff()?;
        self.repository.copies.delete(id).await?;
        tracing::info!(copy_id = id, "Copy deleted");
        Ok(())
    }
}
