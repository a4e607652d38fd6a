//! Catalog service: books and their authors, categories and publishers

use crate::{
    error::AppResult,
    models::{
        account::UserClaims,
        author::{Author, AuthorQuery, CreateAuthor, UpdateAuthor},
        book::{BookDetails, BookQuery, BookShort, CreateBook, UpdateBook},
        category::{Category, CategoryQuery, CreateCategory, UpdateCategory},
        publisher::{CreatePublisher, Publisher, PublisherQuery, UpdatePublisher},
        PageQuery,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    // =========================================================================
    // BOOKS
    // =========================================================================

    pub async fn search_books(&self, query: &BookQuery, page: &PageQuery) -> AppResult<(Vec<BookShort>, i64)> {
        self.repository.books.list(query, page).await
    }

    pub async fn get_book(&self, id: i32) -> AppResult<BookDetails> {
        self.repository.books.get_details(id).await
    }

    pub async fn create_book(&self, claims: &UserClaims, data: &CreateBook) -> AppResult<BookDetails> {
        claims.require_staff()?;
        let id = self.repository.books.create(data).await?;
        tracing::info!(book_id = id, title = %data.title, "Book created");
        self.repository.books.get_details(id).await
    }

    pub async fn update_book(&self, claims: &UserClaims, id: i32, data: &UpdateBook) -> AppResult<BookDetails> {
        claims.require_staff()?;
        self.repository.books.update(id, data).await?;
        self.repository.books.get_details(id).await
    }

    pub async fn delete_book(&self, claims: &UserClaims, id: i32) -> AppResult<()> {
        claims.require_staff()?;
        self.repository.books.delete(id).await?;
        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }

    // =========================================================================
    // AUTHORS
    // =========================================================================

    pub async fn search_authors(&self, query: &AuthorQuery, page: &PageQuery) -> AppResult<(Vec<Author>, i64)> {
        self.repository.authors.list(query, page).await
    }

    pub async fn get_author(&self, id: i32) -> AppResult<Author> {
        self.repository.authors.get_by_id(id).await
    }

    pub async fn create_author(&self, claims: &UserClaims, data: &CreateAuthor) -> AppResult<Author> {
        claims.require_staff()?;
        self.repository.authors.create(data).await
    }

    pub async fn update_author(&self, claims: &UserClaims, id: i32, data: &UpdateAuthor) -> AppResult<Author> {
        claims.require_staff()?;
        self.repository.authors.update(id, data).await
    }

    pub async fn delete_author(&self, claims: &UserClaims, id: i32) -> AppResult<()> {
        claims.require_staff()?;
        self.repository.authors.delete(id).await
    }

    // =========================================================================
    // CATEGORIES
    // =========================================================================

    pub async fn search_categories(
        &self,
        query: &CategoryQuery,
        page: &PageQuery,
    ) -> AppResult<(Vec<Category>, i64)> {
        self.repository.categories.list(query, page).await
    }

    pub async fn get_category(&self, id: i32) -> AppResult<Category> {
        self.repository.categories.get_by_id(id).await
    }

    pub async fn create_category(&self, claims: &UserClaims, data: &CreateCategory) -> AppResult<Category> {
        claims.require_staff()?;
        self.repository.categories.create(data).await
    }

    pub async fn update_category(&self, claims: &UserClaims, id: i32, data: &UpdateCategory) -> AppResult<Category> {
        claims.require_staff()?;
        self.repository.categories.update(id, data).await
    }

    pub async fn delete_category(&self, claims: &UserClaims, id: i32) -> AppResult<()> {
        claims.require_staff()?;
        self.repository.categories.delete(id).await
    }

    // =========================================================================
    // PUBLISHERS
    // =========================================================================

    pub async fn search_publishers(
        &self,
        query: &PublisherQuery,
        page: &PageQuery,
    ) -> AppResult<(Vec<Publisher>, i64)> {
        self.repository.publishers.list(query, page).await
    }

    pub async fn get_publisher(&self, id: i32) -> AppResult<Publisher> {
        self.repository.publishers.get_by_id(id).await
    }

    pub async fn create_publisher(&self, claims: &UserClaims, data: &CreatePublisher) -> AppResult<Publisher> {
        claims.require_staff()?;
        self.repository.publishers.create(data).await
    }

    pub async fn update_publisher(&self, claims: &UserClaims, id: i32, data: &UpdatePublisher) -> AppResult<Publisher> {
        claims.require_staff()?;
        self.repository.publishers.update(id, data).await
    }

    pub async fn delete_publisher(&self, claims: &UserClaims, id: i32) -> AppResult<()> {
        claims.require_staff()?;
        self.repository.publishers.delete(id).await
    }
}
