//! Book (catalog record) model and related types

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{author::AuthorRef, category::CategoryRef, publisher::Publisher};

/// Book row from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub isbn: Option<String>,
    pub publisher_id: Option<i32>,
    pub publication_year: Option<i32>,
    pub language: Option<String>,
    pub page_count: Option<i32>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Short book representation for lists
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookShort {
    pub id: i32,
    pub title: String,
    pub isbn: Option<String>,
    pub publication_year: Option<i32>,
    pub cover_url: Option<String>,
    pub publisher_name: Option<String>,
    pub authors: Vec<AuthorRef>,
    pub categories: Vec<CategoryRef>,
    pub total_copies: i64,
    pub available_copies: i64,
}

/// Internal row structure for book list queries
#[derive(Debug, Clone, FromRow)]
pub struct BookShortRow {
    pub id: i32,
    pub title: String,
    pub isbn: Option<String>,
    pub publication_year: Option<i32>,
    pub cover_url: Option<String>,
    pub publisher_name: Option<String>,
    pub total_copies: i64,
    pub available_copies: i64,
}

/// Book with publisher, authors, categories and copy availability
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookDetails {
    pub id: i32,
    pub title: String,
    pub isbn: Option<String>,
    pub publication_year: Option<i32>,
    pub language: Option<String>,
    pub page_count: Option<i32>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub publisher: Option<Publisher>,
    pub authors: Vec<AuthorRef>,
    pub categories: Vec<CategoryRef>,
    pub total_copies: i64,
    pub available_copies: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Author or category name attached to a book, as returned by batch lookups
#[derive(Debug, Clone, FromRow)]
pub struct BookLink {
    pub book_id: i32,
    pub id: i32,
    pub name: String,
}

/// Group batch-fetched links by book id
pub fn group_links(links: Vec<BookLink>) -> HashMap<i32, Vec<(i32, String)>> {
    let mut grouped: HashMap<i32, Vec<(i32, String)>> = HashMap::new();
    for link in links {
        grouped.entry(link.book_id).or_default().push((link.id, link.name));
    }
    grouped
}

impl BookShortRow {
    pub fn into_short(self, authors: Vec<AuthorRef>, categories: Vec<CategoryRef>) -> BookShort {
        BookShort {
            id: self.id,
            title: self.title,
            isbn: self.isbn,
            publication_year: self.publication_year,
            cover_url: self.cover_url,
            publisher_name: self.publisher_name,
            authors,
            categories,
            total_copies: self.total_copies,
            available_copies: self.available_copies,
        }
    }
}

impl BookDetails {
    pub fn from_parts(
        book: Book,
        publisher: Option<Publisher>,
        authors: Vec<AuthorRef>,
        categories: Vec<CategoryRef>,
        (total_copies, available_copies): (i64, i64),
    ) -> Self {
        BookDetails {
            id: book.id,
            title: book.title,
            isbn: book.isbn,
            publication_year: book.publication_year,
            language: book.language,
            page_count: book.page_count,
            description: book.description,
            cover_url: book.cover_url,
            publisher,
            authors,
            categories,
            total_copies,
            available_copies,
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

/// Book list filters
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct BookQuery {
    /// Search in title or ISBN
    pub search: Option<String>,
    pub author_id: Option<i32>,
    pub category_id: Option<i32>,
    pub publisher_id: Option<i32>,
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 500, message = "Title must be 1-500 characters"))]
    pub title: String,
    #[validate(length(min = 10, max = 17, message = "ISBN must be 10-17 characters"))]
    pub isbn: Option<String>,
    pub publisher_id: Option<i32>,
    #[validate(range(min = 0, max = 3000, message = "Invalid publication year"))]
    pub publication_year: Option<i32>,
    pub language: Option<String>,
    #[validate(range(min = 1, message = "Page count must be positive"))]
    pub page_count: Option<i32>,
    pub description: Option<String>,
    #[validate(url(message = "Invalid cover URL"))]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub author_ids: Vec<i32>,
    #[serde(default)]
    pub category_ids: Vec<i32>,
}

/// Update book request. Link lists replace the current ones when present.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 500, message = "Title must be 1-500 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 10, max = 17, message = "ISBN must be 10-17 characters"))]
    pub isbn: Option<String>,
    pub publisher_id: Option<i32>,
    #[validate(range(min = 0, max = 3000, message = "Invalid publication year"))]
    pub publication_year: Option<i32>,
    pub language: Option<String>,
    #[validate(range(min = 1, message = "Page count must be positive"))]
    pub page_count: Option<i32>,
    pub description: Option<String>,
    #[validate(url(message = "Invalid cover URL"))]
    pub cover_url: Option<String>,
    pub author_ids: Option<Vec<i32>>,
    pub category_ids: Option<Vec<i32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_are_grouped_per_book() {
        let grouped = group_links(vec![
            BookLink { book_id: 1, id: 10, name: "Le Guin".into() },
            BookLink { book_id: 2, id: 11, name: "Herbert".into() },
            BookLink { book_id: 1, id: 12, name: "Tolkien".into() },
        ]);
        assert_eq!(grouped[&1], vec![(10, "Le Guin".to_string()), (12, "Tolkien".to_string())]);
        assert_eq!(grouped[&2].len(), 1);
        assert!(!grouped.contains_key(&3));
    }

    #[test]
    fn create_book_validation() {
        let book = CreateBook {
            title: String::new(),
            isbn: Some("123".into()),
            publisher_id: None,
            publication_year: None,
            language: None,
            page_count: Some(0),
            description: None,
            cover_url: None,
            author_ids: vec![],
            category_ids: vec![],
        };
        let errors = book.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("isbn"));
        assert!(fields.contains_key("page_count"));
    }
}
