//! Repository layer for database operations

pub mod accounts;
pub mod authors;
pub mod books;
pub mod categories;
pub mod conversations;
pub mod copies;
pub mod dashboard;
pub mod loans;
pub mod members;
pub mod publishers;
pub mod staff;

use sqlx::{Pool, Postgres};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub accounts: accounts::AccountsRepository,
    pub authors: authors::AuthorsRepository,
    pub books: books::BooksRepository,
    pub categories: categories::CategoriesRepository,
    pub conversations: conversations::ConversationsRepository,
    pub copies: copies::CopiesRepository,
    pub dashboard: dashboard::DashboardRepository,
    pub loans: loans::LoansRepository,
    pub members: members::MembersRepository,
    pub publishers: publishers::PublishersRepository,
    pub staff: staff::StaffRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            accounts: accounts::AccountsRepository::new(pool.clone()),
            authors: authors::AuthorsRepository::new(pool.clone()),
            books: books::BooksRepository::new(pool.clone()),
            categories: categories::CategoriesRepository::new(pool.clone()),
            conversations: conversations::ConversationsRepository::new(pool.clone()),
            copies: copies::CopiesRepository::new(pool.clone()),
            dashboard: dashboard::DashboardRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            members: members::MembersRepository::new(pool.clone()),
            publishers: publishers::PublishersRepository::new(pool.clone()),
            staff: staff::StaffRepository::new(pool.clone()),
            pool,
        }
    }

    /// Round-trip to the database (readiness probe)
    pub async fn ping(&self) -> crate::error::AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Integrity constraint classes reported by PostgreSQL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    Unique,
    ForeignKey,
    Check,
}

/// Classify a database error by SQLSTATE
pub fn violation(err: &sqlx::Error) -> Option<Violation> {
    match err {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("23505") => Some(Violation::Unique),
            Some("23503") => Some(Violation::ForeignKey),
            Some("23514") => Some(Violation::Check),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_are_not_violations() {
        assert_eq!(violation(&sqlx::Error::RowNotFound), None);
        assert_eq!(violation(&sqlx::Error::PoolTimedOut), None);
    }
}
