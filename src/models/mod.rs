//! Data models for Stacks

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

const DEFAULT_PER_PAGE: i64 = 20;
const MAX_PER_PAGE: i64 = 200;

/// Implements string conversions and TEXT column mapping for a unit enum.
///
/// Variants are stored lowercase; decoding an unknown value is an error
/// rather than a silent default.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($name), s)),
                }
            }
        }

        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let s: &str = sqlx::Decode::<sqlx::Postgres>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl sqlx::Encode<'_, sqlx::Postgres> for $name {
            fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
                <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
            }
        }
    };
}

pub(crate) use text_enum;

pub mod account;
pub mod author;
pub mod book;
pub mod category;
pub mod conversation;
pub mod copy;
pub mod dashboard;
pub mod loan;
pub mod member;
pub mod publisher;
pub mod staff;

// Re-export commonly used types
pub use account::{Account, Role, UserClaims, UserType};
pub use book::{Book, BookDetails, BookShort};
pub use copy::{BookCopy, CopyStatus};
pub use loan::{Loan, LoanDetails, LoanStatus};
pub use member::{Member, MemberStatus};
pub use staff::Staff;

/// Page/per_page query parameters shared by list endpoints
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct PageQuery {
    /// Page number (1-based, default 1)
    pub page: Option<i64>,
    /// Items per page (default 20, max 200)
    pub per_page: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.per_page()
    }
}

/// Paginated response wrapper
#[derive(Debug, Serialize, ToSchema)]
#[aliases(
    PaginatedBooks = Paginated<book::BookShort>,
    PaginatedAuthors = Paginated<author::Author>,
    PaginatedCategories = Paginated<category::Category>,
    PaginatedPublishers = Paginated<publisher::Publisher>,
    PaginatedMembers = Paginated<member::Member>,
    PaginatedStaff = Paginated<staff::Staff>,
    PaginatedLoans = Paginated<loan::LoanDetails>,
    PaginatedConversations = Paginated<conversation::ConversationSummary>,
    PaginatedMessages = Paginated<conversation::Message>
)]
pub struct Paginated<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

impl<T> Paginated<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub fn new(items: Vec<T>, total: i64, query: &PageQuery) -> Self {
        Self {
            items,
            total,
            page: query.page(),
            per_page: query.per_page(),
        }
    }
}

/// Escape a user search term for use in an ILIKE pattern
pub fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_and_clamps() {
        let q = PageQuery::default();
        assert_eq!(q.page(), 1);
        assert_eq!(q.per_page(), 20);
        assert_eq!(q.offset(), 0);

        let q = PageQuery { page: Some(0), per_page: Some(10_000) };
        assert_eq!(q.page(), 1);
        assert_eq!(q.per_page(), 200);

        let q = PageQuery { page: Some(3), per_page: Some(25) };
        assert_eq!(q.offset(), 50);
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" dune "), "%dune%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
