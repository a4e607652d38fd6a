//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{
    auth, authors, books, categories, conversations, copies, dashboard, health, loans, members,
    publishers, staff,
};
use crate::models;

/// Registers the `bearer_auth` scheme referenced by secured paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stacks API",
        version = "0.1.0",
        description = "Library back-office REST API",
        license(name = "AGPL-3.0")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    modifiers(&BearerAuth),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::login,
        auth::register,
        auth::me,
        auth::change_password,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Copies
        copies::list_copies,
        copies::create_copy,
        copies::get_copy,
        copies::update_copy,
        copies::delete_copy,
        // Authors
        authors::list_authors,
        authors::get_author,
        authors::create_author,
        authors::update_author,
        authors::delete_author,
        // Categories
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        // Publishers
        publishers::list_publishers,
        publishers::get_publisher,
        publishers::create_publisher,
        publishers::update_publisher,
        publishers::delete_publisher,
        // Members
        members::list_members,
        members::get_member,
        members::create_member,
        members::update_member,
        members::delete_member,
        // Staff
        staff::list_staff,
        staff::get_staff,
        staff::create_staff,
        staff::update_staff,
        staff::delete_staff,
        // Loans
        loans::list_loans,
        loans::member_loans,
        loans::get_loan,
        loans::create_loan,
        loans::return_loan,
        loans::renew_loan,
        loans::report_lost,
        // Conversations
        conversations::list_conversations,
        conversations::create_conversation,
        conversations::get_conversation,
        conversations::list_messages,
        conversations::send_message,
        conversations::mark_read,
        conversations::events,
        // Dashboard
        dashboard::get_dashboard,
    ),
    components(
        schemas(
            // Auth
            models::account::LoginRequest,
            models::account::LoginResponse,
            models::account::CurrentUser,
            models::account::ChangePassword,
            models::account::Role,
            models::account::UserType,
            // Catalog
            models::book::BookShort,
            models::book::BookDetails,
            models::book::CreateBook,
            models::book::UpdateBook,
            models::author::Author,
            models::author::AuthorRef,
            models::author::CreateAuthor,
            models::author::UpdateAuthor,
            models::category::Category,
            models::category::CategoryRef,
            models::category::CreateCategory,
            models::category::UpdateCategory,
            models::publisher::Publisher,
            models::publisher::CreatePublisher,
            models::publisher::UpdatePublisher,
            // Copies
            models::copy::BookCopy,
            models::copy::CopyStatus,
            models::copy::CreateCopy,
            models::copy::UpdateCopy,
            // Directory
            models::member::Member,
            models::member::MemberStatus,
            models::member::CreateMember,
            models::member::UpdateMember,
            models::staff::Staff,
            models::staff::CreateStaff,
            models::staff::UpdateStaff,
            // Loans
            models::loan::LoanDetails,
            models::loan::LoanStatus,
            models::loan::CreateLoan,
            models::loan::ReturnLoan,
            models::loan::ReportLost,
            // Messaging
            models::conversation::Conversation,
            models::conversation::ConversationSummary,
            models::conversation::Message,
            models::conversation::CreateConversation,
            models::conversation::SendMessage,
            models::conversation::ChatEvent,
            conversations::ConversationCreated,
            conversations::MarkReadResponse,
            // Dashboard
            models::dashboard::DashboardStats,
            models::dashboard::LoanCounts,
            models::dashboard::CopyCounts,
            models::dashboard::CategoryCount,
            models::dashboard::BorrowedBook,
            // Pages
            models::PaginatedBooks,
            models::PaginatedAuthors,
            models::PaginatedCategories,
            models::PaginatedPublishers,
            models::PaginatedMembers,
            models::PaginatedStaff,
            models::PaginatedLoans,
            models::PaginatedConversations,
            models::PaginatedMessages,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "books", description = "Catalog records"),
        (name = "copies", description = "Physical copies"),
        (name = "authors", description = "Authors"),
        (name = "categories", description = "Categories"),
        (name = "publishers", description = "Publishers"),
        (name = "members", description = "Member directory"),
        (name = "staff", description = "Staff directory"),
        (name = "loans", description = "Loan management"),
        (name = "conversations", description = "Member/staff messaging"),
        (name = "dashboard", description = "Statistics")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_loan_routes_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/loans"));
        assert!(doc.paths.paths.contains_key("/loans/{id}/return"));
        assert!(doc.paths.paths.contains_key("/conversations/{id}/events"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
