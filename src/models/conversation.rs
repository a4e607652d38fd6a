//! Member/staff conversations and messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::account::UserType;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Conversation {
    pub id: i32,
    pub member_id: i32,
    pub staff_id: Option<i32>,
    pub subject: String,
    pub created_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
}

/// Conversation row for inbox listings
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ConversationSummary {
    pub id: i32,
    pub member_id: i32,
    pub member_name: String,
    pub staff_id: Option<i32>,
    pub staff_name: Option<String>,
    pub subject: String,
    pub last_message_at: DateTime<Utc>,
    /// Messages from the other side not yet read by the caller
    pub unread_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Message {
    pub id: i32,
    pub conversation_id: i32,
    pub sender_account_id: i32,
    pub sender_type: UserType,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Open a conversation (members only)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateConversation {
    #[validate(length(min = 1, max = 200, message = "Subject must be 1-200 characters"))]
    pub subject: String,
    #[validate(length(min = 1, max = 4000, message = "Message must be 1-4000 characters"))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SendMessage {
    #[validate(length(min = 1, max = 4000, message = "Message must be 1-4000 characters"))]
    pub content: String,
}

/// Event pushed to conversation subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Message { message: Message },
    Read { conversation_id: i32, reader: UserType, read_at: DateTime<Utc> },
}

impl ChatEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            ChatEvent::Message { .. } => "message",
            ChatEvent::Read { .. } => "read",
        }
    }
}
