//! Conversations and messages repository

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    error::{AppError, AppResult},
    models::{
        account::UserType,
        conversation::{Conversation, ConversationSummary, Message},
        PageQuery,
    },
};

#[derive(Clone)]
pub struct ConversationsRepository {
    pool: Pool<Postgres>,
}

impl ConversationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Inbox of `viewer`. Members only see their own conversations
    /// (`member_id` set); staff see all of them.
    pub async fn list(
        &self,
        viewer: UserType,
        member_id: Option<i32>,
        page: &PageQuery,
    ) -> AppResult<(Vec<ConversationSummary>, i64)> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM conversations cv WHERE TRUE");
        if let Some(member_id) = member_id {
            count.push(" AND cv.member_id = ").push_bind(member_id);
        }
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::new(
            r#"
            SELECT cv.id, cv.member_id, m.full_name AS member_name,
                   cv.staff_id, s.full_name AS staff_name,
                   cv.subject, cv.last_message_at,
                   (SELECT COUNT(*) FROM messages msg
                     WHERE msg.conversation_id = cv.id
                       AND msg.read_at IS NULL
                       AND msg.sender_type <> "#,
        );
        select
            .push_bind(viewer)
            .push(
                r#") AS unread_count
            FROM conversations cv
            JOIN members m ON m.id = cv.member_id
            LEFT JOIN staff s ON s.id = cv.staff_id
            WHERE TRUE"#,
            );
        if let Some(member_id) = member_id {
            select.push(" AND cv.member_id = ").push_bind(member_id);
        }
        select
            .push(" ORDER BY cv.last_message_at DESC, cv.id DESC LIMIT ")
            .push_bind(page.per_page())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = select
            .build_query_as::<ConversationSummary>()
            .fetch_all(&self.pool)
            .await?;

        Ok((rows, total))
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Conversation> {
        sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Conversation {} not found", id)))
    }

    /// Open a conversation with its first message
    pub async fn create(
        &self,
        member_id: i32,
        account_id: i32,
        subject: &str,
        content: &str,
    ) -> AppResult<(Conversation, Message)> {
        let mut tx = self.pool.begin().await?;

        let conversation = sqlx::query_as::<_, Conversation>(
            "INSERT INTO conversations (member_id, subject) VALUES ($1, $2) RETURNING *",
        )
        .bind(member_id)
        .bind(subject)
        .fetch_one(&mut *tx)
        .await?;

        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (conversation_id, sender_account_id, sender_type, content, sent_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(conversation.id)
        .bind(account_id)
        .bind(UserType::Member)
        .bind(content)
        .bind(conversation.created_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((conversation, message))
    }

    /// Messages of a conversation, oldest first
    pub async fn messages(&self, conversation_id: i32, page: &PageQuery) -> AppResult<(Vec<Message>, i64)> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE conversation_id = $1")
                .bind(conversation_id)
                .fetch_one(&self.pool)
                .await?;

        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE conversation_id = $1
            ORDER BY sent_at, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(conversation_id)
        .bind(page.per_page())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((messages, total))
    }

    /// Append a message. The first staff reply assigns the conversation.
    pub async fn send(
        &self,
        conversation_id: i32,
        account_id: i32,
        sender_type: UserType,
        staff_id: Option<i32>,
        content: &str,
    ) -> AppResult<Message> {
        let mut tx = self.pool.begin().await?;

        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (conversation_id, sender_account_id, sender_type, content)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(conversation_id)
        .bind(account_id)
        .bind(sender_type)
        .bind(content)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE conversations
            SET last_message_at = $2, staff_id = COALESCE(staff_id, $3)
            WHERE id = $1
            "#,
        )
        .bind(conversation_id)
        .bind(message.sent_at)
        .bind(staff_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(message)
    }

    /// Mark the other side's messages read. Returns how many changed.
    pub async fn mark_read(
        &self,
        conversation_id: i32,
        reader: UserType,
        read_at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE messages SET read_at = $3
            WHERE conversation_id = $1 AND sender_type <> $2 AND read_at IS NULL
            "#,
        )
        .bind(conversation_id)
        .bind(reader)
        .bind(read_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
