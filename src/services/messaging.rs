//! Member/staff messaging: persistence first, then real-time fan-out

use chrono::Utc;
use tokio::sync::broadcast;

use crate::{
    error::{AppError, AppResult},
    models::{
        account::UserClaims,
        conversation::{ChatEvent, Conversation, ConversationSummary, CreateConversation, Message, SendMessage},
        PageQuery,
    },
    repository::Repository,
};

use super::chat::ChatHub;

#[derive(Clone)]
pub struct MessagingService {
    repository: Repository,
    hub: ChatHub,
}

impl MessagingService {
    pub fn new(repository: Repository, hub: ChatHub) -> Self {
        Self { repository, hub }
    }

    /// Load a conversation the caller takes part in
    async fn accessible(&self, claims: &UserClaims, id: i32) -> AppResult<Conversation> {
        let conversation = self.repository.conversations.get_by_id(id).await?;
        claims.require_member_access(conversation.member_id)?;
        Ok(conversation)
    }

    /// Staff see every conversation, members their own
    pub async fn list(&self, claims: &UserClaims, page: &PageQuery) -> AppResult<(Vec<ConversationSummary>, i64)> {
        self.repository
            .conversations
            .list(claims.user_type, claims.member_id(), page)
            .await
    }

    pub async fn get(&self, claims: &UserClaims, id: i32) -> AppResult<Conversation> {
        self.accessible(claims, id).await
    }

    /// Members open conversations with the library
    pub async fn create(
        &self,
        claims: &UserClaims,
        data: &CreateConversation,
    ) -> AppResult<(Conversation, Message)> {
        let member_id = claims.member_id().ok_or_else(|| {
            AppError::Authorization("Only members can open conversations".to_string())
        })?;
        let (conversation, message) = self
            .repository
            .conversations
            .create(member_id, claims.account_id()?, &data.subject, &data.content)
            .await?;
        tracing::info!(conversation_id = conversation.id, member_id, "Conversation opened");
        Ok((conversation, message))
    }

    pub async fn messages(
        &self,
        claims: &UserClaims,
        id: i32,
        page: &PageQuery,
    ) -> AppResult<(Vec<Message>, i64)> {
        self.accessible(claims, id).await?;
        self.repository.conversations.messages(id, page).await
    }

    pub async fn send(&self, claims: &UserClaims, id: i32, data: &SendMessage) -> AppResult<Message> {
        self.accessible(claims, id).await?;
        let message = self
            .repository
            .conversations
            .send(id, claims.account_id()?, claims.user_type, claims.staff_id(), &data.content)
            .await?;

        let reached = self
            .hub
            .publish(id, ChatEvent::Message { message: message.clone() })
            .await;
        tracing::debug!(conversation_id = id, message_id = message.id, reached, "Message sent");
        Ok(message)
    }

    /// Mark the other side's messages read. Returns how many were marked.
    pub async fn mark_read(&self, claims: &UserClaims, id: i32) -> AppResult<u64> {
        self.accessible(claims, id).await?;
        let read_at = Utc::now();
        let marked = self
            .repository
            .conversations
            .mark_read(id, claims.user_type, read_at)
            .await?;
        if marked > 0 {
            self.hub
                .publish(
                    id,
                    ChatEvent::Read {
                        conversation_id: id,
                        reader: claims.user_type,
                        read_at,
                    },
                )
                .await;
        }
        Ok(marked)
    }

    /// Join the conversation's event group
    pub async fn subscribe(
        &self,
        claims: &UserClaims,
        id: i32,
    ) -> AppResult<broadcast::Receiver<ChatEvent>> {
        self.accessible(claims, id).await?;
        Ok(self.hub.subscribe(id).await)
    }
}
