//! Member/staff messaging endpoints, including the live event stream

use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use serde::Serialize;
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    Stream, StreamExt,
};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        conversation::{Conversation, CreateConversation, Message, SendMessage},
        PageQuery, Paginated, PaginatedConversations, PaginatedMessages,
    },
    AppState,
};

use super::{AuthenticatedUser, EventStreamUser};

/// Newly opened conversation with its first message
#[derive(Serialize, ToSchema)]
pub struct ConversationCreated {
    pub conversation: Conversation,
    pub message: Message,
}

#[derive(Serialize, ToSchema)]
pub struct MarkReadResponse {
    /// Messages newly marked as read
    pub marked: u64,
}

/// List conversations (staff: all, members: their own)
#[utoipa::path(
    get,
    path = "/conversations",
    tag = "conversations",
    security(("bearer_auth" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "Page of conversations, most recent first", body = PaginatedConversations)
    )
)]
pub async fn list_conversations(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedConversations>> {
    let (rows, total) = state.services.messaging.list(&claims, &page).await?;
    Ok(Json(Paginated::new(rows, total, &page)))
}

/// Open a conversation (members only)
#[utoipa::path(
    post,
    path = "/conversations",
    tag = "conversations",
    security(("bearer_auth" = [])),
    request_body = CreateConversation,
    responses(
        (status = 201, description = "Conversation opened", body = ConversationCreated),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Only members can open conversations")
    )
)]
pub async fn create_conversation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateConversation>,
) -> AppResult<(StatusCode, Json<ConversationCreated>)> {
    request.validate()?;
    let (conversation, message) = state.services.messaging.create(&claims, &request).await?;
    Ok((StatusCode::CREATED, Json(ConversationCreated { conversation, message })))
}

/// Get a conversation
#[utoipa::path(
    get,
    path = "/conversations/{id}",
    tag = "conversations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Conversation ID")),
    responses(
        (status = 200, description = "Conversation", body = Conversation),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Conversation not found")
    )
)]
pub async fn get_conversation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Conversation>> {
    let conversation = state.services.messaging.get(&claims, id).await?;
    Ok(Json(conversation))
}

/// List messages, oldest first
#[utoipa::path(
    get,
    path = "/conversations/{id}/messages",
    tag = "conversations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Conversation ID"), PageQuery),
    responses(
        (status = 200, description = "Page of messages", body = PaginatedMessages),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Conversation not found")
    )
)]
pub async fn list_messages(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedMessages>> {
    let (rows, total) = state.services.messaging.messages(&claims, id, &page).await?;
    Ok(Json(Paginated::new(rows, total, &page)))
}

/// Send a message
#[utoipa::path(
    post,
    path = "/conversations/{id}/messages",
    tag = "conversations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Conversation ID")),
    request_body = SendMessage,
    responses(
        (status = 201, description = "Message stored and broadcast", body = Message),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Conversation not found")
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<SendMessage>,
) -> AppResult<(StatusCode, Json<Message>)> {
    request.validate()?;
    let message = state.services.messaging.send(&claims, id, &request).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Mark the other side's messages as read
#[utoipa::path(
    post,
    path = "/conversations/{id}/read",
    tag = "conversations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Conversation ID")),
    responses(
        (status = 200, description = "Messages marked read", body = MarkReadResponse),
        (status = 403, description = "Not a participant")
    )
)]
pub async fn mark_read(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<MarkReadResponse>> {
    let marked = state.services.messaging.mark_read(&claims, id).await?;
    Ok(Json(MarkReadResponse { marked }))
}

/// Live conversation events (Server-Sent Events).
///
/// Emits `message` and `read` events whose data is the JSON `ChatEvent`.
/// The token may be passed as `?access_token=` for `EventSource` clients.
#[utoipa::path(
    get,
    path = "/conversations/{id}/events",
    tag = "conversations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Conversation ID")),
    responses(
        (status = 200, description = "text/event-stream of ChatEvent"),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Conversation not found")
    )
)]
pub async fn events(
    State(state): State<AppState>,
    EventStreamUser(claims): EventStreamUser,
    Path(id): Path<i32>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let rx = state.services.messaging.subscribe(&claims, id).await?;
    tracing::debug!(conversation_id = id, account = %claims.sub, "Event stream opened");

    let stream = BroadcastStream::new(rx).filter_map(move |item| match item {
        Ok(event) => match Event::default().event(event.name()).json_data(&event) {
            Ok(sse) => Some(Ok(sse)),
            Err(e) => {
                tracing::error!(conversation_id = id, "Failed to encode chat event: {}", e);
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(conversation_id = id, skipped, "Event stream lagged");
            None
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
