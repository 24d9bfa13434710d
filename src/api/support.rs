use std::collections::HashMap;

use hyper::{Body, Response};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{
    ApiContext, ChatError, ChatMessage, Command, Rejection, SenderRole, State, SupportThread,
    ThreadId, UserAccount,
};

use super::auth::Session;
use super::error::HttpResult;
use super::{ok_response, parse_body, rejection_response};

const DEFAULT_LIMIT: usize = 250;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThreadRow {
    #[serde(flatten)]
    thread: SupportThread,
    username: Option<String>,
    email: Option<String>,
    admin_username: Option<String>,
    needs_reply: bool,
}

impl ThreadRow {
    fn of(state: &State, thread: &SupportThread) -> Self {
        let user = state.user(thread.user_id);
        let admin = thread.admin_id.and_then(|id| state.user(id));
        Self {
            thread: thread.clone(),
            username: user.map(|u| u.username.clone()),
            email: user.and_then(|u| u.email.clone()),
            admin_username: admin.map(|a| a.username.clone()),
            needs_reply: thread.needs_reply(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserListResponse {
    thread: Option<SupportThread>,
    messages: Vec<ChatMessage>,
    cursor: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminListResponse {
    pending_count: usize,
    active_thread_id: Option<ThreadId>,
    threads: Vec<ThreadRow>,
    messages: Vec<ChatMessage>,
    cursor: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    message: ChatMessage,
    cursor: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserSendBody {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdminSendBody {
    thread_id: Uuid,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloseBody {
    thread_id: Uuid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClosedResponse {
    thread: SupportThread,
}

fn since(query: &HashMap<String, String>) -> u64 {
    query
        .get("since")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

fn limit(query: &HashMap<String, String>) -> usize {
    query
        .get("limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_LIMIT)
}

fn thread_visible(state: &State, thread: &SupportThread, admin: &UserAccount) -> bool {
    state
        .user(thread.user_id)
        .map(|customer| customer.managed_visible_to(admin))
        .unwrap_or(false)
}

pub(super) async fn user_list(
    context: &ApiContext,
    session: Session,
    query: &HashMap<String, String>,
) -> HttpResult<Response<Body>> {
    let state = context.read_state().await;
    let support = state.support();

    let thread = support.thread_of_user(session.user_id).cloned();
    let messages = match &thread {
        Some(t) => support
            .messages(t.id, since(query), limit(query))
            .into_iter()
            .cloned()
            .collect(),
        None => Vec::new(),
    };

    ok_response(&UserListResponse {
        thread,
        messages,
        cursor: support.cursor(),
    })
}

pub(super) async fn user_send(
    context: &ApiContext,
    session: Session,
    body: Body,
) -> HttpResult<Response<Body>> {
    let payload: UserSendBody = parse_body(body).await?;

    let result = context
        .execute(|reply| Command::SendChatMessage {
            thread_id: None,
            sender_role: SenderRole::User,
            sender_id: session.user_id,
            body: payload.message,
            reply,
        })
        .await?;

    match result {
        Ok(message) => {
            let cursor = message.seq;
            ok_response(&SendResponse { message, cursor })
        }
        Err(rejection) => rejection_response(&rejection),
    }
}

pub(super) async fn admin_close(
    context: &ApiContext,
    session: Session,
    body: Body,
) -> HttpResult<Response<Body>> {
    session.require_admin()?;
    let payload: CloseBody = parse_body(body).await?;
    let thread_id = ThreadId(payload.thread_id);

    {
        let state = context.read_state().await;
        let admin = state
            .user(session.user_id)
            .ok_or_else(super::error::internal_err)?;
        let visible = state
            .support()
            .thread(thread_id)
            .map(|t| thread_visible(&state, t, admin))
            .unwrap_or(false);
        if !visible {
            return rejection_response(&Rejection::Chat(ChatError::UnknownThread));
        }
    }

    let result = context
        .execute(|reply| Command::CloseSupportThread { thread_id, reply })
        .await?;

    match result {
        Ok(thread) => ok_response(&ClosedResponse { thread }),
        Err(rejection) => rejection_response(&rejection),
    }
}

pub(super) async fn admin_list(
    context: &ApiContext,
    session: Session,
    query: &HashMap<String, String>,
) -> HttpResult<Response<Body>> {
    session.require_admin()?;

    let state = context.read_state().await;
    let admin = state
        .user(session.user_id)
        .ok_or_else(super::error::internal_err)?;
    let support = state.support();

    let mut threads: Vec<&SupportThread> = support
        .threads()
        .iter()
        .filter(|t| thread_visible(&state, t, admin))
        .collect();
    threads.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));

    let requested = query
        .get("threadId")
        .or_else(|| query.get("thread_id"))
        .and_then(|v| v.parse::<Uuid>().ok())
        .map(ThreadId);
    let active_thread_id = requested
        .filter(|id| threads.iter().any(|t| t.id == *id))
        .or_else(|| threads.first().map(|t| t.id));

    let messages = match active_thread_id {
        Some(id) => support
            .messages(id, since(query), limit(query))
            .into_iter()
            .cloned()
            .collect(),
        None => Vec::new(),
    };

    let pending_count = threads.iter().filter(|t| t.needs_reply()).count();
    let rows: Vec<ThreadRow> = threads
        .iter()
        .map(|t| ThreadRow::of(&state, t))
        .collect();

    ok_response(&AdminListResponse {
        pending_count,
        active_thread_id,
        threads: rows,
        messages,
        cursor: support.cursor(),
    })
}

pub(super) async fn admin_send(
    context: &ApiContext,
    session: Session,
    body: Body,
) -> HttpResult<Response<Body>> {
    session.require_admin()?;
    let payload: AdminSendBody = parse_body(body).await?;
    let thread_id = ThreadId(payload.thread_id);

    {
        let state = context.read_state().await;
        let admin = state
            .user(session.user_id)
            .ok_or_else(super::error::internal_err)?;
        let visible = state
            .support()
            .thread(thread_id)
            .map(|t| thread_visible(&state, t, admin))
            .unwrap_or(false);
        if !visible {
            return rejection_response(&Rejection::Chat(ChatError::UnknownThread));
        }
    }

    let result = context
        .execute(|reply| Command::SendChatMessage {
            thread_id: Some(thread_id),
            sender_role: SenderRole::Admin,
            sender_id: session.user_id,
            body: payload.message,
            reply,
        })
        .await?;

    match result {
        Ok(message) => {
            let cursor = message.seq;
            ok_response(&SendResponse { message, cursor })
        }
        Err(rejection) => rejection_response(&rejection),
    }
}
