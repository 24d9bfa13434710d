use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::UserId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub Uuid);

impl ThreadId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SenderRole {
    #[serde(rename = "USER")]
    User,
    #[serde(rename = "ADMIN")]
    Admin,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadStatus {
    #[serde(rename = "OPEN")]
    Open,
    #[serde(rename = "CLOSED")]
    Closed,
}

pub const MAX_MESSAGE_LEN: usize = 4000;

/// One support conversation per customer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportThread {
    pub id: ThreadId,
    pub user_id: UserId,
    pub admin_id: Option<UserId>,
    pub status: ThreadStatus,
    pub last_sender: SenderRole,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SupportThread {
    pub fn open(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: ThreadId::random(),
            user_id,
            admin_id: None,
            status: ThreadStatus::Open,
            last_sender: SenderRole::User,
            last_message_at: now,
            created_at: now,
        }
    }

    /// An open thread whose latest message came from the customer is waiting
    /// on the back office.
    pub fn needs_reply(&self) -> bool {
        self.status == ThreadStatus::Open && self.last_sender == SenderRole::User
    }
}

/// Chat message with a monotonically increasing sequence number. Pollers pass
/// the highest sequence they have seen as a `since` cursor, so a slow response
/// racing a newer one can never resurrect stale messages.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub seq: u64,
    pub thread_id: ThreadId,
    pub sender_role: SenderRole,
    pub sender_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// All support threads and messages, with one sequence counter shared across
/// threads so a single cursor covers the whole panel.
#[derive(Debug, Default)]
pub struct SupportDesk {
    threads: Vec<SupportThread>,
    messages: Vec<ChatMessage>,
    next_seq: u64,
}

impl SupportDesk {
    pub fn threads(&self) -> &[SupportThread] {
        &self.threads
    }

    pub fn thread(&self, id: ThreadId) -> Option<&SupportThread> {
        self.threads.iter().find(|t| t.id == id)
    }

    pub fn thread_of_user(&self, user_id: UserId) -> Option<&SupportThread> {
        self.threads.iter().find(|t| t.user_id == user_id)
    }

    /// Latest sequence number handed out; the cursor clients echo back.
    pub fn cursor(&self) -> u64 {
        self.next_seq
    }

    /// Messages of one thread newer than `since`, oldest first, capped at
    /// `limit`.
    pub fn messages(&self, thread_id: ThreadId, since: u64, limit: usize) -> Vec<&ChatMessage> {
        self.messages
            .iter()
            .filter(|m| m.thread_id == thread_id && m.seq > since)
            .take(limit)
            .collect()
    }

    /// Closes an open thread so it stops counting as pending. A later
    /// customer message reopens it.
    pub fn close(&mut self, thread_id: ThreadId) -> Result<&SupportThread, ChatError> {
        let thread = self
            .threads
            .iter_mut()
            .find(|t| t.id == thread_id)
            .ok_or(ChatError::UnknownThread)?;
        thread.status = ThreadStatus::Closed;
        Ok(thread)
    }

    /// Appends a message, creating the customer's thread on first contact.
    /// Admin messages require an existing thread and claim it.
    pub fn send(
        &mut self,
        thread_id: Option<ThreadId>,
        sender_role: SenderRole,
        sender_id: UserId,
        body: String,
    ) -> Result<&ChatMessage, ChatError> {
        if body.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if body.chars().count() > MAX_MESSAGE_LEN {
            return Err(ChatError::MessageTooLong);
        }

        let thread_id = match (sender_role, thread_id) {
            (SenderRole::Admin, None) => return Err(ChatError::UnknownThread),
            (_, Some(id)) => {
                if self.thread(id).is_none() {
                    return Err(ChatError::UnknownThread);
                }
                id
            }
            (SenderRole::User, None) => match self.thread_of_user(sender_id) {
                Some(t) => t.id,
                None => {
                    let thread = SupportThread::open(sender_id);
                    let id = thread.id;
                    self.threads.push(thread);
                    id
                }
            },
        };

        let now = Utc::now();
        let thread = self
            .threads
            .iter_mut()
            .find(|t| t.id == thread_id)
            .ok_or(ChatError::UnknownThread)?;
        thread.last_sender = sender_role;
        thread.last_message_at = now;
        if sender_role == SenderRole::User {
            thread.status = ThreadStatus::Open;
        }
        if sender_role == SenderRole::Admin && thread.admin_id.is_none() {
            thread.admin_id = Some(sender_id);
        }

        self.next_seq += 1;
        self.messages.push(ChatMessage {
            seq: self.next_seq,
            thread_id,
            sender_role,
            sender_id,
            body,
            created_at: now,
        });
        Ok(self.messages.last().unwrap())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChatError {
    EmptyMessage,
    MessageTooLong,
    UnknownThread,
}

impl ChatError {
    pub fn message(&self) -> &'static str {
        match self {
            ChatError::EmptyMessage => "Message is required",
            ChatError::MessageTooLong => "Message is too long (max 4000)",
            ChatError::UnknownThread => "Chat thread not found",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_create_a_thread_on_first_user_message() {
        let mut desk = SupportDesk::default();
        let user = UserId::random();

        desk.send(None, SenderRole::User, user, "hello".into()).unwrap();

        let thread = desk.thread_of_user(user).unwrap();
        assert!(thread.needs_reply());
    }

    #[test]
    fn should_reuse_the_thread_on_later_messages() {
        let mut desk = SupportDesk::default();
        let user = UserId::random();

        desk.send(None, SenderRole::User, user, "one".into()).unwrap();
        desk.send(None, SenderRole::User, user, "two".into()).unwrap();

        assert_eq!(desk.threads().len(), 1);
    }

    #[test]
    fn should_clear_needs_reply_after_an_admin_answer() {
        let mut desk = SupportDesk::default();
        let user = UserId::random();
        let admin = UserId::random();

        desk.send(None, SenderRole::User, user, "help".into()).unwrap();
        let thread_id = desk.thread_of_user(user).unwrap().id;
        desk.send(Some(thread_id), SenderRole::Admin, admin, "on it".into())
            .unwrap();

        let thread = desk.thread(thread_id).unwrap();
        assert!(!thread.needs_reply());
        assert_eq!(thread.admin_id, Some(admin));
    }

    #[test]
    fn should_require_a_thread_for_admin_messages() {
        let mut desk = SupportDesk::default();

        let err = desk
            .send(None, SenderRole::Admin, UserId::random(), "hi".into())
            .unwrap_err();
        assert_eq!(err, ChatError::UnknownThread);
    }

    #[test]
    fn should_reject_empty_and_oversized_messages() {
        let mut desk = SupportDesk::default();
        let user = UserId::random();

        let err = desk.send(None, SenderRole::User, user, "   ".into()).unwrap_err();
        assert_eq!(err, ChatError::EmptyMessage);

        let long = "x".repeat(MAX_MESSAGE_LEN + 1);
        let err = desk.send(None, SenderRole::User, user, long).unwrap_err();
        assert_eq!(err, ChatError::MessageTooLong);
    }

    #[test]
    fn should_close_a_thread_and_reopen_on_a_user_message() {
        let mut desk = SupportDesk::default();
        let user = UserId::random();

        desk.send(None, SenderRole::User, user, "help".into()).unwrap();
        let thread_id = desk.thread_of_user(user).unwrap().id;

        let closed = desk.close(thread_id).unwrap();
        assert_eq!(closed.status, ThreadStatus::Closed);
        assert!(!desk.thread(thread_id).unwrap().needs_reply());

        desk.send(None, SenderRole::User, user, "still broken".into())
            .unwrap();
        assert_eq!(desk.thread(thread_id).unwrap().status, ThreadStatus::Open);
    }

    #[test]
    fn should_refuse_to_close_an_unknown_thread() {
        let mut desk = SupportDesk::default();
        let err = desk.close(ThreadId::random()).unwrap_err();
        assert_eq!(err, ChatError::UnknownThread);
    }

    #[test]
    fn should_filter_messages_by_cursor() {
        let mut desk = SupportDesk::default();
        let user = UserId::random();

        desk.send(None, SenderRole::User, user, "one".into()).unwrap();
        let cursor = desk.cursor();
        desk.send(None, SenderRole::User, user, "two".into()).unwrap();
        desk.send(None, SenderRole::User, user, "three".into()).unwrap();

        let thread_id = desk.thread_of_user(user).unwrap().id;
        let fresh = desk.messages(thread_id, cursor, 100);
        let bodies: Vec<&str> = fresh.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["two", "three"]);

        // A stale poller replaying an old cursor only ever moves forward.
        assert!(desk.cursor() > cursor);
    }
}
