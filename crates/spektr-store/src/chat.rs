use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::session::{ADMIN_ID, seed_timestamp};
use spektr_db::{Database, keys};
use spektr_types::{
    Chat, ChatKind, Message, MessageKind, Reaction, ReactionEmoji, User, UserSummary,
};

/// The administrator conversation. Pinned, undeletable, unblockable.
pub const OFFICIAL_CHAT_ID: &str = "official-spektr";
/// The self-only "saved messages" conversation. Pinned, undeletable.
pub const SAVED_MESSAGES_ID: &str = "saved-messages";

const WELCOME_MESSAGE_ID: &str = "welcome-msg";
const WELCOME_TEXT: &str = "Это официальный чат со Spektr, если у вас остались пожелания или вопросы, пожалуйста напишите их в чат.";

/// Owns chats and per-chat message lists for the signed-in identity.
/// Constructed inactive; [`activate`](Self::activate) runs once an identity
/// exists. Every mutation rewrites the identity's full chat list and message
/// map in storage.
pub struct ConversationStore {
    db: Arc<Database>,
    user: Option<User>,
    chats: Vec<Chat>,
    messages: HashMap<String, Vec<Message>>,
    active_chat: Option<String>,
}

impl ConversationStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            user: None,
            chats: Vec::new(),
            messages: HashMap::new(),
            active_chat: None,
        }
    }

    /// Seeds the two reserved chats and the welcome message for `user`,
    /// then lets any previously persisted record override the seeds
    /// wholesale. A persisted list that lost the reserved chats stays
    /// without them; there is no merge.
    pub fn activate(&mut self, user: &User) -> Result<()> {
        self.user = Some(user.clone());
        self.active_chat = None;

        self.chats = vec![saved_messages_chat(user), official_chat(user)];
        self.messages =
            HashMap::from([(OFFICIAL_CHAT_ID.to_string(), vec![welcome_message()])]);

        if let Some(saved) = self.db.get_json::<Vec<Chat>>(&keys::conversations(&user.id))? {
            self.chats = saved;
        }
        if let Some(saved) = self
            .db
            .get_json::<HashMap<String, Vec<Message>>>(&keys::messages(&user.id))?
        {
            self.messages = saved;
        }

        self.persist()?;
        info!(username = %user.username, chats = self.chats.len(), "conversations activated");
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.user = None;
        self.chats.clear();
        self.messages.clear();
        self.active_chat = None;
    }

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn chat(&self, chat_id: &str) -> Option<&Chat> {
        self.chats.iter().find(|c| c.id == chat_id)
    }

    pub fn messages(&self, chat_id: &str) -> &[Message] {
        self.messages.get(chat_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn active_chat(&self) -> Option<&str> {
        self.active_chat.as_deref()
    }

    pub fn set_active_chat(&mut self, chat_id: Option<String>) {
        self.active_chat = chat_id;
    }

    /// Appends a message from the current identity and refreshes the chat's
    /// denormalized last-message cache. The unread counter resets while the
    /// chat is open and grows by one otherwise.
    pub fn send_message(
        &mut self,
        chat_id: &str,
        content: &str,
        kind: MessageKind,
        media_url: Option<String>,
    ) -> Result<()> {
        let Some(user) = &self.user else {
            warn!("send_message while signed out");
            return Ok(());
        };

        let now = Utc::now();
        let message = Message {
            id: Uuid::new_v4().to_string(),
            chat_id: chat_id.to_string(),
            sender_id: user.id.clone(),
            content: content.to_string(),
            kind,
            media_url,
            reactions: Vec::new(),
            is_edited: false,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };

        self.messages
            .entry(chat_id.to_string())
            .or_default()
            .push(message.clone());

        let is_active = self.active_chat.as_deref() == Some(chat_id);
        if let Some(chat) = self.chats.iter_mut().find(|c| c.id == chat_id) {
            chat.unread_count = if is_active { 0 } else { chat.unread_count + 1 };
            chat.last_message = Some(message);
        }

        self.persist()
    }

    /// Message ids are globally unique, so the lookup is a plain scan over
    /// every chat's list. An unknown id changes nothing.
    pub fn edit_message(&mut self, message_id: &str, new_content: &str) -> Result<()> {
        for list in self.messages.values_mut() {
            for msg in list.iter_mut() {
                if msg.id == message_id {
                    msg.content = new_content.to_string();
                    msg.is_edited = true;
                    msg.updated_at = Utc::now();
                }
            }
        }
        self.persist()
    }

    /// Hard remove; the `is_deleted` flag stays untouched on the way out.
    pub fn delete_message(&mut self, message_id: &str) -> Result<()> {
        for list in self.messages.values_mut() {
            list.retain(|m| m.id != message_id);
        }
        self.persist()
    }

    /// One reaction slot per user: the same emoji toggles off, a different
    /// one replaces.
    pub fn add_reaction(&mut self, message_id: &str, emoji: ReactionEmoji) -> Result<()> {
        let Some(user) = &self.user else {
            warn!("add_reaction while signed out");
            return Ok(());
        };
        let user_id = user.id.clone();

        for list in self.messages.values_mut() {
            for msg in list.iter_mut() {
                if msg.id != message_id {
                    continue;
                }
                match msg.reactions.iter().position(|r| r.user_id == user_id) {
                    Some(i) if msg.reactions[i].emoji == emoji => {
                        msg.reactions.remove(i);
                    }
                    Some(i) => msg.reactions[i].emoji = emoji,
                    None => msg.reactions.push(Reaction {
                        user_id: user_id.clone(),
                        emoji,
                    }),
                }
            }
        }
        self.persist()
    }

    /// Opens the existing chat with `username` if there is one, otherwise
    /// creates a direct chat and opens it. Calling twice is idempotent.
    pub fn create_chat(&mut self, username: &str) -> Result<Option<Chat>> {
        let Some(user) = &self.user else {
            warn!("create_chat while signed out");
            return Ok(None);
        };

        if let Some(existing) = self
            .chats
            .iter()
            .find(|c| c.username.as_deref() == Some(username))
            .cloned()
        {
            self.active_chat = Some(existing.id.clone());
            return Ok(Some(existing));
        }

        let chat = Chat {
            id: Uuid::new_v4().to_string(),
            kind: ChatKind::Direct,
            name: Some(username.to_string()),
            avatar: None,
            participants: vec![user.id.clone(), username.to_string()],
            last_message: None,
            is_archived: false,
            is_pinned: false,
            is_official: false,
            is_blocked: false,
            username: Some(username.to_string()),
            is_verified: false,
            unread_count: 0,
        };

        self.chats.push(chat.clone());
        self.active_chat = Some(chat.id.clone());
        self.persist()?;
        Ok(Some(chat))
    }

    pub fn archive_chat(&mut self, chat_id: &str) -> Result<()> {
        if let Some(chat) = self.chats.iter_mut().find(|c| c.id == chat_id) {
            chat.is_archived = !chat.is_archived;
        }
        self.persist()
    }

    /// The reserved chats stay pinned; toggling them is refused.
    pub fn pin_chat(&mut self, chat_id: &str) -> Result<()> {
        if chat_id == OFFICIAL_CHAT_ID || chat_id == SAVED_MESSAGES_ID {
            return Ok(());
        }
        if let Some(chat) = self.chats.iter_mut().find(|c| c.id == chat_id) {
            chat.is_pinned = !chat.is_pinned;
        }
        self.persist()
    }

    /// Only the official chat is unblockable.
    pub fn block_chat(&mut self, chat_id: &str) -> Result<()> {
        if chat_id == OFFICIAL_CHAT_ID {
            return Ok(());
        }
        if let Some(chat) = self.chats.iter_mut().find(|c| c.id == chat_id) {
            chat.is_blocked = !chat.is_blocked;
        }
        self.persist()
    }

    /// Removes the chat and its message list. Refused for the reserved
    /// chats; clears the active pointer if it pointed here.
    pub fn delete_chat(&mut self, chat_id: &str) -> Result<()> {
        if chat_id == OFFICIAL_CHAT_ID || chat_id == SAVED_MESSAGES_ID {
            return Ok(());
        }
        self.chats.retain(|c| c.id != chat_id);
        self.messages.remove(chat_id);
        if self.active_chat.as_deref() == Some(chat_id) {
            self.active_chat = None;
        }
        self.persist()
    }

    /// Case-insensitive substring match on username over the full identity
    /// directory as persisted, excluding the current identity. Reads
    /// storage directly rather than going through the session store.
    pub fn search_users(&self, query: &str) -> Result<Vec<UserSummary>> {
        let directory: Vec<User> = self.db.get_json(keys::SESSION_USERS)?.unwrap_or_default();
        let needle = query.to_lowercase();
        let current_id = self.user.as_ref().map(|u| u.id.clone());

        Ok(directory
            .iter()
            .filter(|u| {
                u.username.to_lowercase().contains(&needle)
                    && Some(&u.id) != current_id.as_ref()
            })
            .map(UserSummary::from)
            .collect())
    }

    fn persist(&self) -> Result<()> {
        let Some(user) = &self.user else {
            return Ok(());
        };
        self.db
            .put_json(&keys::conversations(&user.id), &self.chats)?;
        self.db.put_json(&keys::messages(&user.id), &self.messages)?;
        Ok(())
    }
}

fn saved_messages_chat(user: &User) -> Chat {
    Chat {
        id: SAVED_MESSAGES_ID.to_string(),
        kind: ChatKind::Saved,
        name: Some("Избранное".to_string()),
        avatar: None,
        participants: vec![user.id.clone()],
        last_message: None,
        is_archived: false,
        is_pinned: true,
        is_official: false,
        is_blocked: false,
        username: None,
        is_verified: false,
        unread_count: 0,
    }
}

fn official_chat(user: &User) -> Chat {
    Chat {
        id: OFFICIAL_CHAT_ID.to_string(),
        kind: ChatKind::Direct,
        name: Some("Spektr".to_string()),
        avatar: Some("/placeholder.svg".to_string()),
        participants: vec![user.id.clone(), ADMIN_ID.to_string()],
        last_message: None,
        is_archived: false,
        is_pinned: true,
        is_official: true,
        is_blocked: false,
        username: Some("spektr".to_string()),
        is_verified: true,
        unread_count: 0,
    }
}

fn welcome_message() -> Message {
    Message {
        id: WELCOME_MESSAGE_ID.to_string(),
        chat_id: OFFICIAL_CHAT_ID.to_string(),
        sender_id: ADMIN_ID.to_string(),
        content: WELCOME_TEXT.to_string(),
        kind: MessageKind::Text,
        media_url: None,
        reactions: Vec::new(),
        is_edited: false,
        is_deleted: false,
        created_at: seed_timestamp(),
        updated_at: seed_timestamp(),
    }
}
