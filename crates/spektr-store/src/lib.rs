pub mod chat;
pub mod session;

pub use chat::{ConversationStore, OFFICIAL_CHAT_ID, SAVED_MESSAGES_ID};
pub use session::{ADMIN_ID, SessionStore};
