pub mod models;

pub use models::{
    Chat, ChatKind, Language, Message, MessageKind, ProfileUpdate, Reaction, ReactionEmoji, Theme,
    User, UserSummary,
};
