use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use tracing::info;

use spektr_db::Database;
use spektr_store::{ConversationStore, SessionStore};
use spektr_types::{Chat, Language, MessageKind, ProfileUpdate, ReactionEmoji, Theme};

/// Line shell driving the session and conversation stores. This is the
/// stand-in for the UI layer: it parses commands and prints state, nothing
/// more. Stores are constructed once, in dependency order, and passed by
/// reference from here on.
fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spektr=info".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("SPEKTR_DB_PATH").unwrap_or_else(|_| "spektr.db".into());

    let db = Arc::new(Database::open(&PathBuf::from(&db_path))?);
    let mut session = SessionStore::new(db.clone())?;
    let mut conversations = ConversationStore::new(db);

    if let Some(user) = session.current_user().cloned() {
        conversations.activate(&user)?;
        println!("signed in as @{}", user.username);
    }
    if let Some(class) = session.theme().css_class() {
        println!("theme class: {class}");
    }

    info!("spektr shell ready");

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }
        if let Err(e) = handle(line, &mut session, &mut conversations) {
            eprintln!("error: {e:#}");
        }
    }
    Ok(())
}

fn handle(
    line: &str,
    session: &mut SessionStore,
    conversations: &mut ConversationStore,
) -> Result<()> {
    let mut parts = line.splitn(2, ' ');
    let command = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or_default().trim();

    match command {
        "help" => print_help(),

        "register" => {
            let args: Vec<&str> = rest.split_whitespace().collect();
            let [email, username, display_name, password] = args.as_slice() else {
                bail!("usage: register <email> <username> <display-name> <password>");
            };
            if session.register(email, username, display_name, password, true)? {
                if let Some(user) = session.current_user().cloned() {
                    conversations.activate(&user)?;
                }
                println!("registered @{username}");
            } else {
                println!("username taken");
            }
        }

        "login" => {
            let args: Vec<&str> = rest.split_whitespace().collect();
            let [username, password] = args.as_slice() else {
                bail!("usage: login <username> <password>");
            };
            if session.login(username, password, true)? {
                if let Some(user) = session.current_user().cloned() {
                    conversations.activate(&user)?;
                }
                println!("signed in as @{username}");
            } else {
                println!("invalid credentials");
            }
        }

        "logout" => {
            session.logout()?;
            conversations.deactivate();
            println!("signed out");
        }

        "chats" => {
            for chat in conversations.chats() {
                print_chat(chat);
            }
        }

        "open" => {
            let Some(chat) = conversations.chat(rest).cloned() else {
                bail!("no chat with id {rest}");
            };
            conversations.set_active_chat(Some(chat.id.clone()));
            for msg in conversations.messages(&chat.id) {
                let reactions: Vec<&str> =
                    msg.reactions.iter().map(|r| r.emoji.as_str()).collect();
                println!(
                    "[{}] {}: {}{}{}",
                    msg.created_at.format("%H:%M"),
                    msg.sender_id,
                    msg.content,
                    if msg.is_edited { " (edited)" } else { "" },
                    if reactions.is_empty() {
                        String::new()
                    } else {
                        format!(" {}", reactions.join(""))
                    },
                );
            }
        }

        "send" => {
            let Some(chat_id) = conversations.active_chat().map(str::to_string) else {
                bail!("open a chat first");
            };
            conversations.send_message(&chat_id, rest, MessageKind::Text, None)?;
        }

        "msg" => {
            match conversations.create_chat(rest)? {
                Some(chat) => println!("opened chat {} with @{rest}", chat.id),
                None => println!("sign in first"),
            }
        }

        "edit" => {
            let (id, text) = split_arg(rest, "usage: edit <message-id> <text>")?;
            conversations.edit_message(id, text)?;
        }

        "delete" => conversations.delete_message(rest)?,

        "react" => {
            let (id, emoji) = split_arg(rest, "usage: react <message-id> <heart|up|down>")?;
            let emoji = match emoji {
                "heart" => ReactionEmoji::Heart,
                "up" => ReactionEmoji::ThumbsUp,
                "down" => ReactionEmoji::ThumbsDown,
                other => bail!("unknown reaction {other}"),
            };
            conversations.add_reaction(id, emoji)?;
        }

        "pin" => conversations.pin_chat(rest)?,
        "archive" => conversations.archive_chat(rest)?,
        "block" => conversations.block_chat(rest)?,
        "delete-chat" => conversations.delete_chat(rest)?,

        "search" => {
            for hit in conversations.search_users(rest)? {
                println!(
                    "@{}  {}{}",
                    hit.username,
                    hit.display_name,
                    if hit.is_verified { " ✓" } else { "" }
                );
            }
        }

        "name" => session.update_profile(ProfileUpdate {
            display_name: Some(rest.to_string()),
            ..Default::default()
        })?,

        "bio" => session.update_profile(ProfileUpdate {
            bio: Some(rest.to_string()),
            ..Default::default()
        })?,

        "theme" => {
            let theme: Theme = serde_json::from_value(serde_json::Value::String(rest.into()))
                .map_err(|_| anyhow::anyhow!("unknown theme {rest}"))?;
            session.set_theme(theme)?;
            match theme.css_class() {
                Some(class) => println!("theme class: {class}"),
                None => println!("default theme"),
            }
        }

        "language" => {
            let language: Language =
                serde_json::from_value(serde_json::Value::String(rest.into()))
                    .map_err(|_| anyhow::anyhow!("unknown language {rest}"))?;
            session.set_language(language)?;
        }

        other => bail!("unknown command {other} (try help)"),
    }
    Ok(())
}

fn split_arg<'a>(rest: &'a str, usage: &str) -> Result<(&'a str, &'a str)> {
    let mut parts = rest.splitn(2, ' ');
    match (parts.next(), parts.next()) {
        (Some(first), Some(second)) if !first.is_empty() => Ok((first, second.trim())),
        _ => bail!("{usage}"),
    }
}

fn print_chat(chat: &Chat) {
    let mut flags = String::new();
    if chat.is_pinned {
        flags.push_str(" [pinned]");
    }
    if chat.is_archived {
        flags.push_str(" [archived]");
    }
    if chat.is_blocked {
        flags.push_str(" [blocked]");
    }
    let last = chat
        .last_message
        .as_ref()
        .map(|m| m.content.as_str())
        .unwrap_or("");
    println!(
        "{}  {} ({} unread){}  {}",
        chat.id,
        chat.name.as_deref().unwrap_or("(unnamed)"),
        chat.unread_count,
        flags,
        last,
    );
}

fn print_help() {
    println!(
        "commands:
  register <email> <username> <display-name> <password>
  login <username> <password> | logout
  chats | open <chat-id> | send <text> | msg <username>
  edit <message-id> <text> | delete <message-id> | react <message-id> <heart|up|down>
  pin | archive | block | delete-chat <chat-id>
  search <query> | name <display-name> | bio <text>
  theme <crystal|purple-lime|dark-blue|white-black|blue-light> | language <ru|en>
  quit"
    );
}
