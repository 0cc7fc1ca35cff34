//! Conversation listing and management commands

use chrono::{DateTime, NaiveDateTime};
use std::error::Error;

use crate::api::Chat;
use crate::cli::CliContext;
use crate::core::message::Message;

/// Renders a backend timestamp for listings; unknown formats pass through.
pub fn format_timestamp(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.format("%Y-%m-%d %H:%M").to_string();
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return parsed.format("%Y-%m-%d %H:%M").to_string();
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return parsed.format("%Y-%m-%d %H:%M").to_string();
    }
    raw.to_string()
}

pub fn format_chat_line(chat: &Chat) -> String {
    let when = chat
        .updated_at
        .as_deref()
        .or(chat.created_at.as_deref())
        .filter(|value| !value.trim().is_empty())
        .map(format_timestamp);
    match when {
        Some(when) => format!("{}  {}  ({when})", chat.id, chat.display_title()),
        None => format!("{}  {}", chat.id, chat.display_title()),
    }
}

pub fn format_transcript_line(message: &Message) -> String {
    format!("{}: {}", message.role.label(), message.content)
}

pub async fn list_chats(ctx: &mut CliContext) -> Result<(), Box<dyn Error>> {
    let chats = ctx.client.list_chats(&ctx.session).await?;
    ctx.store.replace_chats(chats);

    if ctx.store.is_empty() {
        println!("No conversations yet. Start one with 'streamchat new'.");
        return Ok(());
    }

    println!("💬 Conversations ({})", ctx.store.len());
    println!();
    for chat in ctx.store.chats() {
        println!("  {}", format_chat_line(chat));
    }
    Ok(())
}

pub async fn create_chat(ctx: &mut CliContext) -> Result<(), Box<dyn Error>> {
    let chat = ctx.client.create_chat(&ctx.session).await?;
    println!("✅ Created conversation {}", chat.id);
    ctx.store.add_chat(chat);
    Ok(())
}

pub async fn show_history(ctx: &mut CliContext, chat_id: &str) -> Result<(), Box<dyn Error>> {
    let history = ctx.client.chat_messages(&ctx.session, chat_id).await?;
    ctx.store.ensure_chat(chat_id);
    ctx.store.set_history(chat_id, history);

    let transcript = ctx
        .store
        .entry(chat_id)
        .map(|entry| entry.transcript.as_slice())
        .unwrap_or_default();

    if transcript.is_empty() {
        println!("No messages in {chat_id} yet.");
    }
    for message in transcript {
        println!("{}", format_transcript_line(message));
        println!();
    }
    ctx.logging.rewrite_transcript(transcript)?;
    Ok(())
}

pub async fn rename_chat(
    ctx: &mut CliContext,
    chat_id: &str,
    title: &str,
) -> Result<(), Box<dyn Error>> {
    let title = title.trim();
    if title.is_empty() {
        return Err("A title is required".into());
    }
    ctx.client.rename_chat(&ctx.session, chat_id, title).await?;
    ctx.store.ensure_chat(chat_id);
    ctx.store.rename(chat_id, title);
    println!("✅ Renamed {chat_id} to: {title}");
    Ok(())
}
