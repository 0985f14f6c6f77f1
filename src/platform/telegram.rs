use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, MessageEntityKind, ReplyParameters, User};
use teloxide::utils::command::BotCommands;
use tracing::{debug, info, warn};

use crate::bot::AppState;
use crate::config::TelegramConfig;
use crate::platform::{InboundEvent, Member};

/// Telegram rejects messages above 4096 chars; stay below it.
const MAX_MESSAGE_LEN: usize = 4000;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    #[command(description = "say hello")]
    Start,
    #[command(description = "show this message")]
    Help,
}

impl From<Command> for InboundEvent {
    fn from(cmd: Command) -> Self {
        match cmd {
            Command::Start => InboundEvent::Start,
            Command::Help => InboundEvent::Help,
        }
    }
}

fn member_from_user(user: &User) -> Member {
    Member {
        username: user.username.clone(),
        full_name: user.full_name(),
    }
}

/// A message is a command when its first entity is a bot command at offset 0.
fn is_command(msg: &Message) -> bool {
    msg.entities()
        .and_then(|entities| entities.first())
        .map_or(false, |entity| {
            matches!(entity.kind, MessageEntityKind::BotCommand) && entity.offset == 0
        })
}

/// Text of a message that is not a command
fn plain_text(msg: Message) -> Option<String> {
    if is_command(&msg) {
        return None;
    }
    msg.text().map(ToOwned::to_owned)
}

fn new_members(msg: Message) -> Option<Vec<User>> {
    msg.new_chat_members().map(<[User]>::to_vec)
}

/// Split long messages for Telegram's 4096 char limit
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Walk back to a valid UTF-8 char boundary so slicing doesn't panic
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}

pub fn build_bot(config: &TelegramConfig) -> Result<Bot> {
    let bot = Bot::new(&config.bot_token);
    match &config.api_url {
        Some(api_url) => {
            let url = reqwest::Url::parse(api_url)
                .with_context(|| format!("Invalid Telegram API URL: {}", api_url))?;
            Ok(bot.set_api_url(url))
        }
        None => Ok(bot),
    }
}

fn schema() -> UpdateHandler<anyhow::Error> {
    Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(dptree::filter_map(plain_text).endpoint(handle_text))
        .branch(dptree::filter_map(new_members).endpoint(handle_new_members))
}

/// Run the Telegram bot platform
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let bot = build_bot(&state.config.telegram)?;

    info!("Starting Telegram platform...");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<AppState>,
) -> Result<()> {
    debug!("Command {:?} in chat {}", cmd, msg.chat.id.0);

    let replies = state.handle_event(cmd.into()).await?;
    deliver(&bot, &msg, &replies).await
}

async fn handle_text(bot: Bot, msg: Message, text: String, state: Arc<AppState>) -> Result<()> {
    let sender = msg.from.as_ref().map(|user| user.id.0);
    info!(
        "Telegram message in chat {} from {:?}: {}",
        msg.chat.id.0, sender, text
    );

    bot.send_chat_action(msg.chat.id, ChatAction::Typing)
        .await
        .ok();

    let replies = state.handle_event(InboundEvent::Text(text)).await?;
    deliver(&bot, &msg, &replies).await
}

async fn handle_new_members(
    bot: Bot,
    msg: Message,
    users: Vec<User>,
    state: Arc<AppState>,
) -> Result<()> {
    let members = users.iter().map(member_from_user).collect();

    let replies = state
        .handle_event(InboundEvent::MembersJoined(members))
        .await?;
    deliver(&bot, &msg, &replies).await
}

/// Send replies to the chat `msg` came from. In groups they quote `msg`.
async fn deliver(bot: &Bot, msg: &Message, replies: &[String]) -> Result<()> {
    for reply in replies {
        for chunk in split_message(reply, MAX_MESSAGE_LEN) {
            let mut request = bot.send_message(msg.chat.id, chunk);
            if !msg.chat.is_private() {
                request = request.reply_parameters(ReplyParameters::new(msg.id));
            }
            request
                .await
                .context("Failed to send Telegram message")?;
        }
    }
    Ok(())
}
