//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `commands`: slash command definitions and argument parsing
//! - `message_handler`: slash commands and free text routed by dialogue state
//! - `callback_handler`: inline keyboard callback queries
//! - `dialogue_manager`: input handling for each dialogue state and AI chat
//! - `ui_builder`: keyboards and typed callback data
//! - `views`: screens rendered from live data or static policy

pub mod callback_handler;
pub mod commands;
pub mod dialogue_manager;
pub mod message_handler;
pub mod ui_builder;
pub mod views;

use anyhow::Result;
use chrono::Utc;
use teloxide::{
    dispatching::{dialogue, dialogue::InMemStorage, UpdateHandler},
    prelude::*,
    types::{MessageId, ParseMode, User},
    ApiError, RequestError,
};
use tracing::{debug, warn};

use crate::business::CONTACT;
use crate::db;
use crate::dialogue::BotState;
use crate::localization::t_args_lang;
use crate::state::AppState;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use commands::Command;
pub use message_handler::{command_handler, message_handler};
pub use ui_builder::MenuAction;
pub use views::Screen;

/// Dispatcher tree: commands first, then free text, then button presses
pub fn schema() -> UpdateHandler<anyhow::Error> {
    let command_branch = teloxide::filter_command::<Command, _>().endpoint(command_handler);

    let message_branch = Update::filter_message()
        .branch(command_branch)
        .branch(dptree::filter(|msg: Message| msg.text().is_some()).endpoint(message_handler));

    let callback_branch = Update::filter_callback_query().endpoint(callback_handler);

    dialogue::enter::<Update, InMemStorage<BotState>, BotState, _>()
        .branch(message_branch)
        .branch(callback_branch)
}

/// The Telegram user behind an update, with their role resolved
#[derive(Debug, Clone)]
pub struct Caller {
    pub id: u64,
    pub username: Option<String>,
    pub first_name: String,
    pub language_code: Option<String>,
    pub is_admin: bool,
}

impl Caller {
    pub fn from_user(user: &User, state: &AppState) -> Self {
        Self {
            id: user.id.0,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            language_code: user.language_code.clone(),
            is_admin: state.is_admin(user.id.0),
        }
    }

    pub fn lang(&self) -> Option<&str> {
        self.language_code.as_deref()
    }

    /// `@username` when set, otherwise the first name
    pub fn display_name(&self) -> String {
        match self.username.as_deref() {
            Some(username) => format!("@{username}"),
            None => self.first_name.clone(),
        }
    }
}

/// Record activity in the session registry and the users table
pub async fn register_activity(state: &AppState, caller: &Caller) {
    state.sessions.touch(
        caller.id,
        caller.username.as_deref(),
        Some(&caller.first_name),
        caller.is_admin,
        Utc::now(),
    );
    let Ok(user_id) = i64::try_from(caller.id) else {
        warn!(user_id = caller.id, "User id does not fit the users table");
        return;
    };
    if let Err(e) = db::save_user(
        &state.pool,
        user_id,
        caller.username.as_deref(),
        Some(&caller.first_name),
    )
    .await
    {
        warn!(user_id = caller.id, error = %e, "Failed to save user");
    }
}

pub async fn send_screen(bot: &Bot, chat_id: ChatId, screen: Screen) -> Result<()> {
    bot.send_message(chat_id, screen.text)
        .parse_mode(ParseMode::Html)
        .reply_markup(screen.keyboard)
        .await?;
    Ok(())
}

/// Replace the text and keyboard of an earlier bot message
pub async fn edit_screen(bot: &Bot, chat_id: ChatId, message_id: MessageId, screen: Screen) -> Result<()> {
    match bot
        .edit_message_text(chat_id, message_id, screen.text)
        .parse_mode(ParseMode::Html)
        .reply_markup(screen.keyboard)
        .await
    {
        Ok(_) => Ok(()),
        Err(RequestError::Api(ApiError::MessageNotModified)) => {
            debug!(chat_id = %chat_id, "Message unchanged, skipping edit");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Generic apology with the support phone number
pub async fn send_error(bot: &Bot, chat_id: ChatId, language_code: Option<&str>) {
    let text = t_args_lang("error-generic", &[("phone", CONTACT.phone)], language_code);
    if let Err(e) = bot.send_message(chat_id, text).await {
        warn!(chat_id = %chat_id, error = %e, "Failed to send error message");
    }
}
