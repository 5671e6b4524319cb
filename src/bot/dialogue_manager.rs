//! Dialogue Manager module for handling input in each dialogue state

use anyhow::Result;
use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::ChatAction;
use tracing::{debug, info, warn};

// Import localization
use crate::localization::{t_args_lang, t_lang};

// Import dialogue types
use crate::dialogue::{
    detect_order_inquiry, validate_order_reference, validate_phone, validate_search_term, AiMode, BotDialogue,
    BotState, OrderInquiry,
};

use crate::audit::AuditCategory;
use crate::db;
use crate::gemini;
use crate::reports::esc;
use crate::services::notifier;
use crate::session::HISTORY_IN_PROMPT;
use crate::state::AppState;

use super::ui_builder::{ai_chat_keyboard, menu_keyboard, track_keyboard};
use super::views::{self, Screen};
use super::Caller;

/// Enter AI chat, or explain why the assistant is unavailable
pub async fn start_ai_chat(caller: &Caller, mode: AiMode, dialogue: &BotDialogue, state: &AppState) -> Result<Screen> {
    let lang = caller.lang();
    if !state.gemini.is_enabled() {
        return Ok(Screen::with_back(t_lang("ai-disabled", lang), lang));
    }

    let mode = effective_mode(mode, caller.is_admin);
    dialogue.update(BotState::AiChat { mode }).await?;
    state.sessions.clear_history(caller.id);
    info!(user_id = caller.id, role = mode.role(), "AI chat started");

    let key = match mode {
        AiMode::Analyst => "ai-chat-start-admin",
        AiMode::Customer => "ai-chat-start-user",
    };
    Ok(Screen::new(t_lang(key, lang), ai_chat_keyboard(lang)))
}

/// Only admins get the analyst persona
pub fn effective_mode(requested: AiMode, is_admin: bool) -> AiMode {
    match requested {
        AiMode::Analyst if is_admin => AiMode::Analyst,
        _ => AiMode::Customer,
    }
}

/// Route free text according to the dialogue state. Returns the screen to send,
/// or `None` when the reply has already gone out.
pub async fn handle_text_input(
    bot: &Bot,
    chat_id: ChatId,
    caller: &Caller,
    text: &str,
    dialogue: &BotDialogue,
    state: &AppState,
) -> Result<Option<Screen>> {
    let current = dialogue.get().await?.unwrap_or_default();
    debug!(user_id = caller.id, state = ?current, "Routing text message");

    let screen = match current {
        BotState::Menu => handle_menu_text(caller, text, state).await?,
        BotState::AwaitingOrderId => handle_order_id_input(caller, text, dialogue, state).await?,
        BotState::AwaitingPhone => handle_phone_input(caller, text, dialogue, state).await?,
        BotState::AwaitingSearch => handle_search_input(caller, text, dialogue, state).await?,
        BotState::AwaitingBroadcast => handle_broadcast_input(bot, caller, text, dialogue, state).await?,
        BotState::AiChat { mode } => {
            handle_ai_message(bot, chat_id, caller, mode, text, state).await?;
            return Ok(None);
        }
    };
    Ok(Some(screen))
}

/// Free text outside any flow: answer order questions, otherwise show the menu
pub async fn handle_menu_text(caller: &Caller, text: &str, state: &AppState) -> Result<Screen> {
    let lang = caller.lang();
    match detect_order_inquiry(text) {
        Some(OrderInquiry::Phone(phone)) => {
            info!(user_id = caller.id, "Order inquiry by phone");
            views::latest_order_by_phone(state, &phone, lang).await
        }
        Some(OrderInquiry::OrderNumber(number)) => {
            info!(user_id = caller.id, order = number, "Order inquiry by number");
            views::order_lookup(state, &number.to_string(), lang).await
        }
        Some(OrderInquiry::NeedsDetails) => Ok(Screen::new(t_lang("track-needs-details", lang), track_keyboard(lang))),
        None => Ok(views::main_menu(caller.is_admin, lang)),
    }
}

pub async fn handle_order_id_input(
    caller: &Caller,
    text: &str,
    dialogue: &BotDialogue,
    state: &AppState,
) -> Result<Screen> {
    let lang = caller.lang();
    match validate_order_reference(text) {
        Ok(reference) => {
            dialogue.update(BotState::Menu).await?;
            views::order_lookup(state, &reference, lang).await
        }
        Err(reason) => {
            debug!(user_id = caller.id, reason, "Rejected order id input");
            Ok(views::prompt("error-invalid-order-id", lang))
        }
    }
}

pub async fn handle_phone_input(
    caller: &Caller,
    text: &str,
    dialogue: &BotDialogue,
    state: &AppState,
) -> Result<Screen> {
    let lang = caller.lang();
    match validate_phone(text) {
        Ok(phone) => {
            dialogue.update(BotState::Menu).await?;
            views::phone_lookup(state, &phone, lang).await
        }
        Err(reason) => {
            debug!(user_id = caller.id, reason, "Rejected phone input");
            Ok(views::prompt("error-invalid-phone", lang))
        }
    }
}

pub async fn handle_search_input(
    caller: &Caller,
    text: &str,
    dialogue: &BotDialogue,
    state: &AppState,
) -> Result<Screen> {
    let lang = caller.lang();
    if !caller.is_admin {
        dialogue.update(BotState::Menu).await?;
        return Ok(Screen::new(t_lang("error-admin-only", lang), menu_keyboard(false, lang)));
    }

    match validate_search_term(text) {
        Ok(term) => {
            dialogue.update(BotState::Menu).await?;
            views::search_results(state, &term, lang).await
        }
        Err("too_long") => Ok(views::prompt("error-search-too-long", lang)),
        Err(_) => Ok(views::prompt("error-search-too-short", lang)),
    }
}

pub async fn handle_broadcast_input(
    bot: &Bot,
    caller: &Caller,
    text: &str,
    dialogue: &BotDialogue,
    state: &AppState,
) -> Result<Screen> {
    let lang = caller.lang();
    dialogue.update(BotState::Menu).await?;
    if !caller.is_admin {
        return Ok(Screen::new(t_lang("error-admin-only", lang), menu_keyboard(false, lang)));
    }

    let user_ids = db::get_all_user_ids(&state.pool).await?;
    info!(user_id = caller.id, recipients = user_ids.len(), "Starting broadcast");
    let delivery = notifier::broadcast(bot, &user_ids, &esc(text.trim())).await;

    state.audit.log(
        caller.id,
        &caller.display_name(),
        AuditCategory::Broadcast,
        "broadcast",
        &format!(
            "{} sent, {} failed, {} blocked",
            delivery.sent, delivery.failed, delivery.blocked
        ),
        delivery.sent > 0 || user_ids.is_empty(),
    );

    let failed = (delivery.failed + delivery.blocked).to_string();
    Ok(Screen::new(
        t_args_lang(
            "broadcast-done",
            &[("sent", &delivery.sent.to_string()), ("failed", &failed)],
            lang,
        ),
        menu_keyboard(true, lang),
    ))
}

/// One AI turn: live context, recent history and the new message go to Gemini
pub async fn handle_ai_message(
    bot: &Bot,
    chat_id: ChatId,
    caller: &Caller,
    mode: AiMode,
    text: &str,
    state: &AppState,
) -> Result<()> {
    let lang = caller.lang();
    if !state.gemini.is_enabled() {
        bot.send_message(chat_id, t_lang("ai-disabled", lang)).await?;
        return Ok(());
    }

    if let Err(e) = bot.send_chat_action(chat_id, ChatAction::Typing).await {
        debug!(chat_id = %chat_id, error = %e, "Failed to send typing action");
    }

    let mode = effective_mode(mode, caller.is_admin);
    let context = state.context.full_context(mode).await;
    let history = state.sessions.history_context(caller.id, HISTORY_IN_PROMPT);
    let prompt = gemini::build_prompt(&context, &history, text);
    debug!(user_id = caller.id, role = mode.role(), prompt_chars = prompt.len(), "Sending AI prompt");

    match state.gemini.generate(&prompt).await {
        Ok(reply) => {
            state.sessions.record_exchange(caller.id, text, &reply, Utc::now());
            bot.send_message(chat_id, reply).reply_markup(ai_chat_keyboard(lang)).await?;
        }
        Err(e) => {
            warn!(user_id = caller.id, error = %e, "AI reply failed");
            bot.send_message(chat_id, t_lang("ai-error", lang))
                .reply_markup(ai_chat_keyboard(lang))
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_admins_get_analyst() {
        assert_eq!(effective_mode(AiMode::Analyst, true), AiMode::Analyst);
        assert_eq!(effective_mode(AiMode::Analyst, false), AiMode::Customer);
        assert_eq!(effective_mode(AiMode::Customer, true), AiMode::Customer);
    }
}
