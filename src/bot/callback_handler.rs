//! Callback Handler module for processing inline keyboard callback queries

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, InputFile, ParseMode};
use tracing::{debug, error, info, warn};

// Import localization
use crate::localization::{t_args_lang, t_lang};

// Import dialogue types
use crate::dialogue::{AiMode, BotDialogue, BotState};

use crate::audit::AuditCategory;
use crate::chart;
use crate::db;
use crate::export;
use crate::state::AppState;

use super::dialogue_manager::start_ai_chat;
use super::ui_builder::{menu_keyboard, MenuAction};
use super::views::{self, Screen};
use super::{edit_screen, register_activity, send_error, Caller};

/// Upper bound on exported rows
pub const EXPORT_LIMIT: i64 = 5000;

/// Handle callback queries from inline keyboards
pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    dialogue: BotDialogue,
    state: Arc<AppState>,
) -> Result<()> {
    let caller = Caller::from_user(&q.from, &state);
    let data = q.data.as_deref().unwrap_or("");
    debug!(user_id = caller.id, data = %data, "Received callback query from user");
    register_activity(&state, &caller).await;

    let Some(action) = MenuAction::parse(data) else {
        info!(user_id = caller.id, data = %data, "Unknown callback data");
        bot.answer_callback_query(q.id.clone())
            .text(t_lang("coming-soon", caller.lang()))
            .show_alert(true)
            .await?;
        return Ok(());
    };

    bot.answer_callback_query(q.id.clone()).await?;

    let Some(message) = q.message.as_ref() else {
        warn!(user_id = caller.id, "Callback without an attached message");
        return Ok(());
    };
    let chat_id = message.chat().id;

    match perform_action(&bot, chat_id, &caller, action, &dialogue, &state).await {
        Ok(Some(screen)) => edit_screen(&bot, chat_id, message.id(), screen).await?,
        Ok(None) => {}
        Err(e) => {
            error!(user_id = caller.id, action = ?action, error = %e, "Menu action failed");
            send_error(&bot, chat_id, caller.lang()).await;
        }
    }
    Ok(())
}

/// Run a menu action; `None` means the reply was already sent as a file
pub async fn perform_action(
    bot: &Bot,
    chat_id: ChatId,
    caller: &Caller,
    action: MenuAction,
    dialogue: &BotDialogue,
    state: &AppState,
) -> Result<Option<Screen>> {
    let lang = caller.lang();

    if action.requires_admin() && !caller.is_admin {
        warn!(user_id = caller.id, action = ?action, "Non-admin requested an admin view");
        return Ok(Some(Screen::new(
            t_lang("error-admin-only", lang),
            menu_keyboard(false, lang),
        )));
    }

    let screen = match action {
        MenuAction::AdminDashboard => views::dashboard(state, lang).await?,
        MenuAction::AdminOrders => views::recent_orders(state, lang).await?,
        MenuAction::AdminSales => views::sales(state, lang).await?,
        MenuAction::AdminInventory => views::inventory(state, lang).await?,
        MenuAction::AdminAnalytics => views::analytics(state, lang).await?,
        MenuAction::AdminUsers => views::users(state, lang).await?,
        MenuAction::AdminCoupons => views::coupons(state, lang).await?,
        MenuAction::AdminProducts | MenuAction::UserProducts => views::products(state, "", lang).await?,
        MenuAction::AdminSearch => {
            dialogue.update(BotState::AwaitingSearch).await?;
            views::prompt("prompt-search", lang)
        }
        MenuAction::AdminFilter => views::filter_choice(lang),
        MenuAction::Filter(status) => views::filtered_orders(state, status, lang).await?,
        MenuAction::AdminExport => return export_orders(bot, chat_id, caller, state).await,
        MenuAction::AdminChart => return send_sales_chart(bot, chat_id, state, lang).await,
        MenuAction::AdminAi => start_ai_chat(caller, AiMode::Analyst, dialogue, state).await?,
        MenuAction::UserAiChat => start_ai_chat(caller, AiMode::Customer, dialogue, state).await?,
        MenuAction::UserTrackOrder => views::track_choice(lang),
        MenuAction::TrackByPhone => {
            dialogue.update(BotState::AwaitingPhone).await?;
            views::prompt("prompt-phone", lang)
        }
        MenuAction::TrackById => {
            dialogue.update(BotState::AwaitingOrderId).await?;
            views::prompt("prompt-order-id", lang)
        }
        MenuAction::UserAbout => views::about(lang),
        MenuAction::UserContact => views::contact(lang),
        MenuAction::UserSupport => views::support(lang),
        MenuAction::UserPolicies => views::policies(lang),
        MenuAction::BackMenu => {
            if matches!(dialogue.get().await?, Some(BotState::AiChat { .. })) {
                state.sessions.clear_history(caller.id);
            }
            dialogue.update(BotState::Menu).await?;
            views::main_menu(caller.is_admin, lang)
        }
        MenuAction::RefreshData => refresh_context(caller, state),
    };
    Ok(Some(screen))
}

/// Drop every cached context block so the next AI request reloads live data
pub fn refresh_context(caller: &Caller, state: &AppState) -> Screen {
    let cleared = state.context.clear();
    info!(user_id = caller.id, cleared, "Context cache cleared");
    state.audit.log(
        caller.id,
        &caller.display_name(),
        AuditCategory::Settings,
        "refresh_cache",
        &format!("{cleared} entries cleared"),
        true,
    );
    Screen::new(
        t_args_lang("refresh-done", &[("entries", &cleared.to_string())], caller.lang()),
        menu_keyboard(true, caller.lang()),
    )
}

pub async fn export_orders(bot: &Bot, chat_id: ChatId, caller: &Caller, state: &AppState) -> Result<Option<Screen>> {
    let lang = caller.lang();
    let orders = db::get_all_orders(&state.pool, EXPORT_LIMIT).await?;
    if orders.is_empty() {
        return Ok(Some(Screen::with_back(t_lang("export-empty", lang), lang)));
    }

    let now = Utc::now();
    let csv = export::orders_csv(&orders, state.utc_offset());
    let file_name = export::export_file_name(now);
    bot.send_document(chat_id, InputFile::memory(csv).file_name(file_name.clone()))
        .caption(t_args_lang("export-caption", &[("count", &orders.len().to_string())], lang))
        .parse_mode(ParseMode::Html)
        .await?;

    info!(user_id = caller.id, rows = orders.len(), file = %file_name, "Orders exported");
    state.audit.log(
        caller.id,
        &caller.display_name(),
        AuditCategory::Export,
        "export_orders",
        &format!("{} orders to {file_name}", orders.len()),
        true,
    );
    Ok(None)
}

pub async fn send_sales_chart(
    bot: &Bot,
    chat_id: ChatId,
    state: &AppState,
    language_code: Option<&str>,
) -> Result<Option<Screen>> {
    let since = Utc::now() - chrono::Duration::days(7);
    let days = db::get_daily_sales(&state.pool, since, state.utc_offset()).await?;
    match chart::sales_chart_png(&days)? {
        Some(png) => {
            bot.send_photo(chat_id, InputFile::memory(png).file_name("sales_chart.png"))
                .caption(t_lang("chart-caption", language_code))
                .await?;
            Ok(None)
        }
        None => Ok(Some(Screen::with_back(
            t_lang("chart-not-enough-data", language_code),
            language_code,
        ))),
    }
}
