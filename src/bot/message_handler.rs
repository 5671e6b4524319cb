//! Message Handler module for slash commands and free text

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info, warn};

// Import localization
use crate::localization::{t_args_lang, t_lang};

// Import dialogue types
use crate::dialogue::{validate_order_reference, validate_phone, validate_search_term, AiMode, BotDialogue, BotState};

use crate::admin::AdminChange;
use crate::audit::AuditCategory;
use crate::business::OrderStatus;
use crate::db;
use crate::reports::{self, esc};
use crate::services::{order_alerts, ReportKind};
use crate::state::AppState;

use super::callback_handler::{export_orders, perform_action, refresh_context, send_sales_chart};
use super::commands::{parse_set_status, parse_user_id, Command, Toggle};
use super::dialogue_manager::{handle_text_input, start_ai_chat};
use super::ui_builder::{menu_keyboard, MenuAction};
use super::views::{self, Screen};
use super::{register_activity, send_error, send_screen, Caller};

/// Entry point for every recognised slash command
pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    dialogue: BotDialogue,
    state: Arc<AppState>,
) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let caller = Caller::from_user(user, &state);
    info!(user_id = caller.id, command = ?cmd, "Received command");
    register_activity(&state, &caller).await;

    match run_command(&bot, msg.chat.id, &caller, cmd, &dialogue, &state).await {
        Ok(Some(screen)) => send_screen(&bot, msg.chat.id, screen).await?,
        Ok(None) => {}
        Err(e) => {
            error!(user_id = caller.id, error = %e, "Command failed");
            send_error(&bot, msg.chat.id, caller.lang()).await;
        }
    }
    Ok(())
}

/// Entry point for text that is not a command
pub async fn message_handler(bot: Bot, msg: Message, dialogue: BotDialogue, state: Arc<AppState>) -> Result<()> {
    let (Some(user), Some(text)) = (msg.from.as_ref(), msg.text()) else {
        return Ok(());
    };
    let caller = Caller::from_user(user, &state);
    debug!(user_id = caller.id, chars = text.chars().count(), "Received text message");
    register_activity(&state, &caller).await;

    if text.starts_with('/') {
        let screen = views::main_menu(caller.is_admin, caller.lang());
        send_screen(&bot, msg.chat.id, screen).await?;
        return Ok(());
    }

    match handle_text_input(&bot, msg.chat.id, &caller, text, &dialogue, &state).await {
        Ok(Some(screen)) => send_screen(&bot, msg.chat.id, screen).await?,
        Ok(None) => {}
        Err(e) => {
            error!(user_id = caller.id, error = %e, "Text handling failed");
            send_error(&bot, msg.chat.id, caller.lang()).await;
        }
    }
    Ok(())
}

async fn run_command(
    bot: &Bot,
    chat_id: ChatId,
    caller: &Caller,
    cmd: Command,
    dialogue: &BotDialogue,
    state: &AppState,
) -> Result<Option<Screen>> {
    let lang = caller.lang();

    if cmd.requires_admin() && !caller.is_admin {
        warn!(user_id = caller.id, command = ?cmd, "Non-admin ran an admin command");
        return Ok(Some(Screen::new(t_lang("error-admin-only", lang), menu_keyboard(false, lang))));
    }

    let screen = match cmd {
        Command::Start => {
            dialogue.update(BotState::Menu).await?;
            views::welcome(&caller.first_name, caller.is_admin, lang)
        }
        Command::Menu => {
            dialogue.update(BotState::Menu).await?;
            views::main_menu(caller.is_admin, lang)
        }
        Command::Help => views::help(caller.is_admin, lang),
        Command::Cancel => {
            dialogue.update(BotState::Menu).await?;
            state.sessions.clear_history(caller.id);
            Screen::new(t_lang("cancelled", lang), menu_keyboard(caller.is_admin, lang))
        }

        Command::Dashboard
        | Command::Orders
        | Command::Sales
        | Command::Inventory
        | Command::Analytics
        | Command::Coupons
        | Command::Users => {
            let action = match cmd {
                Command::Dashboard => MenuAction::AdminDashboard,
                Command::Orders => MenuAction::AdminOrders,
                Command::Sales => MenuAction::AdminSales,
                Command::Inventory => MenuAction::AdminInventory,
                Command::Analytics => MenuAction::AdminAnalytics,
                Command::Coupons => MenuAction::AdminCoupons,
                _ => MenuAction::AdminUsers,
            };
            return perform_action(bot, chat_id, caller, action, dialogue, state).await;
        }
        Command::Filter => views::filter_choice(lang),
        Command::Export => return export_orders(bot, chat_id, caller, state).await,
        Command::Chart => return send_sales_chart(bot, chat_id, state, lang).await,
        Command::Refresh => refresh_context(caller, state),
        Command::Status => views::bot_status(state, lang),

        Command::Products { term } => views::products(state, &term, lang).await?,
        Command::Coupon { args } => views::coupon_check(state, &args, lang).await?,
        Command::Customer { phone } => views::customer_profile(state, &phone, lang).await?,
        Command::Customers { kind } => views::customers(state, &kind, lang).await?,
        Command::Search { term } => {
            if term.trim().is_empty() {
                dialogue.update(BotState::AwaitingSearch).await?;
                views::prompt("prompt-search", lang)
            } else {
                match validate_search_term(&term) {
                    Ok(term) => views::search_results(state, &term, lang).await?,
                    Err("too_long") => views::prompt("error-search-too-long", lang),
                    Err(_) => views::prompt("error-search-too-short", lang),
                }
            }
        }
        Command::Track { query } => track(caller, &query, dialogue, state).await?,

        Command::Ai => {
            let mode = if caller.is_admin { AiMode::Analyst } else { AiMode::Customer };
            start_ai_chat(caller, mode, dialogue, state).await?
        }
        Command::About => views::about(lang),
        Command::Contact => views::contact(lang),
        Command::Policies => views::policies(lang),
        Command::Support => views::support(lang),
        Command::Size { args } => views::size(&args, lang),

        Command::Monitor { args } => monitor(caller, Toggle::parse(&args), state).await,
        Command::Alerts { args } => alerts(caller, Toggle::parse(&args), state),
        Command::Report { kind } => report(caller, &kind, state).await?,
        Command::Setstatus { args } => set_status(caller, &args, state).await?,

        Command::Admins => {
            let records = state.admins.list().await?;
            Screen::with_back(reports::admins_list(&records, state.admins.env_ids()), lang)
        }
        Command::Addadmin { user_id } => add_admin(caller, &user_id, state).await?,
        Command::Removeadmin { user_id } => remove_admin(caller, &user_id, state).await?,
        Command::Audit => Screen::with_back(state.audit.format_recent(state.utc_offset()), lang),
        Command::Broadcast => {
            dialogue.update(BotState::AwaitingBroadcast).await?;
            views::prompt("prompt-broadcast", lang)
        }
    };
    Ok(Some(screen))
}

/// `/track` with a phone number or order id looks it up directly
async fn track(caller: &Caller, query: &str, dialogue: &BotDialogue, state: &AppState) -> Result<Screen> {
    let lang = caller.lang();
    if query.trim().is_empty() {
        return Ok(views::track_choice(lang));
    }
    dialogue.update(BotState::Menu).await?;
    if let Ok(phone) = validate_phone(query) {
        return views::phone_lookup(state, &phone, lang).await;
    }
    match validate_order_reference(query) {
        Ok(reference) => views::order_lookup(state, &reference, lang).await,
        Err(_) => Ok(views::prompt("error-invalid-order-id", lang)),
    }
}

async fn monitor(caller: &Caller, toggle: Toggle, state: &AppState) -> Screen {
    let lang = caller.lang();
    let monitor = &state.monitor;
    let note = match toggle {
        Toggle::On => {
            monitor.start();
            audit_toggle(caller, state, AuditCategory::Monitor, "monitor_on");
            Some(t_lang("monitor-on", lang))
        }
        Toggle::Off => {
            monitor.stop();
            audit_toggle(caller, state, AuditCategory::Monitor, "monitor_off");
            Some(t_lang("monitor-off", lang))
        }
        Toggle::Show => {
            if monitor.recent_checks().is_empty() {
                monitor.check_now().await;
            }
            None
        }
    };
    with_note(note, monitor.format_status(), lang)
}

fn alerts(caller: &Caller, toggle: Toggle, state: &AppState) -> Screen {
    let lang = caller.lang();
    let note = match toggle {
        Toggle::On => {
            state.order_alerts.start();
            audit_toggle(caller, state, AuditCategory::Settings, "alerts_on");
            Some(t_lang("alerts-on", lang))
        }
        Toggle::Off => {
            state.order_alerts.stop();
            audit_toggle(caller, state, AuditCategory::Settings, "alerts_off");
            Some(t_lang("alerts-off", lang))
        }
        Toggle::Show => None,
    };
    let status = order_alerts::format_status(&state.order_alerts.status(), state.utc_offset());
    with_note(note, status, lang)
}

fn with_note(note: Option<String>, status: String, lang: Option<&str>) -> Screen {
    match note {
        Some(note) => Screen::with_back(format!("{note}\n\n{status}"), lang),
        None => Screen::with_back(status, lang),
    }
}

fn audit_toggle(caller: &Caller, state: &AppState, category: AuditCategory, action: &str) {
    state.audit.log(caller.id, &caller.display_name(), category, action, "", true);
}

async fn report(caller: &Caller, kind: &str, state: &AppState) -> Result<Screen> {
    let lang = caller.lang();
    let Some(kind) = ReportKind::parse(kind) else {
        return Ok(views::prompt("report-usage", lang));
    };

    let result = state.reports.send_now(kind).await;
    state.audit.log(
        caller.id,
        &caller.display_name(),
        AuditCategory::Report,
        &format!("{}_report", kind.name()),
        &match &result {
            Ok(delivery) => format!("{} admins reached", delivery.sent),
            Err(e) => e.to_string(),
        },
        result.is_ok(),
    );
    result?;
    Ok(Screen::with_back(
        t_args_lang("report-sent", &[("kind", kind.name())], lang),
        lang,
    ))
}

async fn set_status(caller: &Caller, args: &str, state: &AppState) -> Result<Screen> {
    let lang = caller.lang();
    let statuses = OrderStatus::ALL
        .iter()
        .map(|s| s.label().to_lowercase())
        .collect::<Vec<_>>()
        .join(", ");

    let Some((reference, raw_status)) = parse_set_status(args) else {
        return Ok(views::prompt_with("setstatus-usage", &[("statuses", &statuses)], lang));
    };
    let Some(status) = OrderStatus::parse(raw_status) else {
        return Ok(views::prompt_with("setstatus-bad-status", &[("statuses", &statuses)], lang));
    };
    let Some(order) = db::find_order(&state.pool, reference).await? else {
        return Ok(views::prompt_with("order-not-found", &[("query", &esc(reference))], lang));
    };

    let updated = db::update_order_status(&state.pool, order.id, status).await?;
    let previous = order.status();
    state.audit.log(
        caller.id,
        &caller.display_name(),
        AuditCategory::Order,
        "set_status",
        &format!("{} {} -> {}", order.display_id(), previous.label(), status.label()),
        updated,
    );
    if !updated {
        return Ok(views::prompt_with("order-not-found", &[("query", &esc(reference))], lang));
    }

    let label = format!("{} {}", status.emoji(), status.label());
    Ok(views::prompt_with(
        "setstatus-done",
        &[("order", &esc(&order.display_id())), ("status", &label)],
        lang,
    ))
}

async fn add_admin(caller: &Caller, raw_id: &str, state: &AppState) -> Result<Screen> {
    let lang = caller.lang();
    let Some(user_id) = parse_user_id(raw_id) else {
        return Ok(views::prompt("admin-usage-add", lang));
    };

    let change = state.admins.add(user_id, None, caller.id).await?;
    let id = user_id.to_string();
    state.audit.log(
        caller.id,
        &caller.display_name(),
        AuditCategory::Auth,
        "add_admin",
        &id,
        change == AdminChange::Added,
    );
    let key = match change {
        AdminChange::Added => "admin-added",
        _ => "admin-exists",
    };
    Ok(views::prompt_with(key, &[("id", &id)], lang))
}

async fn remove_admin(caller: &Caller, raw_id: &str, state: &AppState) -> Result<Screen> {
    let lang = caller.lang();
    let Some(user_id) = parse_user_id(raw_id) else {
        return Ok(views::prompt("admin-usage-remove", lang));
    };

    let change = state.admins.remove(user_id).await?;
    let id = user_id.to_string();
    state.audit.log(
        caller.id,
        &caller.display_name(),
        AuditCategory::Auth,
        "remove_admin",
        &format!("{id} ({change:?})"),
        change == AdminChange::Removed,
    );
    let key = match change {
        AdminChange::Removed => "admin-removed",
        _ => "admin-remove-failed",
    };
    Ok(views::prompt_with(key, &[("id", &id)], lang))
}

/// Commands to register with Telegram's command menu
pub fn command_list() -> Vec<teloxide::types::BotCommand> {
    Command::bot_commands()
}
