//! Screens rendered by commands and menu buttons
//!
//! Every view produces a [`Screen`]; commands send it as a new message while
//! callbacks edit the message that carried the button.

use std::fmt::Write as _;

use anyhow::Result;
use chrono::Utc;
use teloxide::types::InlineKeyboardMarkup;

use crate::business::{
    self, OrderStatus, BRAND_NAME, CLOSED_DAY, CONTACT, DEFECTIVE_NOTE, EXCHANGE_WINDOW_DAYS, INSIDE_DHAKA,
    OPEN_DAYS, OPEN_HOURS, OUTSIDE_DHAKA, PAYMENT_METHODS, RESPONSE_TIMES, RETURN_CONDITIONS, SALE_ITEMS_NOTE,
    SIZE_EXCHANGE_NOTE, SIZE_GUIDE,
};
use crate::crm::{self, INACTIVE_AFTER_DAYS};
use crate::db;
use crate::dialogue::validate_phone;
use crate::localization::{t_args_lang, t_lang};
use crate::reports::{self, esc, RULE};
use crate::services::order_alerts;
use crate::state::AppState;

use super::commands::{parse_coupon_check, CustomerList};
use super::ui_builder::{
    back_keyboard, data_keyboard, filter_keyboard, menu_keyboard, support_keyboard, track_keyboard, MenuAction,
};

/// Rows shown on list screens
pub const LIST_LIMIT: i64 = 10;
pub const PHONE_LOOKUP_LIMIT: i64 = 5;

/// Rendered text (HTML) plus the inline keyboard shown under it
#[derive(Debug, Clone)]
pub struct Screen {
    pub text: String,
    pub keyboard: InlineKeyboardMarkup,
}

impl Screen {
    pub fn new(text: impl Into<String>, keyboard: InlineKeyboardMarkup) -> Self {
        Self {
            text: text.into(),
            keyboard,
        }
    }

    /// Text with only a back button
    pub fn with_back(text: impl Into<String>, language_code: Option<&str>) -> Self {
        Self::new(text, back_keyboard(language_code))
    }
}

pub fn welcome(name: &str, is_admin: bool, language_code: Option<&str>) -> Screen {
    let key = if is_admin { "welcome-admin" } else { "welcome-user" };
    let text = t_args_lang(key, &[("brand", BRAND_NAME), ("name", &esc(name))], language_code);
    Screen::new(text, menu_keyboard(is_admin, language_code))
}

pub fn main_menu(is_admin: bool, language_code: Option<&str>) -> Screen {
    Screen::new(t_lang("menu-prompt", language_code), menu_keyboard(is_admin, language_code))
}

pub fn help(is_admin: bool, language_code: Option<&str>) -> Screen {
    let mut text = t_lang("help-user", language_code);
    if is_admin {
        text.push_str("\n\n");
        text.push_str(&t_lang("help-admin", language_code));
    }
    Screen::new(text, menu_keyboard(is_admin, language_code))
}

pub fn about(language_code: Option<&str>) -> Screen {
    let text = format!(
        "ℹ️ <b>About {BRAND_NAME}</b>\n{RULE}\n\n\
         Premium Bangladeshi clothing, made with care and delivered nationwide.\n\n\
         🚚 Delivery all over Bangladesh\n\
         💳 Cash on Delivery, bKash, Nagad and Rocket\n\
         🔄 Easy {EXCHANGE_WINDOW_DAYS}-day exchange\n\
         📏 Free size exchange\n\n\
         🌐 {}",
        CONTACT.website
    );
    Screen::new(text, support_keyboard(language_code))
}

pub fn contact(language_code: Option<&str>) -> Screen {
    let mut text = format!(
        "📞 <b>Contact Us</b>\n{RULE}\n\n\
         📱 Phone: {}\n\
         💬 WhatsApp: {}\n\
         📧 Email: {}\n\
         📘 Facebook: {}\n\
         🌐 Website: {}\n\n\
         🕐 <b>Business Hours</b>\n\
         {OPEN_DAYS}: {OPEN_HOURS}\n\
         {CLOSED_DAY}\n\n\
         ⏱️ <b>Response Times</b>\n",
        CONTACT.phone, CONTACT.whatsapp, CONTACT.email, CONTACT.facebook, CONTACT.website
    );
    for (channel, time) in RESPONSE_TIMES {
        let _ = writeln!(text, "• {channel}: {time}");
    }
    Screen::with_back(text, language_code)
}

pub fn policies(language_code: Option<&str>) -> Screen {
    let mut text = format!("📜 <b>Our Policies</b>\n{RULE}\n\n🚚 <b>Delivery</b>\n");
    for policy in [INSIDE_DHAKA, OUTSIDE_DHAKA] {
        let _ = writeln!(
            text,
            "• {}: ৳{} · {} (free above ৳{})",
            policy.name, policy.charge, policy.time, policy.free_above
        );
    }

    text.push_str("\n💳 <b>Payment</b>\n");
    for method in PAYMENT_METHODS {
        match method.number {
            Some(number) => {
                let _ = writeln!(text, "• {}: {number}", method.name);
            }
            None => {
                let _ = writeln!(text, "• {}", method.name);
            }
        }
    }

    let _ = writeln!(text, "\n🔄 <b>Returns & Exchange</b>\n• Exchange within {EXCHANGE_WINDOW_DAYS} days");
    for condition in RETURN_CONDITIONS {
        let _ = writeln!(text, "  - {condition}");
    }
    for note in [SIZE_EXCHANGE_NOTE, SALE_ITEMS_NOTE, DEFECTIVE_NOTE] {
        let _ = writeln!(text, "• {note}");
    }

    text.push_str("\n📏 <b>Size Guide</b>\n");
    for row in SIZE_GUIDE {
        let _ = writeln!(text, "• <b>{}</b>: chest {}, {} · {}", row.size, row.chest, row.height, row.weight);
    }
    Screen::with_back(esc_amp(&text), language_code)
}

// Policy text is static but contains '&'
fn esc_amp(text: &str) -> String {
    text.replace(" & ", " &amp; ")
}

pub fn support(language_code: Option<&str>) -> Screen {
    let text = format!(
        "🆘 <b>Need Help?</b>\n{RULE}\n\n\
         • Track an order with your phone number or order ID\n\
         • Ask our AI assistant about products, sizes and delivery\n\
         • Talk to a person: {} (WhatsApp) or {}\n\n\
         {OPEN_DAYS}: {OPEN_HOURS}",
        CONTACT.whatsapp, CONTACT.email
    );
    Screen::new(text, support_keyboard(language_code))
}

/// Size recommendation from `/size <cm> <kg>`
pub fn size(args: &str, language_code: Option<&str>) -> Screen {
    let numbers: Vec<u32> = args
        .split_whitespace()
        .filter_map(|part| part.trim_end_matches(|c: char| c.is_alphabetic()).parse().ok())
        .collect();

    let text = match numbers.as_slice() {
        [height, weight] if (100..=230).contains(height) && (25..=200).contains(weight) => {
            let size = business::size_recommendation(*height, *weight);
            let (chest, length) = business::size_guide_row(size)
                .map(|row| (row.chest, row.length))
                .unwrap_or(("-", "-"));
            t_args_lang(
                "size-result",
                &[
                    ("height", &height.to_string()),
                    ("weight", &weight.to_string()),
                    ("size", size),
                    ("chest", chest),
                    ("length", length),
                ],
                language_code,
            )
        }
        _ => t_lang("size-usage", language_code),
    };
    Screen::with_back(text, language_code)
}

pub fn track_choice(language_code: Option<&str>) -> Screen {
    Screen::new(t_lang("track-choose", language_code), track_keyboard(language_code))
}

pub fn filter_choice(language_code: Option<&str>) -> Screen {
    Screen::new(t_lang("filter-choose", language_code), filter_keyboard(language_code))
}

pub fn prompt(key: &str, language_code: Option<&str>) -> Screen {
    Screen::with_back(t_lang(key, language_code), language_code)
}

pub fn prompt_with(key: &str, args: &[(&str, &str)], language_code: Option<&str>) -> Screen {
    Screen::with_back(t_args_lang(key, args, language_code), language_code)
}

pub async fn dashboard(state: &AppState, language_code: Option<&str>) -> Result<Screen> {
    let now = Utc::now();
    let offset = state.utc_offset();
    let data = reports::load_dashboard(&state.pool, now, offset, state.config.low_stock_threshold).await?;
    Ok(Screen::new(
        reports::dashboard(&data, now, offset),
        data_keyboard(MenuAction::AdminDashboard, language_code),
    ))
}

pub async fn recent_orders(state: &AppState, language_code: Option<&str>) -> Result<Screen> {
    let orders = db::get_recent_orders(&state.pool, LIST_LIMIT).await?;
    Ok(Screen::new(
        reports::orders_list("Recent Orders", &orders, state.utc_offset()),
        data_keyboard(MenuAction::AdminOrders, language_code),
    ))
}

pub async fn sales(state: &AppState, language_code: Option<&str>) -> Result<Screen> {
    let data = reports::load_sales(&state.pool, Utc::now(), state.utc_offset()).await?;
    Ok(Screen::new(
        reports::sales_report(&data),
        data_keyboard(MenuAction::AdminSales, language_code),
    ))
}

pub async fn inventory(state: &AppState, language_code: Option<&str>) -> Result<Screen> {
    let data = reports::load_inventory(&state.pool, state.config.low_stock_threshold).await?;
    Ok(Screen::new(
        reports::inventory_report(&data),
        data_keyboard(MenuAction::AdminInventory, language_code),
    ))
}

pub async fn analytics(state: &AppState, language_code: Option<&str>) -> Result<Screen> {
    let data = reports::load_analytics(&state.pool, Utc::now()).await?;
    Ok(Screen::new(
        reports::analytics_report(&data),
        data_keyboard(MenuAction::AdminAnalytics, language_code),
    ))
}

/// Catalogue, or matches for `term` when one is given
pub async fn products(state: &AppState, term: &str, language_code: Option<&str>) -> Result<Screen> {
    let term = term.trim();
    let (title, products) = if term.is_empty() {
        // Featured items lead the catalogue
        let (mut featured, available) = tokio::try_join!(
            db::get_featured_products(&state.pool, LIST_LIMIT),
            db::get_available_products(&state.pool, LIST_LIMIT),
        )?;
        for product in available {
            if !featured.iter().any(|f| f.name == product.name) {
                featured.push(product);
            }
        }
        featured.truncate(LIST_LIMIT as usize);
        ("Our Products".to_string(), featured)
    } else {
        (
            format!("Products matching \"{term}\""),
            db::search_products(&state.pool, term, LIST_LIMIT).await?,
        )
    };
    Ok(Screen::with_back(reports::products_list(&title, &products), language_code))
}

pub async fn coupons(state: &AppState, language_code: Option<&str>) -> Result<Screen> {
    let coupons = db::get_all_coupons(&state.pool, true).await?;
    Ok(Screen::new(
        reports::coupons_list(&coupons, Utc::now(), state.utc_offset()),
        data_keyboard(MenuAction::AdminCoupons, language_code),
    ))
}

pub async fn users(state: &AppState, language_code: Option<&str>) -> Result<Screen> {
    let db_users = db::get_user_stats(&state.pool).await?;
    let sessions = state.sessions.stats(Utc::now());
    let top = state.sessions.top_users(5);
    Ok(Screen::new(
        reports::user_stats_report(&db_users, &sessions, &top),
        data_keyboard(MenuAction::AdminUsers, language_code),
    ))
}

pub async fn filtered_orders(
    state: &AppState,
    status: Option<OrderStatus>,
    language_code: Option<&str>,
) -> Result<Screen> {
    let (title, orders) = match status {
        Some(status) => (
            format!("{} {} Orders", status.emoji(), status.label()),
            db::get_orders_by_status(&state.pool, status, LIST_LIMIT).await?,
        ),
        None => ("All Orders".to_string(), db::get_recent_orders(&state.pool, LIST_LIMIT).await?),
    };
    Ok(Screen::new(
        reports::orders_list(&title, &orders, state.utc_offset()),
        filter_keyboard(language_code),
    ))
}

/// Single order by id, for customers and admins alike
pub async fn order_lookup(state: &AppState, reference: &str, language_code: Option<&str>) -> Result<Screen> {
    let text = match db::find_order(&state.pool, reference).await? {
        Some(order) => reports::order_details(&order, state.utc_offset()),
        None => t_args_lang("order-not-found", &[("query", &esc(reference))], language_code),
    };
    Ok(Screen::with_back(text, language_code))
}

/// Latest order in full plus the customer's other recent orders
pub async fn phone_lookup(state: &AppState, phone: &str, language_code: Option<&str>) -> Result<Screen> {
    let orders = db::get_orders_by_phone(&state.pool, phone, PHONE_LOOKUP_LIMIT).await?;
    let Some((latest, older)) = orders.split_first() else {
        let text = t_args_lang("order-not-found", &[("query", &esc(phone))], language_code);
        return Ok(Screen::with_back(text, language_code));
    };

    let offset = state.utc_offset();
    let mut text = reports::order_details(latest, offset);
    if !older.is_empty() {
        text.push_str("\n\n");
        text.push_str(&reports::orders_list("Your Other Orders", older, offset));
    }
    Ok(Screen::with_back(text, language_code))
}

/// Just the newest order, for a phone number spotted in free text
pub async fn latest_order_by_phone(state: &AppState, phone: &str, language_code: Option<&str>) -> Result<Screen> {
    match db::get_latest_order_by_phone(&state.pool, phone).await? {
        Some(order) => Ok(Screen::with_back(
            reports::order_details(&order, state.utc_offset()),
            language_code,
        )),
        None => {
            let text = t_args_lang("order-not-found", &[("query", &esc(phone))], language_code);
            Ok(Screen::with_back(text, language_code))
        }
    }
}

/// `/coupon <code> <amount>`: discount plus delivery charge for both zones
pub async fn coupon_check(state: &AppState, args: &str, language_code: Option<&str>) -> Result<Screen> {
    let Some((code, amount)) = parse_coupon_check(args) else {
        return Ok(Screen::with_back(t_lang("coupon-usage", language_code), language_code));
    };
    let text = match db::get_coupon_by_code(&state.pool, code).await? {
        Some(coupon) => {
            let validation = coupon.validate(amount, Utc::now());
            reports::coupon_check(&coupon, amount, &validation)
        }
        None => t_args_lang("coupon-not-found", &[("code", &esc(code))], language_code),
    };
    Ok(Screen::with_back(text, language_code))
}

pub async fn customer_profile(state: &AppState, phone: &str, language_code: Option<&str>) -> Result<Screen> {
    let Ok(phone) = validate_phone(phone) else {
        return Ok(Screen::with_back(t_lang("customer-usage", language_code), language_code));
    };
    let text = match crm::load_profile(&state.pool, &phone, Utc::now()).await? {
        Some(profile) => reports::customer_profile(&profile, state.utc_offset()),
        None => t_args_lang("customer-not-found", &[("phone", &esc(&phone))], language_code),
    };
    Ok(Screen::with_back(text, language_code))
}

pub async fn customers(state: &AppState, kind: &str, language_code: Option<&str>) -> Result<Screen> {
    let Some(list) = CustomerList::parse(kind) else {
        return Ok(Screen::with_back(t_lang("customers-usage", language_code), language_code));
    };
    let (title, rows) = match list {
        CustomerList::Top => ("Top Customers".to_string(), db::get_top_customers(&state.pool, LIST_LIMIT).await?),
        CustomerList::Returning => (
            "Returning Customers".to_string(),
            db::get_returning_customers(&state.pool, 2, LIST_LIMIT).await?,
        ),
        CustomerList::Inactive => {
            let cutoff = Utc::now() - chrono::Duration::days(INACTIVE_AFTER_DAYS);
            (
                format!("Inactive Customers ({INACTIVE_AFTER_DAYS}+ days)"),
                db::get_inactive_customers(&state.pool, cutoff, LIST_LIMIT).await?,
            )
        }
    };
    Ok(Screen::with_back(
        reports::customers_list(&title, &rows, state.utc_offset()),
        language_code,
    ))
}

pub async fn search_results(state: &AppState, term: &str, language_code: Option<&str>) -> Result<Screen> {
    let orders = db::search_orders(&state.pool, term, LIST_LIMIT).await?;
    let text = if orders.is_empty() {
        t_args_lang("search-no-results", &[("query", &esc(term))], language_code)
    } else {
        reports::orders_list(&format!("Search: {term} ({} found)", orders.len()), &orders, state.utc_offset())
    };
    Ok(Screen::with_back(text, language_code))
}

/// Health of the bot and its background services
pub fn bot_status(state: &AppState, language_code: Option<&str>) -> Screen {
    let now = Utc::now();
    let offset = state.utc_offset();
    let cache = state.context.stats();
    let sessions = state.sessions.stats(now);
    let on_off = |running: bool| if running { "🟢 ON" } else { "🔴 OFF" };

    let ai = if !state.gemini.is_enabled() {
        "⚪ Disabled"
    } else if state.gemini.breaker_open() {
        "🟡 Cooling down"
    } else {
        "🟢 Ready"
    };

    let text = format!(
        "🤖 <b>Bot Status</b>\n{RULE}\n\n\
         🕐 {}\n\n\
         🧠 AI: {ai} ({})\n\
         🗄️ Context cache: {} entries, TTL {}s\n\
         👥 Sessions: {} ({} active in 24h)\n\
         👑 Admins: {}\n\n\
         {}\n\n\
         🌐 Website monitor: {} · uptime {}%\n\
         📊 Scheduled reports: {} · {} sent\n\
         📝 Audit entries: {}",
        reports::format_datetime(now, offset),
        esc(&state.config.gemini_model),
        cache.entries,
        cache.ttl_secs,
        sessions.total,
        sessions.active_24h,
        state.admins.ids().len(),
        order_alerts::format_status(&state.order_alerts.status(), offset),
        on_off(state.monitor.is_running()),
        state.monitor.uptime_percentage(),
        on_off(state.reports.is_running()),
        state.reports.reports_sent(),
        state.audit.len()
    );
    Screen::with_back(text, language_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_parses_units() {
        let screen = size("172cm 68kg", None);
        assert!(screen.text.contains("<b>M</b>"));
        assert!(screen.text.contains("172 cm"));
        let usage = size("tall", None);
        assert!(usage.text.contains("/size"));
        assert!(size("500 68", None).text.contains("/size"));
    }

    #[test]
    fn test_static_pages_are_html_safe() {
        let text = policies(None).text;
        assert!(!text.contains(" & "));
        assert!(text.contains("Inside Dhaka"));
        assert!(contact(None).text.contains(CONTACT.email));
    }

    #[test]
    fn test_static_pages_have_keyboards() {
        for screen in [about(None), contact(None), policies(None), support(None)] {
            assert!(!screen.keyboard.inline_keyboard.is_empty());
        }
    }
}
