//! # Reports Module
//!
//! Admin screens and scheduled reports rendered as Telegram HTML, plus the
//! plain-text data blocks injected into AI prompts.
//!
//! Every `load_*` function gathers one screen's figures from the database;
//! the matching formatter is pure so it can be tested without a pool.

use std::fmt::Write as _;

use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, Offset, TimeZone, Utc};
use sqlx::postgres::PgPool;

use crate::business::{delivery_charge, OrderStatus, BRAND_NAME, CONTACT, INSIDE_DHAKA, OUTSIDE_DHAKA};
use crate::crm::CustomerProfile;
use crate::db;
use crate::models::{
    AdminRecord, Coupon, CouponValidation, CustomerSummary, DailyRevenue, InventorySummary, Order, PaymentMethodStat, Product,
    SalesStats, StatusCount, TopProduct, UserStats,
};
use crate::session::{SessionStats, UserSession};

pub const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━";

/// Escape user or database text for Telegram HTML
pub fn esc(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

fn esc_or(text: Option<&str>, fallback: &str) -> String {
    match text {
        Some(t) if !t.trim().is_empty() => esc(t.trim()),
        _ => fallback.to_string(),
    }
}

/// Group an integer with thousands separators
pub fn format_count(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if n < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Taka amount rounded to whole units, e.g. `৳12,500`
pub fn format_money(amount: f64) -> String {
    let rounded = amount.round() as i64;
    if rounded < 0 {
        format!("-৳{}", format_count(-rounded))
    } else {
        format!("৳{}", format_count(rounded))
    }
}

/// Trend marker comparing two periods
pub fn trend(current: f64, previous: f64) -> String {
    if previous <= 0.0 {
        return if current > 0.0 { "🆕".to_string() } else { "➖".to_string() };
    }
    let change = (current - previous) / previous * 100.0;
    if change > 0.5 {
        format!("📈 +{change:.0}%")
    } else if change < -0.5 {
        format!("📉 {change:.0}%")
    } else {
        "➖ 0%".to_string()
    }
}

pub fn business_offset(utc_offset_hours: i32) -> FixedOffset {
    FixedOffset::east_opt(utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
}

pub fn business_now(now: DateTime<Utc>, utc_offset_hours: i32) -> DateTime<FixedOffset> {
    now.with_timezone(&business_offset(utc_offset_hours))
}

/// Local midnight of the business day containing `now`, in UTC
pub fn business_day_start(now: DateTime<Utc>, utc_offset_hours: i32) -> DateTime<Utc> {
    let tz = business_offset(utc_offset_hours);
    let local = now.with_timezone(&tz);
    local
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| tz.from_local_datetime(&midnight).single())
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or(now - Duration::hours(24))
}

pub fn format_datetime(dt: DateTime<Utc>, utc_offset_hours: i32) -> String {
    business_now(dt, utc_offset_hours)
        .format("%d %b %Y, %I:%M %p")
        .to_string()
}

fn format_order_date(order: &Order, utc_offset_hours: i32) -> String {
    order
        .created_at
        .map(|dt| format_datetime(dt, utc_offset_hours))
        .unwrap_or_else(|| "N/A".to_string())
}

fn payment_status_line(order: &Order) -> String {
    let status = order.payment_status.as_deref().unwrap_or("pending");
    let icon = if status.eq_ignore_ascii_case("paid") { "✅" } else { "⏳" };
    format!("{icon} {}", esc(&status.to_uppercase()))
}

// ---------------------------------------------------------------------------
// AI context blocks (plain text)
// ---------------------------------------------------------------------------

pub fn products_context(products: &[Product]) -> String {
    if products.is_empty() {
        return "AVAILABLE PRODUCTS: No products listed right now.\n".to_string();
    }
    let mut text = format!("AVAILABLE PRODUCTS ({}):\n", products.len());
    for product in products {
        let _ = write!(text, "- {}: {} | {}", product.name, format_money(product.price), product.availability().label());
        if let Some(stock) = product.stock_quantity {
            let _ = write!(text, " | stock {stock}");
        }
        if let Some(category) = product.category.as_deref().filter(|c| !c.is_empty()) {
            let _ = write!(text, " [{category}]");
        }
        text.push('\n');
    }
    text
}

pub fn stats_context(today: &SalesStats, week: &SalesStats) -> String {
    format!(
        "SALES SNAPSHOT:\n- Today: {} orders, {} revenue\n- Last 7 days: {} orders, {} revenue (avg {})\n",
        today.order_count,
        format_money(today.revenue),
        week.order_count,
        format_money(week.revenue),
        format_money(week.avg_order)
    )
}

pub fn top_products_context(top: &[TopProduct]) -> String {
    if top.is_empty() {
        return String::new();
    }
    let mut text = String::from("POPULAR PRODUCTS (Last 30 days):\n");
    for (i, product) in top.iter().enumerate() {
        let _ = writeln!(text, "{}. {}: {} sold, {}", i + 1, product.product_name, product.units, format_money(product.revenue));
    }
    text
}

pub fn low_stock_context(products: &[Product]) -> String {
    if products.is_empty() {
        return String::new();
    }
    let mut text = String::from("LOW STOCK ALERTS:\n");
    for product in products {
        let _ = writeln!(text, "⚠️ {}: Only {} left", product.name, product.stock_quantity.unwrap_or(0));
    }
    text
}

/// Extra figures appended to the context in admin mode
pub fn admin_snapshot_context(data: &DashboardData) -> String {
    let mut text = String::from("ADMIN SNAPSHOT:\n");
    let _ = writeln!(text, "- Pending orders: {}", data.pending);
    let _ = writeln!(
        text,
        "- This month: {} orders, {} revenue",
        data.month.order_count,
        format_money(data.month.revenue)
    );
    let _ = writeln!(
        text,
        "- Inventory: {} products, {} low stock, {} out of stock",
        data.inventory.total_products, data.inventory.low_stock, data.inventory.out_of_stock
    );
    let _ = writeln!(text, "- Registered users: {}", data.users.total_users);
    text
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Full customer-facing order card
pub fn order_details(order: &Order, utc_offset_hours: i32) -> String {
    let status = order.status();
    let mut text = format!("📦 <b>ORDER DETAILS</b>\n{RULE}\n\n");
    let _ = writeln!(text, "🆔 <b>Order ID:</b> {}", esc(&order.display_id()));
    let _ = writeln!(text, "👤 <b>Customer:</b> {}", esc_or(order.customer_name.as_deref(), "N/A"));
    let _ = writeln!(text, "📱 <b>Phone:</b> {}", esc_or(order.phone.as_deref(), "N/A"));
    let _ = writeln!(
        text,
        "🛍️ <b>Product:</b> {} × {}",
        esc_or(order.product_name.as_deref(), "N/A"),
        order.quantity
    );

    text.push_str("\n💰 <b>PAYMENT</b>\n");
    let _ = writeln!(text, "• Total: {}", format_money(order.total_price));
    if order.discount_amount > 0.0 {
        let coupon = order
            .coupon_code
            .as_deref()
            .map(|c| format!(" ({})", esc(c)))
            .unwrap_or_default();
        let _ = writeln!(text, "• Discount: {}{coupon}", format_money(order.discount_amount));
    }
    let _ = writeln!(text, "• Payment: {}", payment_status_line(order));
    let _ = writeln!(text, "• Method: {}", esc_or(order.payment_method.as_deref(), "Cash on Delivery"));

    text.push_str("\n📊 <b>ORDER STATUS</b>\n");
    let _ = writeln!(text, "{} <b>{}</b>", status.emoji(), status.label());
    let _ = writeln!(text, "<i>{}</i>", status.description());
    if let Some(delivery) = order.delivery_status.as_deref().filter(|d| !d.trim().is_empty()) {
        let _ = writeln!(text, "🚚 Delivery: {}", esc(delivery));
    }

    let _ = writeln!(text, "\n📅 Ordered: {}", format_order_date(order, utc_offset_hours));
    let _ = writeln!(text, "{RULE}");
    let _ = writeln!(text, "📌 <b>Next:</b> {}", status.next_step());
    let _ = write!(text, "\n❓ Questions? Contact: {}", CONTACT.phone);
    text
}

/// Compact listing used by the orders, filter and search screens
pub fn orders_list(title: &str, orders: &[Order], utc_offset_hours: i32) -> String {
    let mut text = format!("📋 <b>{}</b>\n{RULE}\n\n", esc(title));
    if orders.is_empty() {
        text.push_str("No orders found.");
        return text;
    }
    for order in orders {
        let status = order.status();
        let _ = writeln!(
            text,
            "{} <b>{}</b> · {} · {}",
            status.emoji(),
            esc(&order.display_id()),
            esc_or(order.customer_name.as_deref(), "Unknown"),
            format_money(order.total_price)
        );
        let _ = writeln!(
            text,
            "   {} × {} · {} · {}",
            esc_or(order.product_name.as_deref(), "N/A"),
            order.quantity,
            status.label(),
            format_order_date(order, utc_offset_hours)
        );
    }
    let _ = write!(text, "\n<i>Showing {} order(s)</i>", orders.len());
    text
}

/// Push notification sent to admins for each new order
pub fn new_order_alert(order: &Order, utc_offset_hours: i32) -> String {
    let mut text = format!("🎉 <b>NEW ORDER!</b>\n{RULE}\n\n");
    let _ = writeln!(text, "🆔 <b>Order:</b> {}", esc(&order.display_id()));
    let _ = writeln!(text, "👤 <b>Customer:</b> {}", esc_or(order.customer_name.as_deref(), "Unknown"));
    let _ = writeln!(text, "📱 <b>Phone:</b> {}", esc_or(order.phone.as_deref(), "N/A"));
    let _ = writeln!(text, "📍 <b>Address:</b> {}", esc_or(order.address.as_deref(), "N/A"));
    let _ = writeln!(
        text,
        "\n🛍️ <b>Product:</b> {} × {}",
        esc_or(order.product_name.as_deref(), "N/A"),
        order.quantity
    );
    let _ = writeln!(text, "💰 <b>Total:</b> {}", format_money(order.total_price));
    if let Some(code) = order.coupon_code.as_deref().filter(|c| !c.is_empty()) {
        let _ = writeln!(text, "🎟️ <b>Coupon:</b> {} (-{})", esc(code), format_money(order.discount_amount));
    }
    let _ = writeln!(text, "💳 <b>Payment:</b> {}", esc_or(order.payment_method.as_deref(), "Cash on Delivery"));
    let _ = write!(text, "\n⏰ {}", format_order_date(order, utc_offset_hours));
    text
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct DashboardData {
    pub today: SalesStats,
    pub week: SalesStats,
    pub month: SalesStats,
    pub pending: i64,
    pub statuses: Vec<StatusCount>,
    pub inventory: InventorySummary,
    pub top: Vec<TopProduct>,
    pub users: UserStats,
}

pub async fn load_dashboard(
    pool: &PgPool,
    now: DateTime<Utc>,
    utc_offset_hours: i32,
    low_stock_threshold: i32,
) -> Result<DashboardData> {
    let day_start = business_day_start(now, utc_offset_hours);
    let week_start = now - Duration::days(7);
    let month_start = now - Duration::days(30);

    let (today, week, month, pending, statuses, inventory, top, users) = tokio::try_join!(
        db::get_sales_stats(pool, day_start),
        db::get_sales_stats(pool, week_start),
        db::get_sales_stats(pool, month_start),
        db::get_pending_orders_count(pool),
        db::get_status_counts(pool),
        db::get_inventory_summary(pool, low_stock_threshold),
        db::get_top_products(pool, week_start, 3),
        db::get_user_stats(pool),
    )?;

    Ok(DashboardData {
        today,
        week,
        month,
        pending,
        statuses,
        inventory,
        top,
        users,
    })
}

fn status_breakdown(statuses: &[StatusCount]) -> String {
    let mut text = String::new();
    for row in statuses {
        let status = OrderStatus::from_db(row.status.as_deref());
        let raw = row.status.as_deref().unwrap_or(status.label());
        let _ = writeln!(text, "{} {}: <b>{}</b>", status.emoji(), esc(raw), format_count(row.count));
    }
    text
}

pub fn dashboard(data: &DashboardData, now: DateTime<Utc>, utc_offset_hours: i32) -> String {
    let mut text = format!("📊 <b>{} DASHBOARD</b>\n{RULE}\n", BRAND_NAME.to_uppercase());
    let _ = writeln!(text, "🕐 {}\n", format_datetime(now, utc_offset_hours));

    text.push_str("💰 <b>REVENUE</b>\n");
    for (label, stats) in [("Today", &data.today), ("7 days", &data.week), ("30 days", &data.month)] {
        let _ = writeln!(
            text,
            "• {label}: <b>{}</b> ({} orders)",
            format_money(stats.revenue),
            format_count(stats.order_count)
        );
    }
    let _ = writeln!(text, "• Avg order (30d): {}", format_money(data.month.avg_order));

    let _ = writeln!(text, "\n⏳ <b>Pending orders:</b> {}", format_count(data.pending));
    if !data.statuses.is_empty() {
        text.push_str("\n📦 <b>ORDER STATUS</b>\n");
        text.push_str(&status_breakdown(&data.statuses));
    }

    text.push_str("\n🏷️ <b>INVENTORY</b>\n");
    let _ = writeln!(text, "• Products: {}", format_count(data.inventory.total_products));
    let _ = writeln!(text, "• Low stock: {}", format_count(data.inventory.low_stock));
    let _ = writeln!(text, "• Out of stock: {}", format_count(data.inventory.out_of_stock));

    if !data.top.is_empty() {
        text.push_str("\n🔥 <b>TOP THIS WEEK</b>\n");
        for (i, product) in data.top.iter().enumerate() {
            let _ = writeln!(text, "{}. {} ({} sold)", i + 1, esc(&product.product_name), product.units);
        }
    }

    let _ = write!(
        text,
        "\n👥 Users: {} total, {} active (7d)",
        format_count(data.users.total_users),
        format_count(data.users.active_users)
    );
    text
}

// ---------------------------------------------------------------------------
// Sales
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SalesReportData {
    pub today: SalesStats,
    pub week: SalesStats,
    pub previous_week: SalesStats,
    pub month: SalesStats,
    pub daily: Vec<DailyRevenue>,
    pub top: Vec<TopProduct>,
    pub payments: Vec<PaymentMethodStat>,
}

pub async fn load_sales(pool: &PgPool, now: DateTime<Utc>, utc_offset_hours: i32) -> Result<SalesReportData> {
    let day_start = business_day_start(now, utc_offset_hours);
    let week_start = now - Duration::days(7);
    let previous_week_start = now - Duration::days(14);
    let month_start = now - Duration::days(30);

    let (today, week, previous_week, month, daily, top, payments) = tokio::try_join!(
        db::get_sales_stats(pool, day_start),
        db::get_sales_stats(pool, week_start),
        db::get_sales_stats_between(pool, previous_week_start, week_start),
        db::get_sales_stats(pool, month_start),
        db::get_daily_sales(pool, week_start, utc_offset_hours),
        db::get_top_products(pool, month_start, 5),
        db::get_payment_method_stats(pool, month_start),
    )?;

    Ok(SalesReportData {
        today,
        week,
        previous_week,
        month,
        daily,
        top,
        payments,
    })
}

pub fn sales_report(data: &SalesReportData) -> String {
    let mut text = format!("💰 <b>SALES REPORT</b>\n{RULE}\n\n");
    let _ = writeln!(
        text,
        "📅 Today: <b>{}</b> ({} orders)",
        format_money(data.today.revenue),
        data.today.order_count
    );
    let _ = writeln!(
        text,
        "📆 7 days: <b>{}</b> ({} orders) {}",
        format_money(data.week.revenue),
        data.week.order_count,
        trend(data.week.revenue, data.previous_week.revenue)
    );
    let _ = writeln!(
        text,
        "🗓️ 30 days: <b>{}</b> ({} orders)",
        format_money(data.month.revenue),
        data.month.order_count
    );
    let _ = writeln!(text, "🧾 Avg order (30d): {}", format_money(data.month.avg_order));

    if !data.daily.is_empty() {
        text.push_str("\n📈 <b>DAILY (last 7 days)</b>\n");
        for day in &data.daily {
            let _ = writeln!(
                text,
                "{}: {} · {} orders",
                day.day.format("%a %d %b"),
                format_money(day.revenue),
                day.orders
            );
        }
    }

    if !data.top.is_empty() {
        text.push_str("\n🏆 <b>TOP PRODUCTS (30d)</b>\n");
        for (i, product) in data.top.iter().enumerate() {
            let _ = writeln!(
                text,
                "{}. {}: {} sold · {}",
                i + 1,
                esc(&product.product_name),
                product.units,
                format_money(product.revenue)
            );
        }
    }

    if !data.payments.is_empty() {
        text.push_str("\n💳 <b>PAYMENT METHODS (30d)</b>\n");
        for method in &data.payments {
            let _ = writeln!(
                text,
                "• {}: {} orders · {}",
                esc(&method.method),
                method.count,
                format_money(method.revenue)
            );
        }
    }
    text.trim_end().to_string()
}

// ---------------------------------------------------------------------------
// Inventory and products
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct InventoryData {
    pub summary: InventorySummary,
    pub low_stock: Vec<Product>,
    pub out_of_stock: Vec<Product>,
    pub threshold: i32,
}

pub async fn load_inventory(pool: &PgPool, threshold: i32) -> Result<InventoryData> {
    let (summary, low_stock, out_of_stock) = tokio::try_join!(
        db::get_inventory_summary(pool, threshold),
        db::get_low_stock_products(pool, threshold, 10),
        db::get_out_of_stock_products(pool, 10),
    )?;
    Ok(InventoryData {
        summary,
        low_stock,
        out_of_stock,
        threshold,
    })
}

pub fn inventory_report(data: &InventoryData) -> String {
    let mut text = format!("📦 <b>INVENTORY</b>\n{RULE}\n\n");
    let _ = writeln!(text, "🏷️ Products: <b>{}</b>", format_count(data.summary.total_products));
    let _ = writeln!(text, "📦 Units in stock: {}", format_count(data.summary.total_units));
    let _ = writeln!(text, "💎 Stock value: {}", format_money(data.summary.inventory_value));
    let _ = writeln!(text, "⚠️ Low stock (&lt; {}): {}", data.threshold, data.summary.low_stock);
    let _ = writeln!(text, "❌ Out of stock: {}", data.summary.out_of_stock);

    if !data.low_stock.is_empty() {
        text.push_str("\n⚠️ <b>LOW STOCK</b>\n");
        for product in &data.low_stock {
            let _ = writeln!(
                text,
                "• {}: only {} left",
                esc(&product.name),
                product.stock_quantity.unwrap_or(0)
            );
        }
    }
    if !data.out_of_stock.is_empty() {
        text.push_str("\n❌ <b>OUT OF STOCK</b>\n");
        for product in &data.out_of_stock {
            let _ = writeln!(text, "• {}", esc(&product.name));
        }
    }
    if data.low_stock.is_empty() && data.out_of_stock.is_empty() {
        text.push_str("\n✅ All products are well stocked.");
    }
    text.trim_end().to_string()
}

pub fn products_list(title: &str, products: &[Product]) -> String {
    let mut text = format!("🛍️ <b>{}</b>\n{RULE}\n\n", esc(title));
    if products.is_empty() {
        text.push_str("No products available right now.");
        return text;
    }
    for product in products {
        let star = if product.is_featured { "⭐ " } else { "" };
        let _ = writeln!(text, "{star}<b>{}</b>", esc(&product.name));
        let _ = write!(text, "   {} · {}", format_money(product.price), product.availability().label());
        if let Some(category) = product.category.as_deref().filter(|c| !c.is_empty()) {
            let _ = write!(text, " · {}", esc(category));
        }
        text.push('\n');
    }
    let _ = write!(text, "\n🌐 Order online: {}", CONTACT.website);
    text
}

pub fn coupons_list(coupons: &[Coupon], now: DateTime<Utc>, utc_offset_hours: i32) -> String {
    let mut text = format!("🎟️ <b>COUPONS</b>\n{RULE}\n\n");
    if coupons.is_empty() {
        text.push_str("No coupons configured.");
        return text;
    }
    for coupon in coupons {
        let expired = coupon.expires_at.is_some_and(|e| e < now);
        let icon = if !coupon.is_active || expired { "🔴" } else { "🟢" };
        let _ = writeln!(text, "{icon} <b>{}</b>: {}", esc(&coupon.code), esc(&coupon.describe_discount()));

        let usage = match coupon.usage_limit {
            Some(limit) => format!("{}/{}", coupon.usage_count, limit),
            None => format!("{}/∞", coupon.usage_count),
        };
        let _ = write!(text, "   Used {usage}");
        if let Some(min) = coupon.min_order_value {
            let _ = write!(text, " · min {}", format_money(min));
        }
        match coupon.expires_at {
            Some(expires) if expired => {
                let _ = write!(text, " · expired {}", format_datetime(expires, utc_offset_hours));
            }
            Some(expires) => {
                let _ = write!(text, " · until {}", format_datetime(expires, utc_offset_hours));
            }
            None => {}
        }
        text.push('\n');
    }
    text.trim_end().to_string()
}

// ---------------------------------------------------------------------------
// Analytics and users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct AnalyticsData {
    pub month: SalesStats,
    pub unique_customers: i64,
    pub repeat_customers: i64,
    pub statuses: Vec<StatusCount>,
    pub payments: Vec<PaymentMethodStat>,
    pub top: Vec<TopProduct>,
    pub top_customers: Vec<CustomerSummary>,
    pub users: UserStats,
}

pub async fn load_analytics(pool: &PgPool, now: DateTime<Utc>) -> Result<AnalyticsData> {
    let since = now - Duration::days(30);
    let (month, unique_customers, repeat_customers, statuses, payments, top, top_customers, users) = tokio::try_join!(
        db::get_sales_stats(pool, since),
        db::get_unique_customers(pool, since),
        db::get_repeat_customers(pool, since),
        db::get_status_counts(pool),
        db::get_payment_method_stats(pool, since),
        db::get_top_products(pool, since, 5),
        db::get_top_customers(pool, 3),
        db::get_user_stats(pool),
    )?;
    Ok(AnalyticsData {
        month,
        unique_customers,
        repeat_customers,
        statuses,
        payments,
        top,
        top_customers,
        users,
    })
}

fn percent(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

pub fn analytics_report(data: &AnalyticsData) -> String {
    let mut text = format!("📈 <b>ANALYTICS (30 days)</b>\n{RULE}\n\n");
    let _ = writeln!(text, "🧾 Orders: {}", format_count(data.month.order_count));
    let _ = writeln!(text, "💰 Revenue: {}", format_money(data.month.revenue));
    let _ = writeln!(text, "📊 Avg order: {}", format_money(data.month.avg_order));

    text.push_str("\n👥 <b>CUSTOMERS</b>\n");
    let _ = writeln!(text, "• Unique: {}", format_count(data.unique_customers));
    let _ = writeln!(
        text,
        "• Repeat: {} ({:.0}%)",
        format_count(data.repeat_customers),
        percent(data.repeat_customers, data.unique_customers)
    );
    if data.unique_customers > 0 {
        let _ = writeln!(
            text,
            "• Revenue per customer: {}",
            format_money(data.month.revenue / data.unique_customers as f64)
        );
    }

    let total: i64 = data.statuses.iter().map(|s| s.count).sum();
    if total > 0 {
        let delivered: i64 = data
            .statuses
            .iter()
            .filter(|s| OrderStatus::from_db(s.status.as_deref()) == OrderStatus::Delivered)
            .map(|s| s.count)
            .sum();
        let cancelled: i64 = data
            .statuses
            .iter()
            .filter(|s| OrderStatus::from_db(s.status.as_deref()) == OrderStatus::Cancelled)
            .map(|s| s.count)
            .sum();
        text.push_str("\n📦 <b>FULFILMENT (all time)</b>\n");
        let _ = writeln!(text, "• Delivered: {:.1}%", percent(delivered, total));
        let _ = writeln!(text, "• Cancelled: {:.1}%", percent(cancelled, total));
    }

    if !data.payments.is_empty() {
        text.push_str("\n💳 <b>PAYMENT MIX</b>\n");
        let orders: i64 = data.payments.iter().map(|p| p.count).sum();
        for method in &data.payments {
            let _ = writeln!(text, "• {}: {:.0}%", esc(&method.method), percent(method.count, orders));
        }
    }

    if !data.top.is_empty() {
        text.push_str("\n🏆 <b>BEST SELLERS</b>\n");
        for (i, product) in data.top.iter().enumerate() {
            let _ = writeln!(text, "{}. {} ({} sold)", i + 1, esc(&product.product_name), product.units);
        }
    }

    if !data.top_customers.is_empty() {
        text.push_str("\n👑 <b>TOP CUSTOMERS (all time)</b>\n");
        for (i, customer) in data.top_customers.iter().enumerate() {
            let _ = writeln!(
                text,
                "{}. {} · {} · {} orders",
                i + 1,
                esc_or(customer.customer_name.as_deref(), "Unknown"),
                format_money(customer.total_spent),
                customer.order_count
            );
        }
    }

    let _ = write!(
        text,
        "\n🤖 Bot users: {} ({} active in 7d)",
        format_count(data.users.total_users),
        format_count(data.users.active_users)
    );
    text
}

pub fn user_stats_report(db_users: &UserStats, sessions: &SessionStats, top: &[UserSession]) -> String {
    let mut text = format!("👥 <b>BOT USERS</b>\n{RULE}\n\n");
    let _ = writeln!(text, "📇 Registered: {}", format_count(db_users.total_users));
    let _ = writeln!(text, "🟢 Active (7d): {}", format_count(db_users.active_users));

    text.push_str("\n🧠 <b>THIS SESSION</b>\n");
    let _ = writeln!(text, "• Sessions: {} ({} admins)", sessions.total, sessions.admins);
    let _ = writeln!(text, "• Active (24h): {}", sessions.active_24h);
    let _ = writeln!(text, "• Messages: {}", sessions.messages);
    let _ = writeln!(text, "• AI turns: {}", sessions.ai_turns);

    if !top.is_empty() {
        text.push_str("\n🏅 <b>MOST ACTIVE</b>\n");
        for (i, session) in top.iter().enumerate() {
            let _ = writeln!(
                text,
                "{}. {} · {} messages",
                i + 1,
                esc(&session.display_name()),
                session.message_count
            );
        }
    }
    text.trim_end().to_string()
}

pub fn admins_list(records: &[AdminRecord], env_ids: &[u64]) -> String {
    let mut text = format!("🛡️ <b>ADMINS</b>\n{RULE}\n\n");
    for id in env_ids {
        let _ = writeln!(text, "🔒 <code>{id}</code> (environment)");
    }
    for record in records {
        if env_ids.contains(&(record.user_id as u64)) {
            continue;
        }
        let icon = if record.is_super { "👑" } else { "👤" };
        let name = record
            .username
            .as_deref()
            .map(|u| format!(" @{}", esc(u)))
            .unwrap_or_default();
        let _ = writeln!(text, "{icon} <code>{}</code>{name}", record.user_id);
    }
    if env_ids.is_empty() && records.is_empty() {
        text.push_str("No admins configured.");
    }
    text.trim_end().to_string()
}

// ---------------------------------------------------------------------------
// Customers and coupons
// ---------------------------------------------------------------------------

const MEDALS: [&str; 3] = ["🥇", "🥈", "🥉"];

pub fn customer_profile(profile: &CustomerProfile, utc_offset_hours: i32) -> String {
    let summary = &profile.summary;
    let mut text = format!("{} <b>CUSTOMER PROFILE</b>\n{RULE}\n\n", profile.tier.emoji());
    let _ = writeln!(text, "👤 <b>Name:</b> {}", esc_or(summary.customer_name.as_deref(), "Unknown"));
    let _ = writeln!(text, "📞 <b>Phone:</b> <code>{}</code>", esc(&summary.phone));
    if let Some(order) = profile.contact_order() {
        if let Some(email) = order.customer_email.as_deref().filter(|e| !e.trim().is_empty()) {
            let _ = writeln!(text, "📧 <b>Email:</b> {}", esc(email));
        }
        if let Some(address) = order.address.as_deref().filter(|a| !a.trim().is_empty()) {
            let _ = writeln!(text, "📍 <b>Address:</b> {}", esc(address));
        }
    }

    let _ = writeln!(text, "\n🏅 Tier: <b>{}</b>", profile.tier.label());
    let _ = writeln!(text, "🎯 Loyalty points: <b>{}</b>", profile.loyalty_points);

    text.push_str("\n📊 <b>PURCHASE HISTORY</b>\n");
    let _ = writeln!(text, "• Orders: {}", format_count(summary.order_count));
    let _ = writeln!(text, "• Total spent: {}", format_money(summary.total_spent));
    let _ = writeln!(text, "• Avg order: {}", format_money(profile.avg_order));
    if let Some(favorite) = profile.favorite_product.as_deref() {
        let _ = writeln!(text, "• Favorite: {}", esc(favorite));
    }

    let last = summary
        .last_order
        .map(|dt| format_datetime(dt, utc_offset_hours))
        .unwrap_or_else(|| "N/A".to_string());
    let _ = writeln!(text, "\n📅 Last purchase: {last}");
    let _ = writeln!(text, "{} Status: {}", profile.activity.emoji(), profile.activity.label());

    if !profile.recent_orders.is_empty() {
        text.push_str("\n📦 <b>RECENT ORDERS</b>\n");
        for order in &profile.recent_orders {
            let status = order.status();
            let _ = writeln!(
                text,
                "{} {} · {} · {}",
                status.emoji(),
                esc(&order.display_id()),
                esc_or(order.product_name.as_deref(), "N/A"),
                format_money(order.total_price)
            );
        }
    }
    text.trim_end().to_string()
}

/// Ranked customer list for `/customers`
pub fn customers_list(title: &str, customers: &[CustomerSummary], utc_offset_hours: i32) -> String {
    let mut text = format!("👑 <b>{}</b>\n{RULE}\n\n", esc(title));
    if customers.is_empty() {
        text.push_str("No customer data available.");
        return text;
    }
    for (i, customer) in customers.iter().enumerate() {
        let rank = MEDALS.get(i).map(|m| m.to_string()).unwrap_or_else(|| format!("{}.", i + 1));
        let _ = writeln!(
            text,
            "{rank} <b>{}</b>",
            esc_or(customer.customer_name.as_deref(), "Unknown")
        );
        let last = customer
            .last_order
            .map(|dt| format_datetime(dt, utc_offset_hours))
            .unwrap_or_else(|| "N/A".to_string());
        let _ = writeln!(
            text,
            "   📞 {} · 📦 {} · 💰 {} · last {last}",
            esc(&customer.phone),
            customer.order_count,
            format_money(customer.total_spent)
        );
    }
    text.trim_end().to_string()
}

/// Result of checking a coupon against an order amount, with delivery charges
pub fn coupon_check(coupon: &Coupon, order_amount: f64, validation: &CouponValidation) -> String {
    let mut text = format!("🎟️ <b>COUPON {}</b>\n{RULE}\n\n", esc(&coupon.code.to_uppercase()));
    let _ = writeln!(text, "🛒 Order amount: {}", format_money(order_amount));
    match validation {
        CouponValidation::Valid { discount } => {
            let subtotal = (order_amount - discount).max(0.0);
            let _ = writeln!(text, "✅ Valid: {}", coupon.describe_discount());
            let _ = writeln!(text, "💸 Discount: {}", format_money(*discount));
            let _ = writeln!(text, "🧾 Subtotal: <b>{}</b>", format_money(subtotal));
            text.push_str("\n🚚 <b>With delivery</b>\n");
            for (policy, inside) in [(INSIDE_DHAKA, true), (OUTSIDE_DHAKA, false)] {
                let charge = delivery_charge(inside, subtotal);
                let fee = if charge == 0 {
                    "free".to_string()
                } else {
                    format_money(f64::from(charge))
                };
                let _ = writeln!(
                    text,
                    "• {}: {} ({fee} delivery)",
                    policy.name,
                    format_money(subtotal + f64::from(charge))
                );
            }
        }
        CouponValidation::Invalid(reason) => {
            let _ = writeln!(text, "❌ {reason}");
        }
    }
    text.trim_end().to_string()
}

// ---------------------------------------------------------------------------
// Scheduled reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct DailyReportData {
    pub today: SalesStats,
    pub yesterday: SalesStats,
    pub pending: i64,
    pub statuses: Vec<StatusCount>,
    pub top: Vec<TopProduct>,
    pub low_stock: Vec<Product>,
}

pub async fn load_daily_report(
    pool: &PgPool,
    now: DateTime<Utc>,
    utc_offset_hours: i32,
    low_stock_threshold: i32,
) -> Result<DailyReportData> {
    let day_start = business_day_start(now, utc_offset_hours);
    let yesterday_start = day_start - Duration::days(1);
    let (today, yesterday, pending, statuses, top, low_stock) = tokio::try_join!(
        db::get_sales_stats(pool, day_start),
        db::get_sales_stats_between(pool, yesterday_start, day_start),
        db::get_pending_orders_count(pool),
        db::get_status_counts(pool),
        db::get_top_products(pool, day_start, 5),
        db::get_low_stock_products(pool, low_stock_threshold, 5),
    )?;
    Ok(DailyReportData {
        today,
        yesterday,
        pending,
        statuses,
        top,
        low_stock,
    })
}

pub fn daily_report(data: &DailyReportData, now: DateTime<Utc>, utc_offset_hours: i32) -> String {
    let local = business_now(now, utc_offset_hours);
    let mut text = format!(
        "📅 <b>DAILY REPORT</b>\n{}\n{RULE}\n\n",
        local.format("%A, %d %B %Y")
    );
    let _ = writeln!(
        text,
        "💰 Revenue: <b>{}</b> {}",
        format_money(data.today.revenue),
        trend(data.today.revenue, data.yesterday.revenue)
    );
    let _ = writeln!(text, "🧾 Orders: <b>{}</b> (yesterday {})", data.today.order_count, data.yesterday.order_count);
    let _ = writeln!(text, "📊 Avg order: {}", format_money(data.today.avg_order));
    let _ = writeln!(text, "⏳ Pending: {}", data.pending);

    if !data.statuses.is_empty() {
        text.push_str("\n📦 <b>ORDER STATUS</b>\n");
        text.push_str(&status_breakdown(&data.statuses));
    }

    text.push_str("\n🔥 <b>TOP PRODUCTS TODAY</b>\n");
    if data.top.is_empty() {
        text.push_str("No sales today.\n");
    } else {
        for (i, product) in data.top.iter().enumerate() {
            let _ = writeln!(
                text,
                "{}. {}: {} sold · {}",
                i + 1,
                esc(&product.product_name),
                product.units,
                format_money(product.revenue)
            );
        }
    }

    if !data.low_stock.is_empty() {
        text.push_str("\n⚠️ <b>RESTOCK SOON</b>\n");
        for product in &data.low_stock {
            let _ = writeln!(text, "• {}: {} left", esc(&product.name), product.stock_quantity.unwrap_or(0));
        }
    }
    text.trim_end().to_string()
}

#[derive(Debug, Clone, Default)]
pub struct WeeklyReportData {
    pub week: SalesStats,
    pub previous_week: SalesStats,
    pub month: SalesStats,
    pub daily: Vec<DailyRevenue>,
    pub top: Vec<TopProduct>,
    pub unique_customers: i64,
    pub repeat_customers: i64,
}

pub async fn load_weekly_report(
    pool: &PgPool,
    now: DateTime<Utc>,
    utc_offset_hours: i32,
) -> Result<WeeklyReportData> {
    let week_start = now - Duration::days(7);
    let previous_week_start = now - Duration::days(14);
    let month_start = now - Duration::days(30);
    let (week, previous_week, month, daily, top, unique_customers, repeat_customers) = tokio::try_join!(
        db::get_sales_stats(pool, week_start),
        db::get_sales_stats_between(pool, previous_week_start, week_start),
        db::get_sales_stats(pool, month_start),
        db::get_daily_sales(pool, week_start, utc_offset_hours),
        db::get_top_products(pool, week_start, 5),
        db::get_unique_customers(pool, week_start),
        db::get_repeat_customers(pool, week_start),
    )?;
    Ok(WeeklyReportData {
        week,
        previous_week,
        month,
        daily,
        top,
        unique_customers,
        repeat_customers,
    })
}

pub fn weekly_report(data: &WeeklyReportData, now: DateTime<Utc>, utc_offset_hours: i32) -> String {
    let local = business_now(now, utc_offset_hours);
    let from = business_now(now - Duration::days(7), utc_offset_hours);
    let mut text = format!(
        "📆 <b>WEEKLY REPORT</b>\n{} - {}\n{RULE}\n\n",
        from.format("%d %b"),
        local.format("%d %b %Y")
    );
    let _ = writeln!(
        text,
        "💰 Revenue: <b>{}</b> {}",
        format_money(data.week.revenue),
        trend(data.week.revenue, data.previous_week.revenue)
    );
    let _ = writeln!(
        text,
        "🧾 Orders: <b>{}</b> {}",
        data.week.order_count,
        trend(data.week.order_count as f64, data.previous_week.order_count as f64)
    );
    let _ = writeln!(text, "📊 Avg order: {}", format_money(data.week.avg_order));
    let _ = writeln!(
        text,
        "👥 Customers: {} ({} repeat)",
        data.unique_customers, data.repeat_customers
    );

    if let Some(best) = data
        .daily
        .iter()
        .max_by(|a, b| a.revenue.total_cmp(&b.revenue))
    {
        let _ = writeln!(
            text,
            "⭐ Best day: {} ({})",
            best.day.format("%A"),
            format_money(best.revenue)
        );
    }

    let _ = writeln!(
        text,
        "\n🗓️ Last 30 days: {} from {} orders",
        format_money(data.month.revenue),
        data.month.order_count
    );

    if !data.top.is_empty() {
        text.push_str("\n🏆 <b>TOP PRODUCTS THIS WEEK</b>\n");
        for (i, product) in data.top.iter().enumerate() {
            let _ = writeln!(
                text,
                "{}. {}: {} sold · {}",
                i + 1,
                esc(&product.product_name),
                product.units,
                format_money(product.revenue)
            );
        }
    }
    text.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn order() -> Order {
        Order {
            id: 42,
            order_id: Some("NG-1042".into()),
            customer_name: Some("Rahim <Uddin>".into()),
            phone: Some("01711222333".into()),
            address: Some("Dhanmondi, Dhaka".into()),
            product_name: Some("Classic Panjabi".into()),
            quantity: 2,
            total_price: 2450.0,
            status: Some("shipped".into()),
            delivery_status: Some("In transit".into()),
            payment_status: Some("paid".into()),
            payment_method: Some("bKash".into()),
            customer_email: None,
            coupon_code: Some("EID20".into()),
            discount_amount: 150.0,
            created_at: Some(Utc.with_ymd_and_hms(2024, 3, 10, 18, 30, 0).unwrap()),
        }
    }

    #[test]
    fn test_format_money_groups_thousands() {
        assert_eq!(format_money(0.0), "৳0");
        assert_eq!(format_money(999.4), "৳999");
        assert_eq!(format_money(1234567.0), "৳1,234,567");
        assert_eq!(format_money(-1500.0), "-৳1,500");
        assert_eq!(format_count(1000), "1,000");
    }

    #[test]
    fn test_trend_markers() {
        assert_eq!(trend(120.0, 100.0), "📈 +20%");
        assert_eq!(trend(50.0, 100.0), "📉 -50%");
        assert_eq!(trend(100.0, 100.0), "➖ 0%");
        assert_eq!(trend(10.0, 0.0), "🆕");
        assert_eq!(trend(0.0, 0.0), "➖");
    }

    #[test]
    fn test_business_day_start_uses_offset() {
        // 20:00 UTC on the 10th is 02:00 on the 11th in UTC+6
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 20, 0, 0).unwrap();
        let start = business_day_start(now, 6);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 10, 18, 0, 0).unwrap());
        assert_eq!(business_day_start(now, 0), Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_order_details_escapes_and_shows_status() {
        let text = order_details(&order(), 6);
        assert!(text.contains("NG-1042"));
        assert!(text.contains("Rahim &lt;Uddin&gt;"));
        assert!(text.contains("🚚 <b>Shipped</b>"));
        assert!(text.contains("Discount: ৳150 (EID20)"));
        assert!(text.contains("✅ PAID"));
        assert!(text.contains(OrderStatus::Shipped.next_step()));
        assert!(text.contains("11 Mar 2024, 12:30 AM"));
    }

    #[test]
    fn test_new_order_alert_layout() {
        let text = new_order_alert(&order(), 6);
        assert!(text.starts_with("🎉 <b>NEW ORDER!</b>"));
        assert!(text.contains("Dhanmondi, Dhaka"));
        assert!(text.contains("💰 <b>Total:</b> ৳2,450"));
        assert!(text.contains("EID20 (-৳150)"));
    }

    #[test]
    fn test_orders_list_empty() {
        assert!(orders_list("Recent", &[], 6).contains("No orders found."));
        let text = orders_list("Recent", &[order()], 6);
        assert!(text.contains("Showing 1 order(s)"));
    }

    #[test]
    fn test_products_context_marks_stock() {
        let products = vec![
            Product {
                id: 1,
                name: "Hoodie".into(),
                price: 1800.0,
                stock_quantity: Some(3),
                category: Some("Winter".into()),
                is_active: true,
                is_featured: false,
            },
            Product {
                id: 0,
                name: "Tee".into(),
                price: 650.0,
                stock_quantity: None,
                category: None,
                is_active: true,
                is_featured: false,
            },
        ];
        let ctx = products_context(&products);
        assert!(ctx.starts_with("AVAILABLE PRODUCTS (2):"));
        assert!(ctx.contains("- Hoodie: ৳1,800 | ⚠️ Low Stock | stock 3 [Winter]"));
        assert!(ctx.contains("- Tee: ৳650 | ℹ️ Ask for availability\n"));
        assert!(low_stock_context(&products[..1]).contains("Hoodie: Only 3 left"));
    }

    #[test]
    fn test_weekly_report_picks_best_day() {
        let data = WeeklyReportData {
            week: SalesStats { order_count: 4, revenue: 4000.0, avg_order: 1000.0 },
            previous_week: SalesStats { order_count: 2, revenue: 2000.0, avg_order: 1000.0 },
            daily: vec![
                DailyRevenue { day: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(), orders: 1, revenue: 500.0 },
                DailyRevenue { day: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(), orders: 3, revenue: 3500.0 },
            ],
            ..WeeklyReportData::default()
        };
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let text = weekly_report(&data, now, 6);
        assert!(text.contains("📈 +100%"));
        assert!(text.contains("Best day: Tuesday (৳3,500)"));
    }

    #[test]
    fn test_admins_list_skips_env_duplicates() {
        let records = vec![
            AdminRecord { user_id: 1, username: Some("owner".into()), added_by: None, is_super: true, created_at: None },
            AdminRecord { user_id: 2, username: None, added_by: Some(1), is_super: false, created_at: None },
        ];
        let text = admins_list(&records, &[1]);
        assert_eq!(text.matches("<code>1</code>").count(), 1);
        assert!(text.contains("👤 <code>2</code>"));
    }

    fn coupon(min_order: Option<f64>) -> Coupon {
        Coupon {
            code: "eid20".into(),
            discount_type: "percentage".into(),
            discount_value: 20.0,
            min_order_value: min_order,
            max_discount_amount: None,
            usage_limit: None,
            usage_count: 0,
            expires_at: None,
            is_active: true,
        }
    }

    #[test]
    fn test_coupon_check_adds_delivery() {
        let c = coupon(None);
        let text = coupon_check(&c, 1500.0, &c.validate(1500.0, Utc::now()));
        assert!(text.contains("COUPON EID20"));
        assert!(text.contains("Discount: ৳300"));
        assert!(text.contains("Subtotal: <b>৳1,200</b>"));
        // Free inside Dhaka above ৳1,000, charged outside below ৳2,000
        assert!(text.contains("Inside Dhaka: ৳1,200 (free delivery)"));
        assert!(text.contains("Outside Dhaka: ৳1,320 (৳120 delivery)"));
    }

    #[test]
    fn test_coupon_check_reports_rejection() {
        let c = coupon(Some(2000.0));
        let text = coupon_check(&c, 1500.0, &c.validate(1500.0, Utc::now()));
        assert!(text.contains("❌ Order amount is below the coupon minimum"));
        assert!(!text.contains("With delivery"));
    }

    #[test]
    fn test_customer_profile_layout() {
        let now = Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap();
        let summary = CustomerSummary {
            customer_name: Some("Rahim <Uddin>".into()),
            phone: "01711222333".into(),
            order_count: 3,
            total_spent: 16_000.0,
            last_order: Some(Utc.with_ymd_and_hms(2024, 3, 10, 18, 30, 0).unwrap()),
        };
        let profile = CustomerProfile::new(summary, Some("Classic Panjabi".into()), vec![order()], now);
        let text = customer_profile(&profile, 6);
        assert!(text.starts_with("🥇"));
        assert!(text.contains("Rahim &lt;Uddin&gt;"));
        assert!(text.contains("Tier: <b>Gold</b>"));
        assert!(text.contains("Loyalty points: <b>160</b>"));
        assert!(text.contains("Address:</b> Dhanmondi, Dhaka"));
        assert!(text.contains("🟢 Status: Active"));
        assert!(text.contains("NG-1042"));
    }

    #[test]
    fn test_customers_list_ranks() {
        let customers: Vec<CustomerSummary> = (0..4)
            .map(|i| CustomerSummary {
                customer_name: Some(format!("Customer {i}")),
                phone: format!("0171122233{i}"),
                order_count: 4 - i,
                total_spent: 1000.0 * (4 - i) as f64,
                last_order: None,
            })
            .collect();
        let text = customers_list("Top Customers", &customers, 6);
        assert!(text.contains("🥇 <b>Customer 0</b>"));
        assert!(text.contains("🥉 <b>Customer 2</b>"));
        assert!(text.contains("4. <b>Customer 3</b>"));
        assert!(customers_list("Inactive", &[], 6).contains("No customer data"));
    }
}
