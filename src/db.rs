//! # Database Module
//!
//! Thin query layer over the storefront's PostgreSQL database. Every
//! operation is a single parameterized statement; `orders`, `products` and
//! `coupons` are owned by the storefront, `users` and `admins` by the bot.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};

use crate::business::OrderStatus;
use crate::models::{
    AdminRecord, Coupon, CustomerSummary, DailyRevenue, InventorySummary, Order, PaymentMethodStat, Product,
    SalesStats, StatusCount, TopProduct, UserStats,
};

macro_rules! order_select {
    () => {
        "SELECT id::bigint AS id, order_id::text AS order_id, customer_name::text AS customer_name, \
         phone::text AS phone, address::text AS address, product_name::text AS product_name, \
         COALESCE(quantity, 1)::int AS quantity, COALESCE(total_price, 0)::float8 AS total_price, \
         status::text AS status, delivery_status::text AS delivery_status, \
         payment_status::text AS payment_status, payment_method::text AS payment_method, \
         customer_email::text AS customer_email, coupon_code::text AS coupon_code, \
         COALESCE(discount_amount, 0)::float8 AS discount_amount, \
         created_at::timestamptz AS created_at FROM orders"
    };
}

macro_rules! product_select {
    () => {
        "SELECT id::bigint AS id, name::text AS name, COALESCE(price, 0)::float8 AS price, \
         stock_quantity::int AS stock_quantity, category::text AS category, \
         COALESCE(is_active, TRUE) AS is_active, COALESCE(is_featured, FALSE) AS is_featured \
         FROM products"
    };
}

macro_rules! coupon_select {
    () => {
        "SELECT code::text AS code, COALESCE(discount_type, 'fixed')::text AS discount_type, \
         COALESCE(discount_value, 0)::float8 AS discount_value, \
         min_order_value::float8 AS min_order_value, \
         max_discount_amount::float8 AS max_discount_amount, usage_limit::int AS usage_limit, \
         COALESCE(usage_count, 0)::int AS usage_count, expires_at::timestamptz AS expires_at, \
         COALESCE(is_active, TRUE) AS is_active FROM coupons"
    };
}

macro_rules! not_cancelled {
    () => {
        "LOWER(COALESCE(status, '')) <> 'cancelled'"
    };
}

/// Last ten digits of the stored phone, so `+880 1711-222333` and `01711222333` match
macro_rules! phone_key_sql {
    () => {
        "RIGHT(regexp_replace(COALESCE(phone, ''), '\\D', '', 'g'), 10)"
    };
}

macro_rules! customer_select {
    () => {
        concat!(
            "SELECT MAX(customer_name)::text AS customer_name, MAX(phone)::text AS phone, \
             COUNT(*)::bigint AS order_count, COALESCE(SUM(total_price), 0)::float8 AS total_spent, \
             MAX(created_at)::timestamptz AS last_order FROM orders WHERE ",
            not_cancelled!(),
            " AND ",
            phone_key_sql!(),
            " <> ''"
        )
    };
}

/// Open the shared connection pool
pub async fn connect(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL");
    PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
        .context("Failed to connect to database")
}

pub async fn test_connection(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .context("Database connection check failed")?;
    Ok(())
}

/// Create the tables the bot owns; storefront tables are left alone
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing bot-owned database tables...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            user_id BIGINT PRIMARY KEY,
            username TEXT,
            first_name TEXT,
            last_seen TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create users table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS admins (
            user_id BIGINT PRIMARY KEY,
            username TEXT,
            added_by BIGINT,
            is_super BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create admins table")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Keep only the digits of a phone number
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Last ten digits, which identify a Bangladeshi mobile regardless of `+880`/`0` prefix
fn phone_key(raw: &str) -> String {
    let digits = normalize_phone(raw);
    let skip = digits.len().saturating_sub(10);
    digits[skip..].to_string()
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

pub async fn get_order_by_id(pool: &PgPool, id: i64) -> Result<Option<Order>> {
    debug!(order_pk = id, "Fetching order by primary key");
    sqlx::query_as::<_, Order>(concat!(order_select!(), " WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch order by id")
}

/// Look up an order by its display id, accepting it with or without the leading `#`
pub async fn get_order_by_order_id(pool: &PgPool, order_id: &str) -> Result<Option<Order>> {
    let bare = order_id.trim().trim_start_matches('#');
    debug!(order_id = %bare, "Fetching order by display id");
    sqlx::query_as::<_, Order>(concat!(
        order_select!(),
        " WHERE UPPER(TRIM(LEADING '#' FROM order_id)) = UPPER($1) ORDER BY id DESC LIMIT 1"
    ))
    .bind(bare)
    .fetch_optional(pool)
    .await
    .context("Failed to fetch order by order_id")
}

/// Resolve free-form order input: display id first, then the numeric key
pub async fn find_order(pool: &PgPool, input: &str) -> Result<Option<Order>> {
    if let Some(order) = get_order_by_order_id(pool, input).await? {
        return Ok(Some(order));
    }

    let digits = normalize_phone(input);
    match digits.parse::<i64>() {
        Ok(id) if !digits.is_empty() && digits.len() <= 9 => get_order_by_id(pool, id).await,
        _ => Ok(None),
    }
}

pub async fn get_orders_by_phone(pool: &PgPool, phone: &str, limit: i64) -> Result<Vec<Order>> {
    let key = phone_key(phone);
    debug!(phone_suffix = %key, "Fetching orders by phone");
    sqlx::query_as::<_, Order>(concat!(
        order_select!(),
        " WHERE ",
        phone_key_sql!(),
        " = $1 ORDER BY created_at DESC NULLS LAST, id DESC LIMIT $2"
    ))
    .bind(key)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to fetch orders by phone")
}

pub async fn get_latest_order_by_phone(pool: &PgPool, phone: &str) -> Result<Option<Order>> {
    Ok(get_orders_by_phone(pool, phone, 1).await?.into_iter().next())
}

/// Case-insensitive search over order id, customer name, phone and email
pub async fn search_orders(pool: &PgPool, term: &str, limit: i64) -> Result<Vec<Order>> {
    let pattern = format!("%{}%", term.trim());
    info!(term = %term, "Searching orders");
    sqlx::query_as::<_, Order>(concat!(
        order_select!(),
        " WHERE order_id ILIKE $1 OR customer_name ILIKE $1 OR phone ILIKE $1 \
          OR customer_email ILIKE $1 ORDER BY created_at DESC NULLS LAST, id DESC LIMIT $2"
    ))
    .bind(pattern)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to search orders")
}

pub async fn get_recent_orders(pool: &PgPool, limit: i64) -> Result<Vec<Order>> {
    sqlx::query_as::<_, Order>(concat!(
        order_select!(),
        " ORDER BY created_at DESC NULLS LAST, id DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to fetch recent orders")
}

pub async fn get_orders_by_status(
    pool: &PgPool,
    status: OrderStatus,
    limit: i64,
) -> Result<Vec<Order>> {
    sqlx::query_as::<_, Order>(concat!(
        order_select!(),
        " WHERE LOWER(COALESCE(status, 'pending')) = LOWER($1) \
          ORDER BY created_at DESC NULLS LAST, id DESC LIMIT $2"
    ))
    .bind(status.label())
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to fetch orders by status")
}

/// All orders for export, newest first
pub async fn get_all_orders(pool: &PgPool, limit: i64) -> Result<Vec<Order>> {
    info!(limit, "Fetching orders for export");
    sqlx::query_as::<_, Order>(concat!(order_select!(), " ORDER BY id DESC LIMIT $1"))
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to fetch orders for export")
}

/// Highest order key, 0 when the table is empty
pub async fn get_latest_order_id(pool: &PgPool) -> Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COALESCE(MAX(id), 0)::bigint FROM orders")
        .fetch_one(pool)
        .await
        .context("Failed to fetch latest order id")
}

/// Orders inserted after `last_id`, oldest first
pub async fn get_orders_after(pool: &PgPool, last_id: i64, limit: i64) -> Result<Vec<Order>> {
    sqlx::query_as::<_, Order>(concat!(order_select!(), " WHERE id > $1 ORDER BY id ASC LIMIT $2"))
        .bind(last_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to poll for new orders")
}

/// Admin status change; returns whether an order was updated
pub async fn update_order_status(pool: &PgPool, id: i64, status: OrderStatus) -> Result<bool> {
    info!(order_pk = id, status = %status, "Updating order status");
    let result = sqlx::query("UPDATE orders SET status = $1 WHERE id = $2")
        .bind(status.label())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update order status")?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_status_counts(pool: &PgPool) -> Result<Vec<StatusCount>> {
    sqlx::query_as::<_, StatusCount>(
        "SELECT status::text AS status, COUNT(*)::bigint AS count FROM orders \
         GROUP BY status ORDER BY count DESC",
    )
    .fetch_all(pool)
    .await
    .context("Failed to fetch status breakdown")
}

pub async fn get_pending_orders_count(pool: &PgPool) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*)::bigint FROM orders WHERE LOWER(COALESCE(status, 'pending')) = 'pending'",
    )
    .fetch_one(pool)
    .await
    .context("Failed to count pending orders")
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// Some storefront deployments keep no products table at all
pub async fn products_table_exists(pool: &PgPool) -> Result<bool> {
    sqlx::query_scalar::<_, bool>("SELECT to_regclass('public.products') IS NOT NULL")
        .fetch_one(pool)
        .await
        .context("Failed to probe for products table")
}

/// Products derived from order history when no catalogue table exists
async fn get_products_from_orders(pool: &PgPool, limit: i64) -> Result<Vec<Product>> {
    sqlx::query_as::<_, Product>(
        "SELECT (ROW_NUMBER() OVER (ORDER BY COUNT(*) DESC))::bigint AS id, \
         product_name::text AS name, \
         COALESCE(AVG(total_price / NULLIF(quantity, 0)), 0)::float8 AS price, \
         NULL::int AS stock_quantity, NULL::text AS category, \
         TRUE AS is_active, FALSE AS is_featured \
         FROM orders WHERE product_name IS NOT NULL \
         GROUP BY product_name ORDER BY COUNT(*) DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to derive products from orders")
}

pub async fn get_available_products(pool: &PgPool, limit: i64) -> Result<Vec<Product>> {
    if !products_table_exists(pool).await? {
        debug!("No products table, deriving catalogue from orders");
        return get_products_from_orders(pool, limit).await;
    }

    sqlx::query_as::<_, Product>(concat!(
        product_select!(),
        " WHERE COALESCE(is_active, TRUE) ORDER BY is_featured DESC, name ASC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to fetch products")
}

pub async fn search_products(pool: &PgPool, term: &str, limit: i64) -> Result<Vec<Product>> {
    let pattern = format!("%{}%", term.trim());
    if !products_table_exists(pool).await? {
        let products = get_products_from_orders(pool, 200).await?;
        let needle = term.trim().to_lowercase();
        return Ok(products
            .into_iter()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect());
    }

    sqlx::query_as::<_, Product>(concat!(
        product_select!(),
        " WHERE COALESCE(is_active, TRUE) AND (name ILIKE $1 OR category ILIKE $1) \
          ORDER BY stock_quantity DESC NULLS LAST LIMIT $2"
    ))
    .bind(pattern)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to search products")
}

pub async fn get_featured_products(pool: &PgPool, limit: i64) -> Result<Vec<Product>> {
    if !products_table_exists(pool).await? {
        return Ok(Vec::new());
    }
    sqlx::query_as::<_, Product>(concat!(
        product_select!(),
        " WHERE COALESCE(is_active, TRUE) AND COALESCE(is_featured, FALSE) ORDER BY name LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to fetch featured products")
}

/// Products in stock but at or below `threshold` units
pub async fn get_low_stock_products(
    pool: &PgPool,
    threshold: i32,
    limit: i64,
) -> Result<Vec<Product>> {
    if !products_table_exists(pool).await? {
        return Ok(Vec::new());
    }
    sqlx::query_as::<_, Product>(concat!(
        product_select!(),
        " WHERE COALESCE(is_active, TRUE) AND stock_quantity > 0 AND stock_quantity <= $1 \
          ORDER BY stock_quantity ASC LIMIT $2"
    ))
    .bind(threshold)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to fetch low stock products")
}

pub async fn get_out_of_stock_products(pool: &PgPool, limit: i64) -> Result<Vec<Product>> {
    if !products_table_exists(pool).await? {
        return Ok(Vec::new());
    }
    sqlx::query_as::<_, Product>(concat!(
        product_select!(),
        " WHERE COALESCE(is_active, TRUE) AND COALESCE(stock_quantity, 0) <= 0 \
          ORDER BY name LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to fetch out of stock products")
}

pub async fn get_inventory_summary(pool: &PgPool, threshold: i32) -> Result<InventorySummary> {
    if !products_table_exists(pool).await? {
        return Ok(InventorySummary::default());
    }
    sqlx::query_as::<_, InventorySummary>(
        "SELECT COUNT(*)::bigint AS total_products, \
         COALESCE(SUM(GREATEST(stock_quantity, 0)), 0)::bigint AS total_units, \
         COUNT(*) FILTER (WHERE stock_quantity > 0 AND stock_quantity <= $1) AS low_stock, \
         COUNT(*) FILTER (WHERE COALESCE(stock_quantity, 0) <= 0) AS out_of_stock, \
         COALESCE(SUM(price * GREATEST(stock_quantity, 0)), 0)::float8 AS inventory_value \
         FROM products WHERE COALESCE(is_active, TRUE)",
    )
    .bind(threshold)
    .fetch_one(pool)
    .await
    .context("Failed to summarize inventory")
}

// ---------------------------------------------------------------------------
// Coupons
// ---------------------------------------------------------------------------

pub async fn get_all_coupons(pool: &PgPool, active_only: bool) -> Result<Vec<Coupon>> {
    sqlx::query_as::<_, Coupon>(concat!(
        coupon_select!(),
        " WHERE (NOT $1 OR COALESCE(is_active, TRUE)) ORDER BY expires_at ASC NULLS LAST, code"
    ))
    .bind(active_only)
    .fetch_all(pool)
    .await
    .context("Failed to fetch coupons")
}

pub async fn get_coupon_by_code(pool: &PgPool, code: &str) -> Result<Option<Coupon>> {
    sqlx::query_as::<_, Coupon>(concat!(coupon_select!(), " WHERE UPPER(code) = $1"))
        .bind(code.trim().to_uppercase())
        .fetch_optional(pool)
        .await
        .context("Failed to fetch coupon")
}

// ---------------------------------------------------------------------------
// Analytics (cancelled orders never count towards revenue)
// ---------------------------------------------------------------------------

pub async fn get_sales_stats(pool: &PgPool, since: DateTime<Utc>) -> Result<SalesStats> {
    sqlx::query_as::<_, SalesStats>(concat!(
        "SELECT COUNT(*)::bigint AS order_count, COALESCE(SUM(total_price), 0)::float8 AS revenue, \
         COALESCE(AVG(total_price), 0)::float8 AS avg_order FROM orders \
         WHERE created_at >= $1 AND ",
        not_cancelled!()
    ))
    .bind(since)
    .fetch_one(pool)
    .await
    .context("Failed to fetch sales stats")
}

/// Sales in the half-open window `[since, until)`
pub async fn get_sales_stats_between(
    pool: &PgPool,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<SalesStats> {
    sqlx::query_as::<_, SalesStats>(concat!(
        "SELECT COUNT(*)::bigint AS order_count, COALESCE(SUM(total_price), 0)::float8 AS revenue, \
         COALESCE(AVG(total_price), 0)::float8 AS avg_order FROM orders \
         WHERE created_at >= $1 AND created_at < $2 AND ",
        not_cancelled!()
    ))
    .bind(since)
    .bind(until)
    .fetch_one(pool)
    .await
    .context("Failed to fetch sales stats for window")
}

pub async fn get_top_products(
    pool: &PgPool,
    since: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<TopProduct>> {
    sqlx::query_as::<_, TopProduct>(concat!(
        "SELECT product_name::text AS product_name, COALESCE(SUM(quantity), 0)::bigint AS units, \
         COALESCE(SUM(total_price), 0)::float8 AS revenue FROM orders \
         WHERE created_at >= $1 AND product_name IS NOT NULL AND ",
        not_cancelled!(),
        " GROUP BY product_name ORDER BY units DESC, revenue DESC LIMIT $2"
    ))
    .bind(since)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to fetch top products")
}

/// Revenue per local calendar day, oldest first
pub async fn get_daily_sales(
    pool: &PgPool,
    since: DateTime<Utc>,
    utc_offset_hours: i32,
) -> Result<Vec<DailyRevenue>> {
    sqlx::query_as::<_, DailyRevenue>(concat!(
        "SELECT ((created_at::timestamptz AT TIME ZONE 'UTC') + make_interval(hours => $2))::date AS day, \
         COUNT(*)::bigint AS orders, COALESCE(SUM(total_price), 0)::float8 AS revenue \
         FROM orders WHERE created_at >= $1 AND ",
        not_cancelled!(),
        " GROUP BY day ORDER BY day ASC"
    ))
    .bind(since)
    .bind(utc_offset_hours)
    .fetch_all(pool)
    .await
    .context("Failed to fetch daily sales")
}

pub async fn get_payment_method_stats(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> Result<Vec<PaymentMethodStat>> {
    sqlx::query_as::<_, PaymentMethodStat>(concat!(
        "SELECT COALESCE(payment_method, 'Unknown')::text AS method, COUNT(*)::bigint AS count, \
         COALESCE(SUM(total_price), 0)::float8 AS revenue FROM orders \
         WHERE created_at >= $1 AND ",
        not_cancelled!(),
        " GROUP BY method ORDER BY count DESC"
    ))
    .bind(since)
    .fetch_all(pool)
    .await
    .context("Failed to fetch payment method stats")
}

pub async fn get_unique_customers(pool: &PgPool, since: DateTime<Utc>) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(DISTINCT phone)::bigint FROM orders WHERE created_at >= $1 AND phone IS NOT NULL",
    )
    .bind(since)
    .fetch_one(pool)
    .await
    .context("Failed to count unique customers")
}

pub async fn get_repeat_customers(pool: &PgPool, since: DateTime<Utc>) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*)::bigint FROM (SELECT phone FROM orders \
         WHERE created_at >= $1 AND phone IS NOT NULL GROUP BY phone HAVING COUNT(*) > 1) repeaters",
    )
    .bind(since)
    .fetch_one(pool)
    .await
    .context("Failed to count repeat customers")
}

// ---------------------------------------------------------------------------
// Customers (grouped by phone, cancelled orders excluded)
// ---------------------------------------------------------------------------

pub async fn get_customer_summary(pool: &PgPool, phone: &str) -> Result<Option<CustomerSummary>> {
    let key = phone_key(phone);
    debug!(phone_suffix = %key, "Fetching customer summary");
    sqlx::query_as::<_, CustomerSummary>(concat!(
        customer_select!(),
        " AND ",
        phone_key_sql!(),
        " = $1 GROUP BY ",
        phone_key_sql!()
    ))
    .bind(key)
    .fetch_optional(pool)
    .await
    .context("Failed to fetch customer summary")
}

/// Most ordered product of one customer
pub async fn get_favorite_product(pool: &PgPool, phone: &str) -> Result<Option<String>> {
    sqlx::query_scalar::<_, String>(concat!(
        "SELECT product_name::text FROM orders WHERE product_name IS NOT NULL AND ",
        not_cancelled!(),
        " AND ",
        phone_key_sql!(),
        " = $1 GROUP BY product_name ORDER BY COUNT(*) DESC, MAX(created_at) DESC NULLS LAST LIMIT 1"
    ))
    .bind(phone_key(phone))
    .fetch_optional(pool)
    .await
    .context("Failed to fetch favorite product")
}

pub async fn get_top_customers(pool: &PgPool, limit: i64) -> Result<Vec<CustomerSummary>> {
    sqlx::query_as::<_, CustomerSummary>(concat!(
        customer_select!(),
        " GROUP BY ",
        phone_key_sql!(),
        " ORDER BY total_spent DESC, order_count DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to fetch top customers")
}

/// Customers with at least `min_orders` orders, most loyal first
pub async fn get_returning_customers(pool: &PgPool, min_orders: i64, limit: i64) -> Result<Vec<CustomerSummary>> {
    sqlx::query_as::<_, CustomerSummary>(concat!(
        customer_select!(),
        " GROUP BY ",
        phone_key_sql!(),
        " HAVING COUNT(*) >= $1 ORDER BY order_count DESC, total_spent DESC LIMIT $2"
    ))
    .bind(min_orders)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to fetch returning customers")
}

/// Customers whose latest order is older than `cutoff`, biggest spenders first
pub async fn get_inactive_customers(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<CustomerSummary>> {
    sqlx::query_as::<_, CustomerSummary>(concat!(
        customer_select!(),
        " GROUP BY ",
        phone_key_sql!(),
        " HAVING MAX(created_at) < $1 ORDER BY total_spent DESC LIMIT $2"
    ))
    .bind(cutoff)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to fetch inactive customers")
}

// ---------------------------------------------------------------------------
// Bot users and admins
// ---------------------------------------------------------------------------

pub async fn save_user(
    pool: &PgPool,
    user_id: i64,
    username: Option<&str>,
    first_name: Option<&str>,
) -> Result<()> {
    debug!(user_id, "Saving bot user");
    sqlx::query(
        "INSERT INTO users (user_id, username, first_name, last_seen) \
         VALUES ($1, $2, $3, CURRENT_TIMESTAMP) \
         ON CONFLICT (user_id) DO UPDATE SET username = $2, first_name = $3, last_seen = CURRENT_TIMESTAMP",
    )
    .bind(user_id)
    .bind(username)
    .bind(first_name)
    .execute(pool)
    .await
    .context("Failed to save user")?;
    Ok(())
}

pub async fn get_user_stats(pool: &PgPool) -> Result<UserStats> {
    sqlx::query_as::<_, UserStats>(
        "SELECT COUNT(*)::bigint AS total_users, \
         COUNT(*) FILTER (WHERE last_seen > CURRENT_TIMESTAMP - INTERVAL '7 days') AS active_users \
         FROM users",
    )
    .fetch_one(pool)
    .await
    .context("Failed to fetch user stats")
}

pub async fn get_all_user_ids(pool: &PgPool) -> Result<Vec<i64>> {
    sqlx::query_scalar::<_, i64>("SELECT user_id FROM users ORDER BY user_id")
        .fetch_all(pool)
        .await
        .context("Failed to fetch user ids")
}

pub async fn list_admins(pool: &PgPool) -> Result<Vec<AdminRecord>> {
    sqlx::query_as::<_, AdminRecord>(
        "SELECT user_id, username, added_by, is_super, created_at FROM admins \
         ORDER BY is_super DESC, created_at ASC",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list admins")
}

/// Returns `true` when the user was not an admin before
pub async fn add_admin(
    pool: &PgPool,
    user_id: i64,
    username: Option<&str>,
    added_by: i64,
) -> Result<bool> {
    info!(user_id, added_by, "Adding admin");
    let result = sqlx::query(
        "INSERT INTO admins (user_id, username, added_by) VALUES ($1, $2, $3) \
         ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(username)
    .bind(added_by)
    .execute(pool)
    .await
    .context("Failed to add admin")?;
    Ok(result.rows_affected() == 1)
}

/// Super admins are never removed; returns whether a row was deleted
pub async fn remove_admin(pool: &PgPool, user_id: i64) -> Result<bool> {
    info!(user_id, "Removing admin");
    let result = sqlx::query("DELETE FROM admins WHERE user_id = $1 AND NOT is_super")
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to remove admin")?;
    Ok(result.rows_affected() > 0)
}

pub async fn seed_super_admin(pool: &PgPool, user_id: i64) -> Result<()> {
    info!(user_id, "Seeding super admin");
    sqlx::query(
        "INSERT INTO admins (user_id, is_super) VALUES ($1, TRUE) \
         ON CONFLICT (user_id) DO UPDATE SET is_super = TRUE",
    )
    .bind(user_id)
    .execute(pool)
    .await
    .context("Failed to seed super admin")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+880 1711-222333"), "8801711222333");
        assert_eq!(normalize_phone("#NG-123"), "123");
    }

    #[test]
    fn test_phone_key_ignores_country_prefix() {
        assert_eq!(phone_key("+8801711222333"), "1711222333");
        assert_eq!(phone_key("01711222333"), "1711222333");
        assert_eq!(phone_key("12345"), "12345");
    }
}
