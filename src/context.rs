//! # Context Builder Module
//!
//! Assembles the system context sent ahead of every AI prompt: live
//! database figures, storefront metadata, business policies and role
//! instructions. Blocks built from live data are cached for the configured
//! TTL; fallback blocks are rebuilt on the next request.

use std::time::Duration;

use chrono::Utc;
use sqlx::postgres::PgPool;
use tracing::{debug, error, info, warn};

use crate::business::{full_policy_text, AI_GUIDELINES};
use crate::cache::{CacheStats, TtlCache};
use crate::config::AppConfig;
use crate::db;
use crate::dialogue::AiMode;
use crate::reports;
use crate::scrape::{self, ScrapeError};

const DATABASE_KEY: &str = "database_context";
const WEBSITE_KEY: &str = "website_context";
const PRODUCTS_IN_CONTEXT: i64 = 50;

const BASE_PERSONA: &str = "\
You are a helpful customer service AI assistant for Nongor Premium,
a premium clothing e-commerce brand in Bangladesh.

Your goal is to help customers with:
- Product information and recommendations
- Size guidance based on their measurements
- Order tracking and status
- Business policies (delivery, returns, payments)
- General inquiries
";

const ADMIN_INSTRUCTIONS: &str = "\
ADMIN CAPABILITIES:
- Provide sales analysis and insights
- Suggest inventory restocking priorities
- Analyze customer trends
- Generate business reports
- Offer marketing suggestions based on data

INSTRUCTIONS:
- Use actual data from the database above
- Provide specific numbers when available
- Offer actionable business insights
- Help with strategic decisions
- Be analytical and data-driven
";

const USER_INSTRUCTIONS: &str = "\
USER MODE INSTRUCTIONS:
- Be friendly, warm, and helpful
- Use appropriate emojis to seem approachable
- Provide accurate product information from database
- Help users track orders by phone or order ID
- Give sizing recommendations when asked
- Explain policies clearly
- If unsure, offer to connect with human support
- Keep responses concise but informative
- Never make up information - be honest if unavailable
";

pub const DATABASE_UNAVAILABLE: &str = "\
DATABASE INFO:
⚠️ Unable to fetch live data. Using cached information.
Please check database connection.
";

fn full_context_key(mode: AiMode) -> String {
    format!("full_context_{}", mode.role())
}

pub struct ContextBuilder {
    pool: PgPool,
    http: reqwest::Client,
    cache: TtlCache<String>,
    website_url: String,
    scraping_enabled: bool,
    website_timeout: Duration,
    low_stock_threshold: i32,
    utc_offset_hours: i32,
}

impl ContextBuilder {
    pub fn new(pool: PgPool, http: reqwest::Client, config: &AppConfig) -> Self {
        Self {
            pool,
            http,
            cache: TtlCache::new(Duration::from_secs(config.context_cache_secs)),
            website_url: config.website_url.clone(),
            scraping_enabled: config.enable_web_scraping,
            website_timeout: Duration::from_secs(config.monitor.timeout_secs),
            low_stock_threshold: config.low_stock_threshold,
            utc_offset_hours: config.reports.utc_offset_hours,
        }
    }

    async fn load_database_context(&self) -> anyhow::Result<String> {
        let now = Utc::now();
        let day_start = reports::business_day_start(now, self.utc_offset_hours);
        let week_start = now - chrono::Duration::days(7);
        let month_start = now - chrono::Duration::days(30);

        let (products, today, week, top, low_stock) = tokio::try_join!(
            db::get_available_products(&self.pool, PRODUCTS_IN_CONTEXT),
            db::get_sales_stats(&self.pool, day_start),
            db::get_sales_stats(&self.pool, week_start),
            db::get_top_products(&self.pool, month_start, 5),
            db::get_low_stock_products(&self.pool, self.low_stock_threshold, 5),
        )?;

        Ok(format!(
            "DATABASE INFO (Live Data):\n\n{}\n{}\n{}\n{}",
            reports::products_context(&products),
            reports::stats_context(&today, &week),
            reports::top_products_context(&top),
            reports::low_stock_context(&low_stock)
        ))
    }

    /// Live catalogue and sales block; failures are reported inline and not cached
    pub async fn database_context(&self) -> String {
        self.database_block().await.0
    }

    /// The block plus whether it holds live data worth caching
    async fn database_block(&self) -> (String, bool) {
        if let Some(cached) = self.cache.get(DATABASE_KEY) {
            debug!("Database context served from cache");
            return (cached, true);
        }

        match self.load_database_context().await {
            Ok(context) => {
                self.cache.set(DATABASE_KEY, context.clone());
                (context, true)
            }
            Err(e) => {
                error!(error = %e, "Error fetching database context");
                (DATABASE_UNAVAILABLE.to_string(), false)
            }
        }
    }

    /// Storefront metadata; fallback blocks are served but never cached
    pub async fn website_context(&self) -> String {
        self.website_block().await.0
    }

    async fn website_block(&self) -> (String, bool) {
        if !self.scraping_enabled {
            return (scrape::disabled_context(), true);
        }
        if let Some(cached) = self.cache.get(WEBSITE_KEY) {
            return (cached, true);
        }

        match scrape::fetch_metadata(&self.http, &self.website_url, self.website_timeout).await {
            Ok(metadata) => {
                let context = metadata.to_context(&self.website_url);
                self.cache.set(WEBSITE_KEY, context.clone());
                (context, true)
            }
            Err(ScrapeError::Timeout) => {
                warn!(url = %self.website_url, "Website scraping timed out");
                (scrape::slow_site_context(&self.website_url), false)
            }
            Err(e) => {
                warn!(url = %self.website_url, error = %e, "Website scraping failed");
                (scrape::unavailable_site_context(&self.website_url), false)
            }
        }
    }

    /// Executive figures appended to admin prompts
    pub async fn admin_snapshot(&self) -> String {
        match reports::load_dashboard(&self.pool, Utc::now(), self.utc_offset_hours, self.low_stock_threshold).await {
            Ok(data) => reports::admin_snapshot_context(&data),
            Err(e) => {
                error!(error = %e, "Error building admin snapshot");
                String::new()
            }
        }
    }

    /// Complete system context for the given chat mode
    pub async fn full_context(&self, mode: AiMode) -> String {
        let key = full_context_key(mode);
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }
        let purged = self.cache.purge_expired();
        if purged > 0 {
            debug!(purged, "Expired context entries purged");
        }

        let ((database, database_live), (website, website_live)) =
            tokio::join!(self.database_block(), self.website_block());
        let policies = full_policy_text();

        let context = match mode {
            AiMode::Analyst => {
                let snapshot = self.admin_snapshot().await;
                format!(
                    "{BASE_PERSONA}\nYou are in ADMIN MODE. You have access to business analytics and can provide\n\
                     insights about sales, inventory, and customer behavior.\n\n\
                     {database}\n{snapshot}\n{website}\n{policies}\n{ADMIN_INSTRUCTIONS}"
                )
            }
            AiMode::Customer => {
                format!("{BASE_PERSONA}\n{database}\n{website}\n{policies}\n{AI_GUIDELINES}\n{USER_INSTRUCTIONS}")
            }
        };

        if database_live && website_live {
            self.cache.set(key, context.clone());
        }
        context
    }

    /// Drop every cached block, returning how many were removed
    pub fn clear(&self) -> usize {
        let removed = self.cache.clear();
        info!(removed, "Context cache cleared");
        removed
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
