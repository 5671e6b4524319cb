//! Shared application state handed to every handler.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPool;
use teloxide::Bot;

use crate::admin::AdminRegistry;
use crate::audit::AuditLog;
use crate::config::AppConfig;
use crate::context::ContextBuilder;
use crate::gemini::GeminiClient;
use crate::services::{AdminNotifier, OrderAlerts, ScheduledReports, WebsiteMonitor};
use crate::session::SessionRegistry;

pub struct AppState {
    pub config: AppConfig,
    pub pool: PgPool,
    pub context: ContextBuilder,
    pub gemini: GeminiClient,
    pub sessions: SessionRegistry,
    pub admins: Arc<AdminRegistry>,
    pub audit: AuditLog,
    pub notifier: Arc<AdminNotifier>,
    pub order_alerts: Arc<OrderAlerts>,
    pub monitor: Arc<WebsiteMonitor>,
    pub reports: Arc<ScheduledReports>,
}

impl AppState {
    pub fn new(config: AppConfig, pool: PgPool, bot: Bot) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.recovery.operation_timeout_secs))
            .build()?;

        let admins = Arc::new(AdminRegistry::new(
            pool.clone(),
            config.admin_user_ids.clone(),
            config.super_admin_id,
        ));
        let notifier = Arc::new(AdminNotifier::new(bot, Arc::clone(&admins)));
        let offset = config.reports.utc_offset_hours;

        let audit_file = (!config.audit_log_file.is_empty()).then(|| PathBuf::from(&config.audit_log_file));

        Ok(Self {
            context: ContextBuilder::new(pool.clone(), http.clone(), &config),
            gemini: GeminiClient::new(
                config.gemini_api_key.clone(),
                config.gemini_model.clone(),
                config.gemini_fallback_model.clone(),
                config.recovery.clone(),
            )?,
            sessions: SessionRegistry::new(),
            audit: AuditLog::new(audit_file),
            order_alerts: Arc::new(OrderAlerts::new(
                pool.clone(),
                Arc::clone(&notifier),
                Duration::from_secs(config.order_poll_interval_secs),
                offset,
            )),
            monitor: Arc::new(WebsiteMonitor::new(
                http,
                config.monitor.clone(),
                Arc::clone(&notifier),
                offset,
            )),
            reports: Arc::new(ScheduledReports::new(
                pool.clone(),
                Arc::clone(&notifier),
                config.reports,
                config.low_stock_threshold,
            )),
            admins,
            notifier,
            pool,
            config,
        })
    }

    pub fn is_admin(&self, user_id: u64) -> bool {
        self.admins.is_admin(user_id)
    }

    pub fn utc_offset(&self) -> i32 {
        self.config.reports.utc_offset_hours
    }

    /// Start every background loop
    pub fn start_services(&self) {
        self.order_alerts.start();
        self.monitor.start();
        self.reports.start();
    }

    pub fn stop_services(&self) {
        self.order_alerts.stop();
        self.monitor.stop();
        self.reports.stop();
    }
}
