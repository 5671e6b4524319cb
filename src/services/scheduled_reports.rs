//! Daily and weekly admin reports on a wall-clock schedule.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Timelike, Utc};
use sqlx::postgres::PgPool;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::notifier::{AdminNotifier, DeliveryReport};
use crate::chart;
use crate::config::ReportSchedule;
use crate::db;
use crate::localization::t;
use crate::reports;

pub const TICK: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Daily,
    Weekly,
}

impl ReportKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "daily" | "day" => Some(ReportKind::Daily),
            "weekly" | "week" => Some(ReportKind::Weekly),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ReportKind::Daily => "daily",
            ReportKind::Weekly => "weekly",
        }
    }
}

/// Which reports should go out at local time `now`
pub fn due_reports(
    now: DateTime<FixedOffset>,
    last_daily: Option<NaiveDate>,
    last_weekly: Option<NaiveDate>,
    schedule: &ReportSchedule,
) -> Vec<ReportKind> {
    let today = now.date_naive();
    let mut due = Vec::new();
    if now.hour() != schedule.daily_hour {
        return due;
    }
    if last_daily.map_or(true, |last| last < today) {
        due.push(ReportKind::Daily);
    }
    let weekday_matches = now.weekday().num_days_from_monday() == schedule.weekly_day;
    if weekday_matches && last_weekly.map_or(true, |last| (today - last).num_days() >= 6) {
        due.push(ReportKind::Weekly);
    }
    due
}

#[derive(Debug, Default)]
struct ScheduleState {
    last_daily: Option<NaiveDate>,
    last_weekly: Option<NaiveDate>,
    reports_sent: u64,
}

pub struct ScheduledReports {
    pool: PgPool,
    notifier: Arc<AdminNotifier>,
    schedule: ReportSchedule,
    low_stock_threshold: i32,
    state: Mutex<ScheduleState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ScheduledReports {
    pub fn new(pool: PgPool, notifier: Arc<AdminNotifier>, schedule: ReportSchedule, low_stock_threshold: i32) -> Self {
        Self {
            pool,
            notifier,
            schedule,
            low_stock_threshold,
            state: Mutex::new(ScheduleState::default()),
            task: Mutex::new(None),
        }
    }

    fn state(&self) -> MutexGuard<'_, ScheduleState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_running(&self) -> bool {
        self.task().as_ref().is_some_and(|handle| !handle.is_finished())
    }

    pub fn reports_sent(&self) -> u64 {
        self.state().reports_sent
    }

    pub fn start(self: &Arc<Self>) -> bool {
        let mut task = self.task();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }
        let this = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TICK);
            loop {
                ticker.tick().await;
                this.tick(Utc::now()).await;
            }
        }));
        info!(
            daily_hour = self.schedule.daily_hour,
            weekly_day = self.schedule.weekly_day,
            utc_offset_hours = self.schedule.utc_offset_hours,
            "Scheduled reports started"
        );
        true
    }

    pub fn stop(&self) -> bool {
        match self.task().take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    async fn tick(&self, now: DateTime<Utc>) {
        let local = reports::business_now(now, self.schedule.utc_offset_hours);
        let due = {
            let state = self.state();
            due_reports(local, state.last_daily, state.last_weekly, &self.schedule)
        };

        for kind in due {
            match self.send_now(kind).await {
                Ok(_) => {
                    let mut state = self.state();
                    match kind {
                        ReportKind::Daily => state.last_daily = Some(local.date_naive()),
                        ReportKind::Weekly => state.last_weekly = Some(local.date_naive()),
                    }
                }
                Err(e) => error!(report = kind.name(), error = %e, "Scheduled report failed"),
            }
        }
    }

    /// Build the report text and its chart (if any)
    pub async fn render(&self, kind: ReportKind, now: DateTime<Utc>) -> Result<(String, Option<Vec<u8>>)> {
        let offset = self.schedule.utc_offset_hours;
        match kind {
            ReportKind::Daily => {
                let data = reports::load_daily_report(&self.pool, now, offset, self.low_stock_threshold).await?;
                let week = db::get_daily_sales(&self.pool, now - chrono::Duration::days(7), offset).await?;
                Ok((reports::daily_report(&data, now, offset), chart::sales_chart_png(&week)?))
            }
            ReportKind::Weekly => {
                let data = reports::load_weekly_report(&self.pool, now, offset).await?;
                Ok((reports::weekly_report(&data, now, offset), chart::sales_chart_png(&data.daily)?))
            }
        }
    }

    /// Send a report to every admin immediately
    pub async fn send_now(&self, kind: ReportKind) -> Result<DeliveryReport> {
        let (text, png) = self.render(kind, Utc::now()).await?;
        let delivery = self.notifier.notify(&text).await;
        if let Some(png) = png {
            self.notifier.notify_photo(&png, &t("chart-caption")).await;
        }
        self.state().reports_sent += 1;
        info!(report = kind.name(), sent = delivery.sent, failed = delivery.failed, "Report delivered");
        Ok(delivery)
    }
}
