//! New-order push alerts for admins.
//!
//! Polls the orders table for ids above the last one seen. The cursor lives
//! in memory only, so a restart skips orders placed while the bot was down
//! but never alerts the same order twice.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::notifier::AdminNotifier;
use crate::db;
use crate::reports::{self, RULE};

pub const INITIAL_DELAY: Duration = Duration::from_secs(10);
const BATCH_LIMIT: i64 = 50;
const MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertStatus {
    pub running: bool,
    pub last_seen_id: Option<i64>,
    pub total_alerts_sent: u64,
    pub last_check: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct AlertState {
    last_seen_id: Option<i64>,
    total_alerts_sent: u64,
    last_check: Option<DateTime<Utc>>,
}

pub struct OrderAlerts {
    pool: PgPool,
    notifier: Arc<AdminNotifier>,
    interval: Duration,
    utc_offset_hours: i32,
    state: Mutex<AlertState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl OrderAlerts {
    pub fn new(pool: PgPool, notifier: Arc<AdminNotifier>, interval: Duration, utc_offset_hours: i32) -> Self {
        Self {
            pool,
            notifier,
            interval: interval.max(MIN_INTERVAL),
            utc_offset_hours,
            state: Mutex::new(AlertState::default()),
            task: Mutex::new(None),
        }
    }

    fn state(&self) -> MutexGuard<'_, AlertState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_running(&self) -> bool {
        self.task().as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Spawn the polling loop; `false` if it was already running
    pub fn start(self: &Arc<Self>) -> bool {
        let mut task = self.task();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }
        let this = Arc::clone(self);
        *task = Some(tokio::spawn(async move { this.run().await }));
        info!(interval_secs = self.interval.as_secs(), "Order alerts started");
        true
    }

    /// Abort the polling loop; `false` if it was not running
    pub fn stop(&self) -> bool {
        match self.task().take() {
            Some(handle) => {
                handle.abort();
                info!("Order alerts stopped");
                true
            }
            None => false,
        }
    }

    async fn run(self: Arc<Self>) {
        tokio::time::sleep(INITIAL_DELAY).await;
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            match self.poll_once().await {
                Ok(0) => {}
                Ok(sent) => info!(sent, "New order alerts sent"),
                Err(e) => error!(error = %e, "Order alert poll failed"),
            }
        }
    }

    /// One polling step; returns the number of orders alerted
    pub async fn poll_once(&self) -> Result<usize> {
        let last_seen = self.state().last_seen_id;
        let Some(last_seen) = last_seen else {
            let latest = db::get_latest_order_id(&self.pool).await?;
            let mut state = self.state();
            state.last_seen_id = Some(latest);
            state.last_check = Some(Utc::now());
            info!(last_seen_id = latest, "Order alert cursor initialized");
            return Ok(0);
        };

        let orders = db::get_orders_after(&self.pool, last_seen, BATCH_LIMIT).await?;
        self.state().last_check = Some(Utc::now());
        if orders.is_empty() {
            debug!(last_seen_id = last_seen, "No new orders");
            return Ok(0);
        }

        let mut sent = 0;
        for order in &orders {
            let text = reports::new_order_alert(order, self.utc_offset_hours);
            let delivery = self.notifier.notify(&text).await;
            let mut state = self.state();
            state.last_seen_id = Some(advance_cursor(state.last_seen_id, order.id));
            if delivery.sent > 0 {
                state.total_alerts_sent += 1;
            }
            sent += 1;
        }
        Ok(sent)
    }

    pub fn status(&self) -> AlertStatus {
        let state = self.state();
        AlertStatus {
            running: self.is_running(),
            last_seen_id: state.last_seen_id,
            total_alerts_sent: state.total_alerts_sent,
            last_check: state.last_check,
        }
    }
}

/// The cursor only moves forward
pub fn advance_cursor(current: Option<i64>, seen: i64) -> i64 {
    current.map_or(seen, |c| c.max(seen))
}

pub fn format_status(status: &AlertStatus, utc_offset_hours: i32) -> String {
    let last_check = status
        .last_check
        .map(|dt| reports::format_datetime(dt, utc_offset_hours))
        .unwrap_or_else(|| "Never".to_string());
    format!(
        "🔔 <b>Order Alerts</b>\n{RULE}\n\n\
         Status: {}\n\
         Last order seen: {}\n\
         Alerts sent: {}\n\
         Last check: {}",
        if status.running { "🟢 ON" } else { "🔴 OFF" },
        status
            .last_seen_id
            .map(|id| format!("#{id}"))
            .unwrap_or_else(|| "pending".to_string()),
        status.total_alerts_sent,
        last_check
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_never_moves_back() {
        assert_eq!(advance_cursor(None, 5), 5);
        assert_eq!(advance_cursor(Some(10), 5), 10);
        assert_eq!(advance_cursor(Some(10), 11), 11);
    }

    #[test]
    fn test_status_text() {
        let status = AlertStatus {
            running: true,
            last_seen_id: Some(120),
            total_alerts_sent: 3,
            last_check: None,
        };
        let text = format_status(&status, 6);
        assert!(text.contains("🟢 ON"));
        assert!(text.contains("#120"));
        assert!(text.contains("Alerts sent: 3"));
        assert!(text.contains("Last check: Never"));
    }
}
