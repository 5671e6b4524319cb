//! Storefront uptime monitor with downtime and recovery alerts.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};

use super::notifier::AdminNotifier;
use crate::config::MonitorConfig;
use crate::reports::{esc, format_datetime, RULE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteStatus {
    Up,
    Degraded,
    Down,
}

impl SiteStatus {
    pub fn emoji(self) -> &'static str {
        match self {
            SiteStatus::Up => "🟢",
            SiteStatus::Degraded => "🟡",
            SiteStatus::Down => "🔴",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SiteStatus::Up => "UP",
            SiteStatus::Degraded => "DEGRADED",
            SiteStatus::Down => "DOWN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthResult {
    pub status: SiteStatus,
    pub status_code: Option<u16>,
    pub duration: Duration,
    pub error: Option<String>,
}

/// Single GET against the site; only a 200 counts as up
pub async fn check_health(client: &Client, url: &str, limit: Duration) -> HealthResult {
    let start = std::time::Instant::now();
    let response = timeout(limit, client.get(url).send()).await;
    let duration = start.elapsed();

    match response {
        Ok(Ok(res)) => {
            let code = res.status().as_u16();
            HealthResult {
                status: if code == 200 { SiteStatus::Up } else { SiteStatus::Degraded },
                status_code: Some(code),
                duration,
                error: None,
            }
        }
        Ok(Err(e)) => HealthResult {
            status: SiteStatus::Down,
            status_code: e.status().map(|s| s.as_u16()),
            duration,
            error: Some(if e.is_timeout() {
                "Connection Timeout".to_string()
            } else if e.is_connect() {
                "Connection Error".to_string()
            } else {
                e.to_string()
            }),
        },
        Err(_) => HealthResult {
            status: SiteStatus::Down,
            status_code: None,
            duration,
            error: Some("Connection Timeout".to_string()),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    WentDown,
    Recovered,
}

/// Alerts fire on any change into Down and on Down -> Up; the first check never alerts
pub fn transition(previous: Option<SiteStatus>, current: SiteStatus) -> Option<Transition> {
    match (previous?, current) {
        (prev, SiteStatus::Down) if prev != SiteStatus::Down => Some(Transition::WentDown),
        (SiteStatus::Down, SiteStatus::Up) => Some(Transition::Recovered),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct CheckRecord {
    pub at: DateTime<Utc>,
    pub result: HealthResult,
}

#[derive(Debug, Default)]
struct MonitorState {
    history: VecDeque<CheckRecord>,
    last_status: Option<SiteStatus>,
    total_checks: u64,
    up_checks: u64,
    downtime_count: u64,
}

impl MonitorState {
    fn uptime_percentage(&self) -> f64 {
        if self.total_checks == 0 {
            100.0
        } else {
            (self.up_checks as f64 / self.total_checks as f64 * 1000.0).round() / 10.0
        }
    }
}

pub fn uptime_bar(percentage: f64) -> String {
    let filled = ((percentage / 10.0) as usize).min(10);
    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

pub struct WebsiteMonitor {
    client: Client,
    config: MonitorConfig,
    notifier: Arc<AdminNotifier>,
    utc_offset_hours: i32,
    state: Mutex<MonitorState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WebsiteMonitor {
    pub fn new(client: Client, config: MonitorConfig, notifier: Arc<AdminNotifier>, utc_offset_hours: i32) -> Self {
        Self {
            client,
            config,
            notifier,
            utc_offset_hours,
            state: Mutex::new(MonitorState::default()),
            task: Mutex::new(None),
        }
    }

    fn state(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_running(&self) -> bool {
        self.task().as_ref().is_some_and(|handle| !handle.is_finished())
    }

    pub fn start(self: &Arc<Self>) -> bool {
        let mut task = self.task();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }
        let this = Arc::clone(self);
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(this.config.interval_secs.max(1)));
            loop {
                ticker.tick().await;
                this.check_now().await;
            }
        }));
        info!(url = %self.config.url, interval_secs = self.config.interval_secs, "Website monitoring started");
        true
    }

    pub fn stop(&self) -> bool {
        match self.task().take() {
            Some(handle) => {
                handle.abort();
                info!("Website monitoring stopped");
                true
            }
            None => false,
        }
    }

    /// Check once, record the result and alert admins on a transition
    pub async fn check_now(&self) -> HealthResult {
        let result = check_health(&self.client, &self.config.url, Duration::from_secs(self.config.timeout_secs)).await;
        let now = Utc::now();
        let (change, downtimes) = self.record(now, &result);

        match change {
            Some(Transition::WentDown) => {
                warn!(url = %self.config.url, error = ?result.error, "Website down");
                let text = format!(
                    "🚨 <b>WEBSITE DOWN!</b>\n{RULE}\n\n\
                     🌐 URL: <code>{}</code>\n\
                     ❌ Error: {}\n\
                     🕐 {}\n\
                     ⚠️ Total Downtimes: {downtimes}",
                    esc(&self.config.url),
                    esc(result.error.as_deref().unwrap_or("Unknown")),
                    format_datetime(now, self.utc_offset_hours)
                );
                self.notifier.notify(&text).await;
            }
            Some(Transition::Recovered) => {
                info!(url = %self.config.url, "Website recovered");
                let text = format!(
                    "✅ <b>Website Recovered!</b>\n{RULE}\n\n\
                     🌐 URL: <code>{}</code>\n\
                     ⚡ Response: {:.2}s\n\
                     🕐 {}",
                    esc(&self.config.url),
                    result.duration.as_secs_f64(),
                    format_datetime(now, self.utc_offset_hours)
                );
                self.notifier.notify(&text).await;
            }
            None => {}
        }
        result
    }

    fn record(&self, at: DateTime<Utc>, result: &HealthResult) -> (Option<Transition>, u64) {
        let mut state = self.state();
        let change = transition(state.last_status, result.status);
        if change == Some(Transition::WentDown) {
            state.downtime_count += 1;
        }
        state.total_checks += 1;
        if result.status == SiteStatus::Up {
            state.up_checks += 1;
        }
        state.last_status = Some(result.status);
        state.history.push_back(CheckRecord {
            at,
            result: result.clone(),
        });
        while state.history.len() > self.config.history_size {
            state.history.pop_front();
        }
        (change, state.downtime_count)
    }

    pub fn uptime_percentage(&self) -> f64 {
        self.state().uptime_percentage()
    }

    pub fn recent_checks(&self) -> Vec<CheckRecord> {
        self.state().history.iter().cloned().collect()
    }

    pub fn format_status(&self) -> String {
        let running = self.is_running();
        let state = self.state();
        let uptime = state.uptime_percentage();
        let last = state.history.back();
        let status = state
            .last_status
            .map(|s| format!("{} <b>{}</b>", s.emoji(), s.label()))
            .unwrap_or_else(|| "⚪ <b>UNKNOWN</b>".to_string());
        let response = last
            .filter(|c| c.result.status != SiteStatus::Down)
            .map(|c| format!("{:.2}s", c.result.duration.as_secs_f64()))
            .unwrap_or_else(|| "N/A".to_string());
        let last_check = last
            .map(|c| format_datetime(c.at, self.utc_offset_hours))
            .unwrap_or_else(|| "Never".to_string());

        format!(
            "🌐 <b>Website Monitor</b>\n{RULE}\n\n\
             URL: <code>{}</code>\n\
             Status: {status}\n\
             Response: {response}\n\n\
             Uptime: [{}] {uptime}%\n\
             Total Checks: {}\n\
             Downtimes: {}\n\
             Last Check: {last_check}\n\n\
             Monitoring: {}\n\
             Interval: {}s",
            esc(&self.config.url),
            uptime_bar(uptime),
            state.total_checks,
            state.downtime_count,
            if running { "🟢 ON" } else { "🔴 OFF" },
            self.config.interval_secs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        assert_eq!(transition(None, SiteStatus::Down), None);
        assert_eq!(transition(Some(SiteStatus::Up), SiteStatus::Down), Some(Transition::WentDown));
        assert_eq!(transition(Some(SiteStatus::Degraded), SiteStatus::Down), Some(Transition::WentDown));
        assert_eq!(transition(Some(SiteStatus::Down), SiteStatus::Down), None);
        assert_eq!(transition(Some(SiteStatus::Down), SiteStatus::Up), Some(Transition::Recovered));
        assert_eq!(transition(Some(SiteStatus::Down), SiteStatus::Degraded), None);
        assert_eq!(transition(Some(SiteStatus::Up), SiteStatus::Up), None);
    }

    #[test]
    fn test_uptime_bar() {
        assert_eq!(uptime_bar(100.0), "██████████");
        assert_eq!(uptime_bar(95.0), "█████████░");
        assert_eq!(uptime_bar(0.0), "░░░░░░░░░░");
    }

    #[test]
    fn test_uptime_percentage_rounds() {
        let state = MonitorState {
            total_checks: 3,
            up_checks: 2,
            ..MonitorState::default()
        };
        assert_eq!(state.uptime_percentage(), 66.7);
        assert_eq!(MonitorState::default().uptime_percentage(), 100.0);
    }

    #[tokio::test]
    async fn test_unreachable_site_is_down() {
        let client = Client::new();
        let result = check_health(&client, "http://127.0.0.1:9/", Duration::from_secs(2)).await;
        assert_eq!(result.status, SiteStatus::Down);
        assert!(result.error.is_some());
    }
}
