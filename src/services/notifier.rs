//! Outbound fan-out: admin notifications and user broadcasts.

use std::sync::Arc;
use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode};
use teloxide::{ApiError, RequestError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::admin::AdminRegistry;

/// Telegram allows roughly 30 messages per second per bot
const BROADCAST_RATE_PER_SECOND: u32 = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
    /// Recipients who blocked the bot or deleted their account
    pub blocked: usize,
}

impl DeliveryReport {
    pub fn total(&self) -> usize {
        self.sent + self.failed + self.blocked
    }

    fn record(&mut self, result: Result<(), RequestError>, chat_id: i64) {
        match result {
            Ok(()) => self.sent += 1,
            Err(e) if is_unreachable(&e) => {
                debug!(chat_id, error = %e, "Recipient unreachable");
                self.blocked += 1;
            }
            Err(e) => {
                warn!(chat_id, error = %e, "Failed to deliver message");
                self.failed += 1;
            }
        }
    }
}

fn is_unreachable(error: &RequestError) -> bool {
    matches!(
        error,
        RequestError::Api(ApiError::BotBlocked | ApiError::UserDeactivated | ApiError::ChatNotFound)
    )
}

struct RateLimiter {
    interval: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    fn new(rate_per_second: u32) -> Self {
        Self {
            interval: Duration::from_millis(1000 / u64::from(rate_per_second.max(1))),
            last_request: None,
        }
    }

    async fn acquire(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}

async fn send_html(bot: &Bot, chat_id: i64, text: &str) -> Result<(), RequestError> {
    bot.send_message(ChatId(chat_id), text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Sends HTML messages to every admin, never stopping at a failed recipient
pub struct AdminNotifier {
    bot: Bot,
    admins: Arc<AdminRegistry>,
}

impl AdminNotifier {
    pub fn new(bot: Bot, admins: Arc<AdminRegistry>) -> Self {
        Self { bot, admins }
    }

    pub async fn notify(&self, text: &str) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for chat_id in self.admins.chat_ids() {
            report.record(send_html(&self.bot, chat_id, text).await, chat_id);
        }
        debug!(sent = report.sent, failed = report.failed, "Admin notification delivered");
        report
    }

    pub async fn notify_photo(&self, png: &[u8], caption: &str) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for chat_id in self.admins.chat_ids() {
            let result = self
                .bot
                .send_photo(ChatId(chat_id), InputFile::memory(png.to_vec()).file_name("chart.png"))
                .caption(caption)
                .parse_mode(ParseMode::Html)
                .await
                .map(|_| ());
            report.record(result, chat_id);
        }
        report
    }
}

/// Send one HTML message to every user, rate limited
pub async fn broadcast(bot: &Bot, user_ids: &[i64], text: &str) -> DeliveryReport {
    let mut limiter = RateLimiter::new(BROADCAST_RATE_PER_SECOND);
    let mut report = DeliveryReport::default();
    for &chat_id in user_ids {
        limiter.acquire().await;
        report.record(send_html(bot, chat_id, text).await, chat_id);
    }
    info!(
        total = user_ids.len(),
        sent = report.sent,
        failed = report.failed,
        blocked = report.blocked,
        "Broadcast finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts_outcomes() {
        let mut report = DeliveryReport::default();
        report.record(Ok(()), 1);
        report.record(Err(RequestError::Api(ApiError::BotBlocked)), 2);
        report.record(Err(RequestError::Api(ApiError::MessageTextIsEmpty)), 3);
        assert_eq!(report, DeliveryReport { sent: 1, failed: 1, blocked: 1 });
        assert_eq!(report.total(), 3);
    }

    #[tokio::test]
    async fn test_rate_limiter_spaces_requests() {
        let mut limiter = RateLimiter::new(10);
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
