//! # Configuration Module
//!
//! Runtime configuration loaded from environment variables. Required values
//! are collected into a single [`ConfigError`] so a misconfigured deployment
//! reports everything that is wrong at once.

use std::env;
use std::str::FromStr;

pub const DEFAULT_WEBSITE_URL: &str = "https://nongor-brand.vercel.app";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_FALLBACK_MODEL: &str = "gemini-1.5-flash";

/// Recovery configuration for outbound API calls
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Timeout for a single request in seconds
    pub operation_timeout_secs: u64,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_retry_delay_ms: 500,
            max_retry_delay_ms: 5000,
            operation_timeout_secs: 30,
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60,
        }
    }
}

/// Website health monitor settings
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub url: String,
    pub interval_secs: u64,
    pub timeout_secs: u64,
    /// Number of checks kept for the uptime percentage
    pub history_size: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WEBSITE_URL.to_string(),
            interval_secs: 300,
            timeout_secs: 10,
            history_size: 20,
        }
    }
}

/// Wall-clock schedule for the daily and weekly admin reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSchedule {
    /// Local hour (0-23) at which reports fire
    pub daily_hour: u32,
    /// Weekday of the weekly report, Monday = 0
    pub weekly_day: u32,
    /// Offset of the business timezone from UTC
    pub utc_offset_hours: i32,
}

impl Default for ReportSchedule {
    fn default() -> Self {
        Self {
            daily_hour: 21,
            weekly_day: 6,
            utc_offset_hours: 6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram_token: String,
    pub database_url: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_fallback_model: String,
    pub admin_user_ids: Vec<u64>,
    pub super_admin_id: Option<u64>,
    pub website_url: String,
    pub enable_web_scraping: bool,
    pub context_cache_secs: u64,
    pub order_poll_interval_secs: u64,
    pub low_stock_threshold: i32,
    pub audit_log_file: String,
    pub monitor: MonitorConfig,
    pub reports: ReportSchedule,
    pub recovery: RecoveryConfig,
}

#[derive(Debug)]
pub struct ConfigError {
    pub missing_vars: Vec<String>,
    pub invalid_vars: Vec<(String, String)>,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.missing_vars.is_empty() {
            writeln!(f, "Missing required environment variables:")?;
            for var in &self.missing_vars {
                writeln!(f, "  - {var}")?;
            }
        }
        if !self.invalid_vars.is_empty() {
            writeln!(f, "Invalid environment variables:")?;
            for (var, err) in &self.invalid_vars {
                writeln!(f, "  - {var}: {err}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ConfigError {}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(name: &str, default: T, invalid: &mut Vec<(String, String)>) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(name) {
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|e| {
            invalid.push((name.to_string(), e.to_string()));
            default
        }),
        None => default,
    }
}

fn parse_positive(name: &str, default: u64, invalid: &mut Vec<(String, String)>) -> u64 {
    let value = parse_or(name, default, invalid);
    require_positive(name, value, invalid)
}

/// Interval settings feed `tokio::time::interval`, which rejects zero
fn require_positive(name: &str, value: u64, invalid: &mut Vec<(String, String)>) -> u64 {
    if value == 0 {
        invalid.push((name.to_string(), "must be greater than zero".to_string()));
    }
    value
}

/// A Telegram user id that fits the BIGINT columns of `users` and `admins`
pub fn parse_user_id(raw: &str) -> Option<u64> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .and_then(|id| u64::try_from(id).ok())
}

/// Parse a comma separated list of Telegram user ids, skipping anything
/// that is not a valid id.
pub fn parse_admin_ids(raw: &str) -> Vec<u64> {
    let mut ids: Vec<u64> = raw.split(',').filter_map(parse_user_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Interpret common truthy/falsy spellings; `None` when unrecognised.
pub fn parse_bool_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let mut invalid = Vec::new();

        let telegram_token = non_empty("TELEGRAM_BOT_TOKEN");
        if telegram_token.is_none() {
            missing.push("TELEGRAM_BOT_TOKEN".to_string());
        }

        let database_url = non_empty("DATABASE_URL").or_else(|| non_empty("NETLIFY_DATABASE_URL"));
        if database_url.is_none() {
            missing.push("DATABASE_URL".to_string());
        }

        let admin_user_ids = non_empty("ADMIN_USER_IDS")
            .map(|raw| parse_admin_ids(&raw))
            .unwrap_or_default();

        let super_admin_id = non_empty("SUPER_ADMIN_ID").and_then(|raw| {
            let id = parse_user_id(&raw);
            if id.is_none() {
                invalid.push(("SUPER_ADMIN_ID".into(), format!("not a valid user id: {raw}")));
            }
            id
        });

        let enable_web_scraping = match non_empty("ENABLE_WEB_SCRAPING") {
            Some(raw) => parse_bool_flag(&raw).unwrap_or_else(|| {
                invalid.push(("ENABLE_WEB_SCRAPING".into(), format!("not a boolean: {raw}")));
                true
            }),
            None => true,
        };

        let website_url = non_empty("WEBSITE_URL").unwrap_or_else(|| DEFAULT_WEBSITE_URL.to_string());
        let defaults = ReportSchedule::default();

        let reports = ReportSchedule {
            daily_hour: parse_or("REPORT_DAILY_HOUR", defaults.daily_hour, &mut invalid),
            weekly_day: parse_or("REPORT_WEEKLY_DAY", defaults.weekly_day, &mut invalid),
            utc_offset_hours: parse_or("REPORT_UTC_OFFSET_HOURS", defaults.utc_offset_hours, &mut invalid),
        };
        if reports.daily_hour > 23 {
            invalid.push(("REPORT_DAILY_HOUR".into(), "must be between 0 and 23".into()));
        }
        if reports.weekly_day > 6 {
            invalid.push(("REPORT_WEEKLY_DAY".into(), "must be between 0 and 6".into()));
        }

        let monitor = MonitorConfig {
            url: website_url.clone(),
            interval_secs: parse_positive("MONITOR_INTERVAL_SECONDS", 300, &mut invalid),
            timeout_secs: parse_positive("WEBSITE_CHECK_TIMEOUT", 10, &mut invalid),
            ..MonitorConfig::default()
        };

        let context_cache_secs = parse_positive("CONTEXT_CACHE_SECONDS", 300, &mut invalid);
        let order_poll_interval_secs = parse_positive("ORDER_POLL_INTERVAL", 60, &mut invalid);
        let low_stock_threshold = parse_or("LOW_STOCK_THRESHOLD", 10, &mut invalid);

        if !missing.is_empty() || !invalid.is_empty() {
            return Err(ConfigError {
                missing_vars: missing,
                invalid_vars: invalid,
            });
        }

        Ok(Self {
            telegram_token: telegram_token.unwrap_or_default(),
            database_url: database_url.unwrap_or_default(),
            gemini_api_key: non_empty("GEMINI_API_KEY"),
            gemini_model: non_empty("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            gemini_fallback_model: non_empty("GEMINI_FALLBACK_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_FALLBACK_MODEL.to_string()),
            admin_user_ids,
            super_admin_id,
            website_url,
            enable_web_scraping,
            context_cache_secs,
            order_poll_interval_secs,
            low_stock_threshold,
            audit_log_file: non_empty("AUDIT_LOG_FILE").unwrap_or_else(|| "audit.log".to_string()),
            monitor,
            reports,
            recovery: RecoveryConfig::default(),
        })
    }

    pub fn ai_enabled(&self) -> bool {
        self.gemini_api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_admin_ids_skips_garbage() {
        assert_eq!(parse_admin_ids("123, 456,abc,,789"), vec![123, 456, 789]);
        assert_eq!(parse_admin_ids("42,42"), vec![42]);
        assert!(parse_admin_ids("").is_empty());
    }

    #[test]
    fn test_admin_ids_must_fit_bigint() {
        assert_eq!(parse_admin_ids("9223372036854775807,9223372036854775808"), vec![i64::MAX as u64]);
        assert_eq!(parse_user_id("18446744073709551615"), None);
        assert_eq!(parse_user_id("0"), None);
        assert_eq!(parse_user_id("-5"), None);
        assert_eq!(parse_user_id(" 42 "), Some(42));
    }

    #[test]
    fn test_zero_intervals_are_rejected() {
        let mut invalid = Vec::new();
        assert_eq!(require_positive("ORDER_POLL_INTERVAL", 60, &mut invalid), 60);
        assert!(invalid.is_empty());

        require_positive("ORDER_POLL_INTERVAL", 0, &mut invalid);
        require_positive("MONITOR_INTERVAL_SECONDS", 0, &mut invalid);
        let names: Vec<&str> = invalid.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["ORDER_POLL_INTERVAL", "MONITOR_INTERVAL_SECONDS"]);
        assert!(invalid[0].1.contains("greater than zero"));
    }

    #[test]
    fn test_parse_bool_flag() {
        assert_eq!(parse_bool_flag("TRUE"), Some(true));
        assert_eq!(parse_bool_flag(" off "), Some(false));
        assert_eq!(parse_bool_flag("maybe"), None);
    }

    #[test]
    fn test_config_error_lists_everything() {
        let err = ConfigError {
            missing_vars: vec!["TELEGRAM_BOT_TOKEN".into()],
            invalid_vars: vec![("REPORT_DAILY_HOUR".into(), "must be between 0 and 23".into())],
        };
        let text = err.to_string();
        assert!(text.contains("TELEGRAM_BOT_TOKEN"));
        assert!(text.contains("REPORT_DAILY_HOUR: must be between 0 and 23"));
    }

    #[test]
    fn test_defaults() {
        let schedule = ReportSchedule::default();
        assert_eq!(schedule.daily_hour, 21);
        assert_eq!(schedule.weekly_day, 6);
        assert_eq!(schedule.utc_offset_hours, 6);
        assert_eq!(MonitorConfig::default().history_size, 20);
        assert_eq!(RecoveryConfig::default().circuit_breaker_threshold, 5);
    }
}
