//! Background services for admins
//!
//! - `notifier`: fan-out of HTML messages and photos to admins, user broadcasts
//! - `order_alerts`: polls for new orders and pushes an alert per order
//! - `website_monitor`: storefront uptime checks with downtime alerts
//! - `scheduled_reports`: daily and weekly reports at a fixed local hour
//!
//! Each looping service owns its `JoinHandle`; `stop` aborts the task.

pub mod notifier;
pub mod order_alerts;
pub mod scheduled_reports;
pub mod website_monitor;

pub use notifier::{AdminNotifier, DeliveryReport};
pub use order_alerts::OrderAlerts;
pub use scheduled_reports::{ReportKind, ScheduledReports};
pub use website_monitor::WebsiteMonitor;
