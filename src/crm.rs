//! Customer profiles built from order history.
//!
//! A customer is identified by phone number. Spend, tier and loyalty points
//! only count orders that were not cancelled.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use tracing::debug;

use crate::db;
use crate::models::{CustomerSummary, Order};

/// Spend (৳) at which a customer becomes VIP
pub const VIP_THRESHOLD: f64 = 5_000.0;
/// Spend (৳) at which a customer becomes Gold
pub const GOLD_THRESHOLD: f64 = 15_000.0;
/// One loyalty point per this many taka spent
pub const TAKA_PER_POINT: f64 = 100.0;
/// Days without an order before a customer counts as inactive
pub const INACTIVE_AFTER_DAYS: i64 = 60;
const RECENT_ORDERS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerTier {
    Regular,
    Vip,
    Gold,
}

impl CustomerTier {
    pub fn from_spent(total_spent: f64) -> Self {
        if total_spent >= GOLD_THRESHOLD {
            CustomerTier::Gold
        } else if total_spent >= VIP_THRESHOLD {
            CustomerTier::Vip
        } else {
            CustomerTier::Regular
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            CustomerTier::Regular => "👤",
            CustomerTier::Vip => "⭐",
            CustomerTier::Gold => "🥇",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CustomerTier::Regular => "Regular",
            CustomerTier::Vip => "VIP",
            CustomerTier::Gold => "Gold",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Active,
    Moderate,
    Inactive,
    Unknown,
}

impl Activity {
    /// Active within 30 days, moderate within 90
    pub fn from_days_since(days: Option<i64>) -> Self {
        match days {
            Some(d) if d <= 30 => Activity::Active,
            Some(d) if d <= 90 => Activity::Moderate,
            Some(_) => Activity::Inactive,
            None => Activity::Unknown,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Activity::Active => "🟢",
            Activity::Moderate => "🟡",
            Activity::Inactive => "🔴",
            Activity::Unknown => "⚪",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Activity::Active => "Active",
            Activity::Moderate => "Moderate",
            Activity::Inactive => "Inactive",
            Activity::Unknown => "Unknown",
        }
    }
}

pub fn loyalty_points(total_spent: f64) -> u64 {
    if total_spent <= 0.0 {
        return 0;
    }
    (total_spent / TAKA_PER_POINT).floor() as u64
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerProfile {
    pub summary: CustomerSummary,
    pub tier: CustomerTier,
    pub loyalty_points: u64,
    pub avg_order: f64,
    pub favorite_product: Option<String>,
    pub days_since_purchase: Option<i64>,
    pub activity: Activity,
    /// Newest first, cancelled orders included
    pub recent_orders: Vec<Order>,
}

impl CustomerProfile {
    pub fn new(
        summary: CustomerSummary,
        favorite_product: Option<String>,
        recent_orders: Vec<Order>,
        now: DateTime<Utc>,
    ) -> Self {
        let days_since_purchase = summary.last_order.map(|last| (now - last).num_days().max(0));
        let avg_order = if summary.order_count > 0 {
            summary.total_spent / summary.order_count as f64
        } else {
            0.0
        };
        Self {
            tier: CustomerTier::from_spent(summary.total_spent),
            loyalty_points: loyalty_points(summary.total_spent),
            avg_order,
            favorite_product,
            days_since_purchase,
            activity: Activity::from_days_since(days_since_purchase),
            recent_orders,
            summary,
        }
    }

    /// Email and address as given on the newest order
    pub fn contact_order(&self) -> Option<&Order> {
        self.recent_orders.first()
    }
}

/// Profile for a phone number; `None` when the customer has no counted orders
pub async fn load_profile(pool: &PgPool, phone: &str, now: DateTime<Utc>) -> Result<Option<CustomerProfile>> {
    let Some(summary) = db::get_customer_summary(pool, phone).await? else {
        debug!("No customer profile for phone");
        return Ok(None);
    };
    let (favorite, recent) = tokio::try_join!(
        db::get_favorite_product(pool, phone),
        db::get_orders_by_phone(pool, phone, RECENT_ORDERS),
    )?;
    Ok(Some(CustomerProfile::new(summary, favorite, recent, now)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn summary(total_spent: f64, order_count: i64, last_order: Option<DateTime<Utc>>) -> CustomerSummary {
        CustomerSummary {
            customer_name: Some("Rahim Uddin".into()),
            phone: "01711222333".into(),
            order_count,
            total_spent,
            last_order,
        }
    }

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(CustomerTier::from_spent(4_999.0), CustomerTier::Regular);
        assert_eq!(CustomerTier::from_spent(5_000.0), CustomerTier::Vip);
        assert_eq!(CustomerTier::from_spent(15_000.0), CustomerTier::Gold);
    }

    #[test]
    fn test_activity_windows() {
        assert_eq!(Activity::from_days_since(Some(0)), Activity::Active);
        assert_eq!(Activity::from_days_since(Some(30)), Activity::Active);
        assert_eq!(Activity::from_days_since(Some(31)), Activity::Moderate);
        assert_eq!(Activity::from_days_since(Some(91)), Activity::Inactive);
        assert_eq!(Activity::from_days_since(None), Activity::Unknown);
    }

    #[test]
    fn test_loyalty_points_round_down() {
        assert_eq!(loyalty_points(5_599.0), 55);
        assert_eq!(loyalty_points(99.0), 0);
        assert_eq!(loyalty_points(-10.0), 0);
    }

    #[test]
    fn test_profile_derives_figures() {
        let now = Utc::now();
        let profile = CustomerProfile::new(
            summary(6_000.0, 3, Some(now - Duration::days(45))),
            Some("Premium Panjabi".into()),
            Vec::new(),
            now,
        );
        assert_eq!(profile.tier, CustomerTier::Vip);
        assert_eq!(profile.loyalty_points, 60);
        assert!((profile.avg_order - 2_000.0).abs() < f64::EPSILON);
        assert_eq!(profile.days_since_purchase, Some(45));
        assert_eq!(profile.activity, Activity::Moderate);
        assert!(profile.contact_order().is_none());
    }
}
