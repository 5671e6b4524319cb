//! Row types read from the storefront database.
//!
//! Orders, products and coupons are owned by the storefront; the bot reads
//! them and only ever writes an order's status.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::business::OrderStatus;

/// Stock level under which a product counts as low
pub const LOW_STOCK_LEVEL: i32 = 10;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: Option<String>,
    pub customer_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub product_name: Option<String>,
    pub quantity: i32,
    pub total_price: f64,
    pub status: Option<String>,
    pub delivery_status: Option<String>,
    pub payment_status: Option<String>,
    pub payment_method: Option<String>,
    pub customer_email: Option<String>,
    pub coupon_code: Option<String>,
    pub discount_amount: f64,
    pub created_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn status(&self) -> OrderStatus {
        OrderStatus::from_db(self.status.as_deref())
    }

    /// The customer-facing id, `#<id>` when the storefront did not assign one
    pub fn display_id(&self) -> String {
        match self.order_id.as_deref() {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => format!("#{}", self.id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    InStock,
    LowStock,
    OutOfStock,
    /// Products derived from order history carry no stock figure
    Unknown,
}

impl Availability {
    pub fn label(self) -> &'static str {
        match self {
            Availability::InStock => "✅ In Stock",
            Availability::LowStock => "⚠️ Low Stock",
            Availability::OutOfStock => "❌ Out of Stock",
            Availability::Unknown => "ℹ️ Ask for availability",
        }
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub stock_quantity: Option<i32>,
    pub category: Option<String>,
    pub is_active: bool,
    pub is_featured: bool,
}

impl Product {
    pub fn availability(&self) -> Availability {
        match self.stock_quantity {
            None => Availability::Unknown,
            Some(q) if q <= 0 => Availability::OutOfStock,
            Some(q) if q < LOW_STOCK_LEVEL => Availability::LowStock,
            Some(_) => Availability::InStock,
        }
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub discount_type: String,
    pub discount_value: f64,
    pub min_order_value: Option<f64>,
    pub max_discount_amount: Option<f64>,
    pub usage_limit: Option<i32>,
    pub usage_count: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CouponValidation {
    Valid { discount: f64 },
    Invalid(&'static str),
}

impl Coupon {
    pub fn is_percentage(&self) -> bool {
        self.discount_type.eq_ignore_ascii_case("percentage")
    }

    /// Short human description such as `20% off (max ৳500)` or `৳150 off`
    pub fn describe_discount(&self) -> String {
        if self.is_percentage() {
            match self.max_discount_amount {
                Some(max) => format!("{}% off (max ৳{})", self.discount_value, max),
                None => format!("{}% off", self.discount_value),
            }
        } else {
            format!("৳{} off", self.discount_value)
        }
    }

    /// Check a coupon against an order amount at `now`
    pub fn validate(&self, order_amount: f64, now: DateTime<Utc>) -> CouponValidation {
        if !self.is_active {
            return CouponValidation::Invalid("Coupon is not active");
        }
        if self.expires_at.is_some_and(|expires| expires < now) {
            return CouponValidation::Invalid("Coupon has expired");
        }
        if self.usage_limit.is_some_and(|limit| self.usage_count >= limit) {
            return CouponValidation::Invalid("Coupon usage limit reached");
        }
        if self.min_order_value.is_some_and(|min| order_amount < min) {
            return CouponValidation::Invalid("Order amount is below the coupon minimum");
        }

        let discount = if self.is_percentage() {
            let raw = order_amount * self.discount_value / 100.0;
            match self.max_discount_amount {
                Some(max) => raw.min(max),
                None => raw,
            }
        } else {
            self.discount_value.min(order_amount)
        };

        CouponValidation::Valid { discount }
    }
}

#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct SalesStats {
    pub order_count: i64,
    pub revenue: f64,
    pub avg_order: f64,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct TopProduct {
    pub product_name: String,
    pub units: i64,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DailyRevenue {
    pub day: NaiveDate,
    pub orders: i64,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct StatusCount {
    pub status: Option<String>,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PaymentMethodStat {
    pub method: String,
    pub count: i64,
    pub revenue: f64,
}

#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct InventorySummary {
    pub total_products: i64,
    pub total_units: i64,
    pub low_stock: i64,
    pub out_of_stock: i64,
    pub inventory_value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct UserStats {
    pub total_users: i64,
    pub active_users: i64,
}

/// Per-customer aggregate over non-cancelled orders, keyed by phone number
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct CustomerSummary {
    pub customer_name: Option<String>,
    pub phone: String,
    pub order_count: i64,
    pub total_spent: f64,
    pub last_order: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct AdminRecord {
    pub user_id: i64,
    pub username: Option<String>,
    pub added_by: Option<i64>,
    pub is_super: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn coupon() -> Coupon {
        Coupon {
            code: "EID20".into(),
            discount_type: "percentage".into(),
            discount_value: 20.0,
            min_order_value: Some(1000.0),
            max_discount_amount: Some(300.0),
            usage_limit: Some(100),
            usage_count: 10,
            expires_at: Some(Utc::now() + Duration::days(3)),
            is_active: true,
        }
    }

    #[test]
    fn test_percentage_coupon_is_capped() {
        let c = coupon();
        assert_eq!(c.validate(1200.0, Utc::now()), CouponValidation::Valid { discount: 240.0 });
        assert_eq!(c.validate(5000.0, Utc::now()), CouponValidation::Valid { discount: 300.0 });
    }

    #[test]
    fn test_coupon_rejections() {
        let now = Utc::now();
        let mut c = coupon();
        assert!(matches!(c.validate(500.0, now), CouponValidation::Invalid(_)));

        c.usage_count = 100;
        assert_eq!(c.validate(1500.0, now), CouponValidation::Invalid("Coupon usage limit reached"));

        let mut expired = coupon();
        expired.expires_at = Some(now - Duration::hours(1));
        assert_eq!(expired.validate(1500.0, now), CouponValidation::Invalid("Coupon has expired"));

        let mut inactive = coupon();
        inactive.is_active = false;
        assert_eq!(inactive.validate(1500.0, now), CouponValidation::Invalid("Coupon is not active"));
    }

    #[test]
    fn test_fixed_coupon_never_exceeds_order() {
        let c = Coupon {
            discount_type: "fixed".into(),
            discount_value: 150.0,
            min_order_value: None,
            max_discount_amount: None,
            usage_limit: None,
            expires_at: None,
            ..coupon()
        };
        assert_eq!(c.validate(100.0, Utc::now()), CouponValidation::Valid { discount: 100.0 });
        assert_eq!(c.describe_discount(), "৳150 off");
    }

    #[test]
    fn test_product_availability() {
        let mut p = Product {
            id: 1,
            name: "Panjabi".into(),
            price: 1800.0,
            stock_quantity: Some(0),
            category: None,
            is_active: true,
            is_featured: false,
        };
        assert_eq!(p.availability(), Availability::OutOfStock);
        p.stock_quantity = Some(4);
        assert_eq!(p.availability(), Availability::LowStock);
        p.stock_quantity = Some(40);
        assert_eq!(p.availability(), Availability::InStock);
        p.stock_quantity = None;
        assert_eq!(p.availability(), Availability::Unknown);
    }

    #[test]
    fn test_display_id_falls_back_to_numeric() {
        let order = Order {
            id: 42,
            order_id: None,
            customer_name: None,
            phone: None,
            address: None,
            product_name: None,
            quantity: 1,
            total_price: 0.0,
            status: Some("shipped".into()),
            delivery_status: None,
            payment_status: None,
            payment_method: None,
            customer_email: None,
            coupon_code: None,
            discount_amount: 0.0,
            created_at: None,
        };
        assert_eq!(order.display_id(), "#42");
        assert_eq!(order.status(), OrderStatus::Shipped);
    }
}
