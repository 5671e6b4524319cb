//! CSV export of orders for spreadsheet tools.

use chrono::{DateTime, Utc};

use crate::models::Order;
use crate::reports::business_now;

/// Excel needs the byte order mark to read UTF-8 (Bengali names) correctly
const UTF8_BOM: &str = "\u{feff}";

const HEADER: [&str; 14] = [
    "Order ID",
    "Customer",
    "Phone",
    "Email",
    "Product",
    "Quantity",
    "Total",
    "Status",
    "Delivery Status",
    "Payment Method",
    "Payment Status",
    "Coupon",
    "Discount",
    "Date",
];

/// Quote a field when it contains a delimiter, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

fn csv_row(order: &Order, utc_offset_hours: i32) -> String {
    let date = order
        .created_at
        .map(|dt| business_now(dt, utc_offset_hours).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();

    let fields = [
        order.display_id(),
        opt(&order.customer_name).to_string(),
        opt(&order.phone).to_string(),
        opt(&order.customer_email).to_string(),
        opt(&order.product_name).to_string(),
        order.quantity.to_string(),
        format!("{:.2}", order.total_price),
        order.status().label().to_string(),
        opt(&order.delivery_status).to_string(),
        opt(&order.payment_method).to_string(),
        opt(&order.payment_status).to_string(),
        opt(&order.coupon_code).to_string(),
        format!("{:.2}", order.discount_amount),
        date,
    ];

    fields.iter().map(|f| csv_field(f)).collect::<Vec<_>>().join(",")
}

/// Orders as a UTF-8 CSV document with header row
pub fn orders_csv(orders: &[Order], utc_offset_hours: i32) -> Vec<u8> {
    let mut out = String::from(UTF8_BOM);
    out.push_str(&HEADER.join(","));
    out.push_str("\r\n");
    for order in orders {
        out.push_str(&csv_row(order, utc_offset_hours));
        out.push_str("\r\n");
    }
    out.into_bytes()
}

pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("nongor_orders_{}.csv", now.format("%Y%m%d_%H%M"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn order() -> Order {
        Order {
            id: 7,
            order_id: None,
            customer_name: Some("Karim, \"KB\"".into()),
            phone: Some("01811000000".into()),
            address: None,
            product_name: Some("Tee".into()),
            quantity: 1,
            total_price: 650.0,
            status: Some("delivered".into()),
            delivery_status: None,
            payment_status: Some("paid".into()),
            payment_method: Some("Cash on Delivery".into()),
            customer_email: None,
            coupon_code: None,
            discount_amount: 0.0,
            created_at: Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 0).unwrap()),
        }
    }

    #[test]
    fn test_csv_has_bom_and_header() {
        let csv = String::from_utf8(orders_csv(&[], 6)).unwrap();
        assert!(csv.starts_with('\u{feff}'));
        assert!(csv.contains("Order ID,Customer,Phone,Email,Product"));
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn test_row_quotes_special_characters() {
        let csv = String::from_utf8(orders_csv(&[order()], 6)).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert!(row.starts_with("#7,\"Karim, \"\"KB\"\"\",01811000000,,Tee,1,650.00,Delivered"));
        assert!(row.ends_with(",0.00,2024-01-02 09:04"));
    }

    #[test]
    fn test_file_name() {
        let now = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 0).unwrap();
        assert_eq!(export_file_name(now), "nongor_orders_20240506_0708.csv");
    }
}
