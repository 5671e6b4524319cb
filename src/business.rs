//! # Business Policy Module
//!
//! Static storefront policies (delivery, payment, returns, contact, sizing)
//! shared by the menus and injected into every AI prompt.

use std::fmt::Write as _;

pub const BRAND_NAME: &str = "Nongor Premium";

#[derive(Debug, Clone, Copy)]
pub struct DeliveryPolicy {
    pub name: &'static str,
    pub charge: u32,
    pub time: &'static str,
    pub free_above: u32,
}

pub const INSIDE_DHAKA: DeliveryPolicy = DeliveryPolicy {
    name: "Inside Dhaka",
    charge: 60,
    time: "1-2 business days",
    free_above: 1000,
};

pub const OUTSIDE_DHAKA: DeliveryPolicy = DeliveryPolicy {
    name: "Outside Dhaka",
    charge: 120,
    time: "3-5 business days",
    free_above: 2000,
};

#[derive(Debug, Clone, Copy)]
pub struct PaymentMethod {
    pub name: &'static str,
    pub number: Option<&'static str>,
}

pub const PAYMENT_METHODS: [PaymentMethod; 4] = [
    PaymentMethod { name: "Cash on Delivery", number: None },
    PaymentMethod { name: "bKash", number: Some("+880 1711-222333") },
    PaymentMethod { name: "Nagad", number: Some("+880 1711-222333") },
    PaymentMethod { name: "Rocket", number: Some("+880 1711-222333") },
];

pub const EXCHANGE_WINDOW_DAYS: u32 = 7;
pub const DEFECTIVE_REFUND_DAYS: u32 = 3;

pub const RETURN_CONDITIONS: [&str; 3] = [
    "Product tags must be intact",
    "Product must be unworn and unwashed",
    "Original packaging required",
];

pub const SIZE_EXCHANGE_NOTE: &str = "Free size exchange - we cover shipping both ways";
pub const SALE_ITEMS_NOTE: &str = "Sale items: Exchange only, no refunds";
pub const DEFECTIVE_NOTE: &str = "Full refund for defective items within 3 days";

pub struct ContactInfo {
    pub phone: &'static str,
    pub whatsapp: &'static str,
    pub email: &'static str,
    pub facebook: &'static str,
    pub website: &'static str,
}

pub const CONTACT: ContactInfo = ContactInfo {
    phone: "+880 1711-222333",
    whatsapp: "+880 1711-222333",
    email: "support@nongor.com",
    facebook: "https://facebook.com/nongor",
    website: "https://nongor-brand.vercel.app",
};

pub const OPEN_DAYS: &str = "Saturday - Thursday";
pub const OPEN_HOURS: &str = "10:00 AM - 8:00 PM";
pub const CLOSED_DAY: &str = "Friday: Closed (Weekly Holiday)";

/// (channel, expected response time)
pub const RESPONSE_TIMES: [(&str, &str); 3] = [
    ("WhatsApp", "5-10 minutes"),
    ("Email", "24 hours"),
    ("Facebook", "1-2 hours"),
];

#[derive(Debug, Clone, Copy)]
pub struct SizeRow {
    pub size: &'static str,
    pub chest: &'static str,
    pub length: &'static str,
    pub height: &'static str,
    pub weight: &'static str,
}

pub const SIZE_GUIDE: [SizeRow; 5] = [
    SizeRow { size: "S", chest: "36-38 inches", length: "26 inches", height: "5'4\" - 5'6\"", weight: "55-65 kg" },
    SizeRow { size: "M", chest: "38-40 inches", length: "27 inches", height: "5'6\" - 5'8\"", weight: "65-75 kg" },
    SizeRow { size: "L", chest: "40-42 inches", length: "28 inches", height: "5'8\" - 5'10\"", weight: "75-85 kg" },
    SizeRow { size: "XL", chest: "42-44 inches", length: "29 inches", height: "5'10\" - 6'0\"", weight: "85-95 kg" },
    SizeRow { size: "XXL", chest: "44-46 inches", length: "30 inches", height: "6'0\"+", weight: "95+ kg" },
];

pub const AI_GUIDELINES: &str = "\
CUSTOMER SERVICE GUIDELINES:

PERSONALITY:
- Be friendly, warm, and professional
- Use appropriate Bengali cultural references
- Add emojis to make responses feel friendly
- Keep responses concise but informative

ACCURACY:
- Always use real product data from the database section
- Never make up product names or prices
- If unsure, offer to connect with human support
- Be honest about stock availability

HELPFULNESS:
- Suggest alternatives if an item is out of stock
- Help with sizing recommendations
- Guide customers through the ordering process

ESCALATION:
- Offer human support for complex issues
- Provide contact information when needed
- Never argue with customers

LANGUAGE:
- Use simple, clear English
- Understand common Bengali transliterations
- Handle both English and Bangla queries
";

/// Lifecycle status of a storefront order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Returned,
    ];

    /// Case-insensitive parse of the storefront's status column
    pub fn parse(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|s| s.label().to_ascii_lowercase() == lowered)
    }

    /// Parse with the storefront's default for unknown values
    pub fn from_db(raw: Option<&str>) -> Self {
        raw.and_then(Self::parse).unwrap_or(OrderStatus::Pending)
    }

    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Returned => "Returned",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            OrderStatus::Pending => "⏳",
            OrderStatus::Confirmed => "✅",
            OrderStatus::Processing => "📦",
            OrderStatus::Shipped => "🚚",
            OrderStatus::Delivered => "✅",
            OrderStatus::Cancelled => "❌",
            OrderStatus::Returned => "↩️",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Order received, awaiting confirmation",
            OrderStatus::Confirmed => "Order confirmed, preparing for shipment",
            OrderStatus::Processing => "Order is being packed",
            OrderStatus::Shipped => "Order has been dispatched",
            OrderStatus::Delivered => "Order successfully delivered",
            OrderStatus::Cancelled => "Order was cancelled",
            OrderStatus::Returned => "Order was returned",
        }
    }

    /// What the customer should expect next
    pub fn next_step(self) -> &'static str {
        match self {
            OrderStatus::Pending => "We'll confirm your order within 24 hours.",
            OrderStatus::Confirmed | OrderStatus::Processing => "Your order will be shipped soon.",
            OrderStatus::Shipped => "Your order is on the way! Expected delivery in 1-5 days.",
            OrderStatus::Delivered => "Thank you for shopping with us!",
            OrderStatus::Cancelled | OrderStatus::Returned => {
                "Contact support if you have any questions."
            }
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Delivery charge for a subtotal, honouring the free-delivery threshold
pub fn delivery_charge(inside_dhaka: bool, subtotal: f64) -> u32 {
    let policy = if inside_dhaka { INSIDE_DHAKA } else { OUTSIDE_DHAKA };
    if subtotal >= f64::from(policy.free_above) {
        0
    } else {
        policy.charge
    }
}

/// Recommend a size from height (cm) and weight (kg)
pub fn size_recommendation(height_cm: u32, weight_kg: u32) -> &'static str {
    if weight_kg < 65 && height_cm < 170 {
        "S"
    } else if weight_kg < 75 && height_cm < 175 {
        "M"
    } else if weight_kg < 85 && height_cm < 180 {
        "L"
    } else if weight_kg < 95 && height_cm < 185 {
        "XL"
    } else {
        "XXL"
    }
}

pub fn size_guide_row(size: &str) -> Option<&'static SizeRow> {
    SIZE_GUIDE.iter().find(|row| row.size.eq_ignore_ascii_case(size))
}

/// Policy block injected into AI prompts
pub fn full_policy_text() -> String {
    let mut text = String::from("BUSINESS POLICIES & INFORMATION:\n\nDELIVERY:\n");
    for policy in [INSIDE_DHAKA, OUTSIDE_DHAKA] {
        let _ = writeln!(text, "- {}: {} (৳{} charge)", policy.name, policy.time, policy.charge);
        let _ = writeln!(text, "  Free delivery on orders above ৳{}", policy.free_above);
    }

    text.push_str("\nPAYMENT METHODS:\n");
    for method in PAYMENT_METHODS {
        match method.number {
            Some(number) => {
                let _ = writeln!(text, "- {}: {}", method.name, number);
            }
            None => {
                let _ = writeln!(text, "- {}", method.name);
            }
        }
    }

    text.push_str("\nRETURN & EXCHANGE:\n");
    let _ = writeln!(text, "- Exchange within {EXCHANGE_WINDOW_DAYS} days");
    for condition in RETURN_CONDITIONS {
        let _ = writeln!(text, "  • {condition}");
    }
    for note in [SIZE_EXCHANGE_NOTE, SALE_ITEMS_NOTE, DEFECTIVE_NOTE] {
        let _ = writeln!(text, "- {note}");
    }

    text.push_str("\nCONTACT:\n");
    let _ = writeln!(text, "- Phone/WhatsApp: {}", CONTACT.phone);
    let _ = writeln!(text, "- Email: {}", CONTACT.email);
    let _ = writeln!(text, "- Facebook: {}", CONTACT.facebook);
    let _ = writeln!(text, "- Website: {}", CONTACT.website);

    text.push_str("\nBUSINESS HOURS:\n");
    let _ = writeln!(text, "- {OPEN_DAYS}: {OPEN_HOURS}");
    let _ = writeln!(text, "- {CLOSED_DAY}");

    text.push('\n');
    text.push_str(AI_GUIDELINES);
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_recommendation_thresholds() {
        assert_eq!(size_recommendation(160, 60), "S");
        assert_eq!(size_recommendation(172, 70), "M");
        assert_eq!(size_recommendation(178, 80), "L");
        assert_eq!(size_recommendation(183, 90), "XL");
        assert_eq!(size_recommendation(190, 100), "XXL");
        // Tall but light still moves up a size
        assert_eq!(size_recommendation(176, 60), "L");
    }

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!(OrderStatus::parse("shipped"), Some(OrderStatus::Shipped));
        assert_eq!(OrderStatus::parse(" DELIVERED "), Some(OrderStatus::Delivered));
        assert_eq!(OrderStatus::parse("lost"), None);
        assert_eq!(OrderStatus::from_db(Some("lost")), OrderStatus::Pending);
        assert_eq!(OrderStatus::from_db(None), OrderStatus::Pending);
    }

    #[test]
    fn test_delivery_charge_threshold() {
        assert_eq!(delivery_charge(true, 999.0), 60);
        assert_eq!(delivery_charge(true, 1000.0), 0);
        assert_eq!(delivery_charge(false, 1500.0), 120);
        assert_eq!(delivery_charge(false, 2500.0), 0);
    }

    #[test]
    fn test_policy_text_mentions_every_section() {
        let text = full_policy_text();
        for needle in ["DELIVERY:", "bKash", "Exchange within 7 days", "support@nongor.com", "Friday"] {
            assert!(text.contains(needle), "missing {needle}");
        }
    }
}
