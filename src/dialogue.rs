//! Conversation state and input validation for the storefront bot.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

/// Who the assistant is talking to when in AI chat
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiMode {
    /// Friendly shopping assistant
    Customer,
    /// Business analyst with access to the admin dashboard
    Analyst,
}

impl AiMode {
    pub fn role(self) -> &'static str {
        match self {
            AiMode::Customer => "user",
            AiMode::Analyst => "admin",
        }
    }
}

/// What the bot expects from the user's next free-text message
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum BotState {
    #[default]
    Menu,
    AwaitingOrderId,
    AwaitingPhone,
    /// Admin order search
    AwaitingSearch,
    AiChat {
        mode: AiMode,
    },
    /// Admin composing a message for every known user
    AwaitingBroadcast,
}

/// Type alias for the storefront dialogue
pub type BotDialogue = Dialogue<BotState, InMemStorage<BotState>>;

lazy_static! {
    static ref BD_PHONE: Regex = Regex::new(r"01[3-9]\d{8}").unwrap();
    static ref ORDER_REF: Regex = Regex::new(r"(?i)(?:^|[^\w])#?(?:NG-)?(\d{1,6})\b").unwrap();
    static ref ORDER_INPUT: Regex = Regex::new(r"^#?[A-Za-z0-9][A-Za-z0-9-]{0,31}$").unwrap();
}

const ORDER_KEYWORDS: [&str; 9] = [
    "order",
    "track",
    "delivery",
    "shipped",
    "status",
    "where is",
    "আমার অর্ডার",
    "ডেলিভারি",
    "কোথায়",
];

/// Validates a Bangladeshi mobile number, returning it as `01XXXXXXXXX`
pub fn validate_phone(input: &str) -> Result<String, &'static str> {
    let compact: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();

    if compact.is_empty() {
        return Err("empty");
    }

    let local = compact
        .strip_prefix("+88")
        .or_else(|| compact.strip_prefix("88"))
        .unwrap_or(&compact);

    if local.len() == 11 && BD_PHONE.is_match(local) {
        Ok(local.to_string())
    } else {
        Err("invalid_phone")
    }
}

/// Validates an order reference such as `#NG-63497`, `NG-12` or `1234`
pub fn validate_order_reference(input: &str) -> Result<String, &'static str> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err("empty");
    }

    if !ORDER_INPUT.is_match(trimmed) {
        return Err("invalid_order_id");
    }

    Ok(trimmed.to_string())
}

/// Validates an admin search term
pub fn validate_search_term(input: &str) -> Result<String, &'static str> {
    let trimmed = input.trim();

    if trimmed.chars().count() < 2 {
        return Err("too_short");
    }

    if trimmed.chars().count() > 64 {
        return Err("too_long");
    }

    Ok(trimmed.to_string())
}

/// Order tracking request spotted in free text
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderInquiry {
    Phone(String),
    OrderNumber(i64),
    /// Tracking intent without anything to look up
    NeedsDetails,
}

/// Spot an order-tracking question, preferring a phone number over an order number
pub fn detect_order_inquiry(message: &str) -> Option<OrderInquiry> {
    let lowered = message.to_lowercase();
    if !ORDER_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        return None;
    }

    let compact: String = message
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .collect();
    if let Some(found) = BD_PHONE.find(&compact) {
        return Some(OrderInquiry::Phone(found.as_str().to_string()));
    }

    let number = ORDER_REF
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok());

    Some(match number {
        Some(n) => OrderInquiry::OrderNumber(n),
        None => OrderInquiry::NeedsDetails,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_validation() {
        assert_eq!(validate_phone("01711-222333"), Ok("01711222333".to_string()));
        assert_eq!(validate_phone("+880 1711 222333"), Ok("01711222333".to_string()));
        assert_eq!(validate_phone("01211222333"), Err("invalid_phone"));
        assert_eq!(validate_phone("0171122233"), Err("invalid_phone"));
        assert_eq!(validate_phone("   "), Err("empty"));
    }

    #[test]
    fn test_order_reference_validation() {
        assert!(validate_order_reference("#NG-63497").is_ok());
        assert!(validate_order_reference(" 1234 ").is_ok());
        assert!(validate_order_reference("").is_err());
        assert!(validate_order_reference("drop table").is_err());
    }

    #[test]
    fn test_search_term_validation() {
        assert!(validate_search_term("a").is_err());
        assert_eq!(validate_search_term("  Rahim "), Ok("Rahim".to_string()));
        assert!(validate_search_term(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_detect_order_inquiry() {
        assert_eq!(
            detect_order_inquiry("where is my order? 01711-222333"),
            Some(OrderInquiry::Phone("01711222333".to_string()))
        );
        assert_eq!(
            detect_order_inquiry("Track order #NG-1234 please"),
            Some(OrderInquiry::OrderNumber(1234))
        );
        assert_eq!(
            detect_order_inquiry("আমার অর্ডার কোথায়?"),
            Some(OrderInquiry::NeedsDetails)
        );
        assert_eq!(detect_order_inquiry("Do you have red panjabi?"), None);
    }

    #[test]
    fn test_order_number_needs_a_leading_boundary() {
        assert_eq!(
            detect_order_inquiry("order 1234567"),
            Some(OrderInquiry::NeedsDetails)
        );
        assert_eq!(
            detect_order_inquiry("my order abc123"),
            Some(OrderInquiry::NeedsDetails)
        );
        assert_eq!(
            detect_order_inquiry("order#4521 status"),
            Some(OrderInquiry::OrderNumber(4521))
        );
        assert_eq!(
            detect_order_inquiry("order NG-77"),
            Some(OrderInquiry::OrderNumber(77))
        );
    }

    #[test]
    fn test_default_state_is_menu() {
        assert_eq!(BotState::default(), BotState::Menu);
        assert_eq!(AiMode::Analyst.role(), "admin");
    }
}
