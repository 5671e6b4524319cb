use anyhow::Result;

use nongor::dialogue::{
    detect_order_inquiry, validate_order_reference, validate_phone, validate_search_term, AiMode, BotState,
    OrderInquiry,
};

/// Phone numbers are accepted in the formats customers actually type
#[test]
fn test_phone_formats() {
    for input in ["01711222333", "+8801711222333", "8801711222333", "017-1122-2333", "0171 122 2333"] {
        assert_eq!(validate_phone(input), Ok("01711222333".to_string()), "input: {input}");
    }

    assert_eq!(validate_phone(""), Err("empty"));
    assert_eq!(validate_phone("01211222333"), Err("invalid_phone"));
    assert_eq!(validate_phone("0171122233"), Err("invalid_phone"));
}

#[test]
fn test_order_references() {
    assert_eq!(validate_order_reference(" #NG-63497 "), Ok("#NG-63497".to_string()));
    assert_eq!(validate_order_reference("1234"), Ok("1234".to_string()));
    assert_eq!(validate_order_reference(""), Err("empty"));
    assert_eq!(validate_order_reference("where is my order?"), Err("invalid_order_id"));
}

#[test]
fn test_search_terms() {
    assert_eq!(validate_search_term("  rahim "), Ok("rahim".to_string()));
    assert_eq!(validate_search_term("a"), Err("too_short"));
    assert_eq!(validate_search_term(&"x".repeat(65)), Err("too_long"));
}

#[test]
fn test_order_inquiry_prefers_phone() {
    assert_eq!(
        detect_order_inquiry("order #1234 for 01711222333"),
        Some(OrderInquiry::Phone("01711222333".to_string()))
    );
    assert_eq!(detect_order_inquiry("where is my delivery"), Some(OrderInquiry::NeedsDetails));
    assert_eq!(detect_order_inquiry("hello"), None);
}

/// Dialogue states survive a serde round trip, as storage backends require
#[tokio::test]
async fn test_dialogue_state_serialization() -> Result<()> {
    let states = [
        BotState::Menu,
        BotState::AwaitingPhone,
        BotState::AiChat { mode: AiMode::Analyst },
        BotState::AwaitingBroadcast,
    ];
    for state in states {
        let json = serde_json::to_string(&state)?;
        let back: BotState = serde_json::from_str(&json)?;
        assert_eq!(back, state);
    }
    assert_eq!(BotState::default(), BotState::Menu);
    Ok(())
}
