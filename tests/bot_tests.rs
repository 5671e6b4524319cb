use nongor::bot::commands::{parse_set_status, Command, Toggle};
use nongor::bot::ui_builder::{
    admin_menu_keyboard, filter_keyboard, menu_keyboard, track_keyboard, user_menu_keyboard, MenuAction,
};
use nongor::bot::views;
use nongor::business::OrderStatus;
use nongor::localization::init_localization;
use teloxide::types::{InlineKeyboardButtonKind, InlineKeyboardMarkup};
use teloxide::utils::command::BotCommands;

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_localization() {
        let _ = init_localization();
    }

    fn callback_data(markup: &InlineKeyboardMarkup) -> Vec<String> {
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|button| match &button.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every button the bot renders must be understood by the callback handler
    #[test]
    fn test_all_buttons_parse() {
        setup_localization();
        let keyboards = [
            admin_menu_keyboard(None),
            user_menu_keyboard(None),
            track_keyboard(None),
            filter_keyboard(None),
            views::support(None).keyboard,
        ];
        for keyboard in &keyboards {
            for data in callback_data(keyboard) {
                assert!(MenuAction::parse(&data).is_some(), "unparsed callback data: {data}");
            }
        }
    }

    #[test]
    fn test_user_menu_has_no_admin_actions() {
        setup_localization();
        for data in callback_data(&user_menu_keyboard(Some("bn"))) {
            let action = MenuAction::parse(&data).expect("known action");
            assert!(!action.requires_admin(), "{data} leaked into the user menu");
        }
        assert!(callback_data(&menu_keyboard(true, None)).contains(&"admin_dashboard".to_string()));
    }

    #[test]
    fn test_user_menu_links_to_website() {
        setup_localization();
        let has_url = user_menu_keyboard(None)
            .inline_keyboard
            .iter()
            .flatten()
            .any(|button| matches!(button.kind, InlineKeyboardButtonKind::Url(_)));
        assert!(has_url);
    }

    #[test]
    fn test_filter_keyboard_covers_every_status() {
        setup_localization();
        let data = callback_data(&filter_keyboard(None));
        for status in OrderStatus::ALL {
            assert!(data.contains(&MenuAction::Filter(Some(status)).as_data()));
        }
        assert!(data.contains(&"filter_all".to_string()));
    }

    #[test]
    fn test_command_descriptions() {
        let commands = Command::bot_commands();
        let names: Vec<&str> = commands.iter().map(|c| c.command.trim_start_matches('/')).collect();
        assert!(names.contains(&"track"));
        assert!(names.contains(&"setstatus"));
        assert!(commands.iter().all(|c| !c.description.is_empty()));
    }

    #[test]
    fn test_command_arguments() {
        assert_eq!(
            Command::parse("/monitor off", "nongor_bot").unwrap(),
            Command::Monitor { args: "off".to_string() }
        );
        assert_eq!(Toggle::parse("off"), Toggle::Off);
        assert_eq!(parse_set_status("NG-7 returned"), Some(("NG-7", "returned")));
        assert!(Command::parse("/size 170 70", "nongor_bot").is_ok());
    }

    #[test]
    fn test_customer_commands_are_admin_only() {
        let customer = Command::parse("/customer 01711222333", "nongor_bot").unwrap();
        assert_eq!(customer, Command::Customer { phone: "01711222333".to_string() });
        assert!(customer.requires_admin());
        assert!(Command::parse("/customers inactive", "nongor_bot").unwrap().requires_admin());

        let coupon = Command::parse("/coupon EID20 2500", "nongor_bot").unwrap();
        assert_eq!(coupon, Command::Coupon { args: "EID20 2500".to_string() });
        assert!(!coupon.requires_admin());
    }

    #[test]
    fn test_welcome_escapes_names() {
        setup_localization();
        let screen = views::welcome("<Rahim & Co>", false, None);
        assert!(screen.text.contains("&lt;Rahim &amp; Co&gt;"));
        assert!(!screen.text.contains("<Rahim"));
    }

    #[test]
    fn test_help_lists_admin_commands_only_for_admins() {
        setup_localization();
        assert!(!views::help(false, None).text.contains("/broadcast"));
        assert!(views::help(true, None).text.contains("/broadcast"));
    }
}
