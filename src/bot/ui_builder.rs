//! UI Builder module for inline keyboards and typed callback data

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

// Import localization
use crate::localization::t_lang;

use crate::business::{OrderStatus, CONTACT};

/// Every inline button action, serialized as the button's callback data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    AdminDashboard,
    AdminOrders,
    AdminSales,
    AdminInventory,
    AdminUsers,
    AdminAnalytics,
    AdminProducts,
    AdminCoupons,
    AdminSearch,
    AdminFilter,
    AdminExport,
    AdminChart,
    AdminAi,
    UserAiChat,
    UserTrackOrder,
    UserProducts,
    UserAbout,
    UserContact,
    UserSupport,
    UserPolicies,
    TrackByPhone,
    TrackById,
    BackMenu,
    RefreshData,
    /// `None` lists orders of every status
    Filter(Option<OrderStatus>),
}

const SIMPLE_ACTIONS: [(MenuAction, &str); 24] = [
    (MenuAction::AdminDashboard, "admin_dashboard"),
    (MenuAction::AdminOrders, "admin_orders"),
    (MenuAction::AdminSales, "admin_sales"),
    (MenuAction::AdminInventory, "admin_inventory"),
    (MenuAction::AdminUsers, "admin_users"),
    (MenuAction::AdminAnalytics, "admin_analytics"),
    (MenuAction::AdminProducts, "admin_products"),
    (MenuAction::AdminCoupons, "admin_coupons"),
    (MenuAction::AdminSearch, "admin_search"),
    (MenuAction::AdminFilter, "admin_filter"),
    (MenuAction::AdminExport, "admin_export"),
    (MenuAction::AdminChart, "admin_chart"),
    (MenuAction::AdminAi, "admin_ai"),
    (MenuAction::UserAiChat, "user_ai_chat"),
    (MenuAction::UserTrackOrder, "user_track_order"),
    (MenuAction::UserProducts, "user_products"),
    (MenuAction::UserAbout, "user_about"),
    (MenuAction::UserContact, "user_contact"),
    (MenuAction::UserSupport, "user_support"),
    (MenuAction::UserPolicies, "user_policies"),
    (MenuAction::TrackByPhone, "track_by_phone"),
    (MenuAction::TrackById, "track_by_id"),
    (MenuAction::BackMenu, "back_menu"),
    (MenuAction::RefreshData, "refresh_data"),
];

impl MenuAction {
    pub fn parse(data: &str) -> Option<Self> {
        if let Some(status) = data.strip_prefix("filter_") {
            return if status == "all" {
                Some(MenuAction::Filter(None))
            } else {
                OrderStatus::parse(status).map(|s| MenuAction::Filter(Some(s)))
            };
        }
        SIMPLE_ACTIONS
            .iter()
            .find(|(_, name)| *name == data)
            .map(|(action, _)| *action)
    }

    pub fn as_data(self) -> String {
        match self {
            MenuAction::Filter(None) => "filter_all".to_string(),
            MenuAction::Filter(Some(status)) => format!("filter_{}", status.label().to_lowercase()),
            action => SIMPLE_ACTIONS
                .iter()
                .find(|(a, _)| *a == action)
                .map(|(_, name)| (*name).to_string())
                .unwrap_or_default(),
        }
    }

    pub fn requires_admin(self) -> bool {
        matches!(
            self,
            MenuAction::AdminDashboard
                | MenuAction::AdminOrders
                | MenuAction::AdminSales
                | MenuAction::AdminInventory
                | MenuAction::AdminUsers
                | MenuAction::AdminAnalytics
                | MenuAction::AdminProducts
                | MenuAction::AdminCoupons
                | MenuAction::AdminSearch
                | MenuAction::AdminFilter
                | MenuAction::AdminExport
                | MenuAction::AdminChart
                | MenuAction::AdminAi
                | MenuAction::RefreshData
                | MenuAction::Filter(_)
        )
    }
}

fn button(key: &str, action: MenuAction, language_code: Option<&str>) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(t_lang(key, language_code), action.as_data())
}

fn website_button(language_code: Option<&str>) -> Option<InlineKeyboardButton> {
    reqwest::Url::parse(CONTACT.website)
        .ok()
        .map(|url| InlineKeyboardButton::url(t_lang("btn-website", language_code), url))
}

pub fn admin_menu_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    let rows = [
        [("btn-dashboard", MenuAction::AdminDashboard), ("btn-orders", MenuAction::AdminOrders)],
        [("btn-sales", MenuAction::AdminSales), ("btn-inventory", MenuAction::AdminInventory)],
        [("btn-analytics", MenuAction::AdminAnalytics), ("btn-products", MenuAction::AdminProducts)],
        [("btn-coupons", MenuAction::AdminCoupons), ("btn-users", MenuAction::AdminUsers)],
        [("btn-search", MenuAction::AdminSearch), ("btn-filter", MenuAction::AdminFilter)],
        [("btn-export", MenuAction::AdminExport), ("btn-chart", MenuAction::AdminChart)],
        [("btn-ai-analyst", MenuAction::AdminAi), ("btn-refresh", MenuAction::RefreshData)],
    ];

    InlineKeyboardMarkup::new(rows.iter().map(|row| {
        row.iter()
            .map(|(key, action)| button(key, *action, language_code))
            .collect::<Vec<_>>()
    }))
}

pub fn user_menu_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    let mut rows = vec![
        vec![
            button("btn-ai-chat", MenuAction::UserAiChat, language_code),
            button("btn-track", MenuAction::UserTrackOrder, language_code),
        ],
        vec![
            button("btn-products", MenuAction::UserProducts, language_code),
            button("btn-policies", MenuAction::UserPolicies, language_code),
        ],
        vec![
            button("btn-about", MenuAction::UserAbout, language_code),
            button("btn-contact", MenuAction::UserContact, language_code),
        ],
        vec![button("btn-support", MenuAction::UserSupport, language_code)],
    ];
    if let Some(website) = website_button(language_code) {
        rows.push(vec![website]);
    }
    InlineKeyboardMarkup::new(rows)
}

pub fn menu_keyboard(is_admin: bool, language_code: Option<&str>) -> InlineKeyboardMarkup {
    if is_admin {
        admin_menu_keyboard(language_code)
    } else {
        user_menu_keyboard(language_code)
    }
}

pub fn track_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            button("btn-by-phone", MenuAction::TrackByPhone, language_code),
            button("btn-by-id", MenuAction::TrackById, language_code),
        ],
        vec![button("btn-back", MenuAction::BackMenu, language_code)],
    ])
}

pub fn filter_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = OrderStatus::ALL
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|status| {
                    InlineKeyboardButton::callback(
                        format!("{} {}", status.emoji(), status.label()),
                        MenuAction::Filter(Some(*status)).as_data(),
                    )
                })
                .collect()
        })
        .collect();
    rows.push(vec![
        button("btn-filter-all", MenuAction::Filter(None), language_code),
        button("btn-back", MenuAction::BackMenu, language_code),
    ]);
    InlineKeyboardMarkup::new(rows)
}

pub fn back_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![button("btn-back", MenuAction::BackMenu, language_code)]])
}

/// Back button plus a refresh for data screens
pub fn data_keyboard(refresh: MenuAction, language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button("btn-refresh", refresh, language_code),
        button("btn-back", MenuAction::BackMenu, language_code),
    ]])
}

pub fn ai_chat_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![button("btn-end-chat", MenuAction::BackMenu, language_code)]])
}

pub fn support_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    let mut rows = vec![vec![
        button("btn-ai-chat", MenuAction::UserAiChat, language_code),
        button("btn-track", MenuAction::UserTrackOrder, language_code),
    ]];
    if let Some(website) = website_button(language_code) {
        rows.push(vec![website]);
    }
    rows.push(vec![button("btn-back", MenuAction::BackMenu, language_code)]);
    InlineKeyboardMarkup::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_data_round_trips() {
        for (action, name) in SIMPLE_ACTIONS {
            assert_eq!(MenuAction::parse(name), Some(action));
            assert_eq!(action.as_data(), name);
        }
        assert_eq!(MenuAction::parse("filter_shipped"), Some(MenuAction::Filter(Some(OrderStatus::Shipped))));
        assert_eq!(MenuAction::parse("filter_all"), Some(MenuAction::Filter(None)));
        assert_eq!(MenuAction::Filter(Some(OrderStatus::Pending)).as_data(), "filter_pending");
    }

    #[test]
    fn test_unknown_data() {
        assert_eq!(MenuAction::parse("admin_rocket"), None);
        assert_eq!(MenuAction::parse("filter_lost"), None);
        assert_eq!(MenuAction::parse(""), None);
    }

    #[test]
    fn test_admin_actions_are_guarded() {
        assert!(MenuAction::AdminExport.requires_admin());
        assert!(MenuAction::Filter(None).requires_admin());
        assert!(!MenuAction::UserTrackOrder.requires_admin());
        assert!(!MenuAction::BackMenu.requires_admin());
    }

    #[test]
    fn test_callback_data_fits_telegram_limit() {
        for (action, _) in SIMPLE_ACTIONS {
            assert!(action.as_data().len() <= 64);
        }
    }
}
