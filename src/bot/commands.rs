//! Slash commands understood by the bot

use teloxide::macros::BotCommands;

/// Telegram user id argument of `/addadmin` and `/removeadmin`
pub use crate::config::parse_user_id;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Nongor assistant commands:")]
pub enum Command {
    #[command(description = "Open the main menu")]
    Start,
    #[command(description = "Show the main menu")]
    Menu,
    #[command(description = "Show available commands")]
    Help,
    #[command(description = "Business overview (admin)")]
    Dashboard,
    #[command(description = "Recent orders (admin)")]
    Orders,
    #[command(description = "Sales report (admin)")]
    Sales,
    #[command(description = "Stock levels (admin)")]
    Inventory,
    #[command(description = "Customer and payment analytics (admin)")]
    Analytics,
    #[command(description = "Browse or search products")]
    Products { term: String },
    #[command(description = "Active coupons (admin)")]
    Coupons,
    #[command(description = "Check a coupon: /coupon <code> <amount>")]
    Coupon { args: String },
    #[command(description = "Customer profile by phone (admin)")]
    Customer { phone: String },
    #[command(description = "Top, returning or inactive customers (admin)")]
    Customers { kind: String },
    #[command(description = "Search orders (admin)")]
    Search { term: String },
    #[command(description = "Orders by status (admin)")]
    Filter,
    #[command(description = "Export orders as CSV (admin)")]
    Export,
    #[command(description = "7-day sales chart (admin)")]
    Chart,
    #[command(description = "Bot usage statistics (admin)")]
    Users,
    #[command(description = "Website health, or turn monitoring on/off (admin)")]
    Monitor { args: String },
    #[command(description = "New order alert status, or turn alerts on/off (admin)")]
    Alerts { args: String },
    #[command(description = "Send the daily or weekly report now (admin)")]
    Report { kind: String },
    #[command(description = "Clear cached AI context (admin)")]
    Refresh,
    #[command(description = "Bot status (admin)")]
    Status,
    #[command(description = "Update an order status (admin)")]
    Setstatus { args: String },
    #[command(description = "Chat with the AI assistant")]
    Ai,
    #[command(description = "Track an order by phone or order ID")]
    Track { query: String },
    #[command(description = "About us")]
    About,
    #[command(description = "Contact information")]
    Contact,
    #[command(description = "Delivery, payment and return policies")]
    Policies,
    #[command(description = "Get help")]
    Support,
    #[command(description = "Size recommendation: /size <height cm> <weight kg>")]
    Size { args: String },
    #[command(description = "Leave the current step")]
    Cancel,
    #[command(description = "List admins (admin)")]
    Admins,
    #[command(description = "Grant admin rights (admin)")]
    Addadmin { user_id: String },
    #[command(description = "Revoke admin rights (admin)")]
    Removeadmin { user_id: String },
    #[command(description = "Recent admin actions (admin)")]
    Audit,
    #[command(description = "Message every bot user (admin)")]
    Broadcast,
}

impl Command {
    /// Commands only admins may run
    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            Command::Dashboard
                | Command::Orders
                | Command::Sales
                | Command::Inventory
                | Command::Analytics
                | Command::Coupons
                | Command::Customer { .. }
                | Command::Customers { .. }
                | Command::Search { .. }
                | Command::Filter
                | Command::Export
                | Command::Chart
                | Command::Users
                | Command::Monitor { .. }
                | Command::Alerts { .. }
                | Command::Report { .. }
                | Command::Refresh
                | Command::Status
                | Command::Setstatus { .. }
                | Command::Admins
                | Command::Addadmin { .. }
                | Command::Removeadmin { .. }
                | Command::Audit
                | Command::Broadcast
        )
    }
}

/// `on` / `off` argument of the service toggles; anything else shows status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
    Show,
}

impl Toggle {
    pub fn parse(args: &str) -> Self {
        match args.trim().to_ascii_lowercase().as_str() {
            "on" | "start" | "enable" => Toggle::On,
            "off" | "stop" | "disable" => Toggle::Off,
            _ => Toggle::Show,
        }
    }
}

/// Which ranking `/customers` shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerList {
    Top,
    Returning,
    Inactive,
}

impl CustomerList {
    /// Empty input means the top spenders; unknown input is `None`
    pub fn parse(kind: &str) -> Option<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "" | "top" => Some(CustomerList::Top),
            "returning" | "repeat" => Some(CustomerList::Returning),
            "inactive" => Some(CustomerList::Inactive),
            _ => None,
        }
    }
}

/// Split `/coupon <code> <amount>`; the amount may carry `৳` and thousands separators
pub fn parse_coupon_check(args: &str) -> Option<(&str, f64)> {
    let mut parts = args.split_whitespace();
    let (code, amount) = match (parts.next(), parts.next(), parts.next()) {
        (Some(code), Some(amount), None) => (code, amount),
        _ => return None,
    };
    let cleaned: String = amount.chars().filter(|c| *c != ',' && *c != '৳').collect();
    let amount = cleaned.parse::<f64>().ok().filter(|a| a.is_finite() && *a > 0.0)?;
    Some((code, amount))
}

/// Split `/setstatus <order> <status>` arguments
pub fn parse_set_status(args: &str) -> Option<(&str, &str)> {
    let mut parts = args.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(order), Some(status), None) => Some((order, status)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::utils::command::BotCommands as _;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start", "nongor_bot").unwrap(), Command::Start);
        assert_eq!(
            Command::parse("/setstatus NG-12 shipped", "nongor_bot").unwrap(),
            Command::Setstatus {
                args: "NG-12 shipped".to_string()
            }
        );
        assert_eq!(
            Command::parse("/products panjabi", "nongor_bot").unwrap(),
            Command::Products {
                term: "panjabi".to_string()
            }
        );
    }

    #[test]
    fn test_admin_commands() {
        assert!(Command::Export.requires_admin());
        assert!(Command::Broadcast.requires_admin());
        assert!(!Command::Track { query: String::new() }.requires_admin());
        assert!(!Command::Products { term: String::new() }.requires_admin());
    }

    #[test]
    fn test_coupon_check_args() {
        assert_eq!(parse_coupon_check("EID20 1500"), Some(("EID20", 1500.0)));
        assert_eq!(parse_coupon_check("eid20 ৳2,450"), Some(("eid20", 2450.0)));
        assert_eq!(parse_coupon_check("EID20"), None);
        assert_eq!(parse_coupon_check("EID20 -5"), None);
        assert_eq!(parse_coupon_check("EID20 lots"), None);
        assert!(!Command::Coupon { args: String::new() }.requires_admin());
        assert!(Command::Customer { phone: String::new() }.requires_admin());
    }

    #[test]
    fn test_customer_list_kind() {
        assert_eq!(CustomerList::parse(""), Some(CustomerList::Top));
        assert_eq!(CustomerList::parse("Returning"), Some(CustomerList::Returning));
        assert_eq!(CustomerList::parse("inactive"), Some(CustomerList::Inactive));
        assert_eq!(CustomerList::parse("vip"), None);
    }

    #[test]
    fn test_toggle() {
        assert_eq!(Toggle::parse("ON"), Toggle::On);
        assert_eq!(Toggle::parse(" off "), Toggle::Off);
        assert_eq!(Toggle::parse(""), Toggle::Show);
    }

    #[test]
    fn test_set_status_args() {
        assert_eq!(parse_set_status("#NG-1 delivered"), Some(("#NG-1", "delivered")));
        assert_eq!(parse_set_status("NG-1"), None);
        assert_eq!(parse_set_status("a b c"), None);
        assert_eq!(parse_user_id(" 12345 "), Some(12345));
        assert_eq!(parse_user_id("abc"), None);
        assert_eq!(parse_user_id("0"), None);
    }
}
