//! # Localization Tests
//!
//! Message lookup, argument substitution and language fallback.

use nongor::localization::LocalizationManager;

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_localization() -> LocalizationManager {
        LocalizationManager::new().expect("Failed to create localization manager")
    }

    #[test]
    fn test_get_message_existing_key() {
        let manager = setup_localization();
        let message = manager.get_message("help-user", &[], Some("en"));
        assert!(message.contains("/track"));
    }

    #[test]
    fn test_get_message_nonexistent_key() {
        let manager = setup_localization();
        let message = manager.get_message("nonexistent-key", &[], None);
        assert_eq!(message, "Missing translation: nonexistent-key");
    }

    #[test]
    fn test_arguments_have_no_isolation_marks() {
        let manager = setup_localization();
        let message = manager.get_message("admin-added", &[("id", "12345")], None);
        assert!(message.contains("<code>12345</code>"));
        assert!(!message.contains('\u{2068}'));
    }

    #[test]
    fn test_language_resolution() {
        assert_eq!(LocalizationManager::resolve_language(Some("bn-BD")), "bn");
        assert_eq!(LocalizationManager::resolve_language(Some("fr")), "en");
        assert_eq!(LocalizationManager::resolve_language(None), "en");

        let manager = setup_localization();
        assert!(manager.is_language_supported("bn"));
        assert!(!manager.is_language_supported("fr"));
    }

    #[test]
    fn test_bengali_falls_back_per_key() {
        let manager = setup_localization();
        let english = manager.get_message("btn-back", &[], Some("en"));
        let bengali = manager.get_message("btn-back", &[], Some("bn"));
        assert!(!bengali.starts_with("Missing translation"));
        assert!(!english.is_empty());

        // Every English key resolves in Bengali, translated or not
        for key in ["export-caption", "chart-caption", "broadcast-done", "error-generic"] {
            assert!(!manager.get_message(key, &[], Some("bn")).starts_with("Missing translation"));
        }
    }
}
