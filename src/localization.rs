//! Fluent-based localization for user-facing bot text.
//!
//! English is complete; Bengali covers the customer-facing strings and
//! falls back to English key by key.

use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::collections::HashMap;
use std::sync::OnceLock;
use unic_langid::LanguageIdentifier;

const DEFAULT_LANGUAGE: &str = "en";

const LOCALES: [(&str, &str); 2] = [
    ("en", include_str!("../locales/en/main.ftl")),
    ("bn", include_str!("../locales/bn/main.ftl")),
];

/// Localization manager for the storefront bot
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Build bundles for every compiled-in locale
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();

        for (code, source) in LOCALES {
            let locale: LanguageIdentifier = code.parse()?;
            bundles.insert(code.to_string(), Self::create_bundle(locale, source)?);
        }

        Ok(Self { bundles })
    }

    fn create_bundle(locale: LanguageIdentifier, source: &str) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        // Telegram renders Unicode isolation marks literally around placeables
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("Invalid FTL for {locale}: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("Duplicate FTL messages for {locale}: {errors:?}"))?;

        Ok(bundle)
    }

    /// Map a Telegram language code to a supported locale
    pub fn resolve_language(language_code: Option<&str>) -> &'static str {
        match language_code {
            Some(code) if code.to_ascii_lowercase().starts_with("bn") => "bn",
            _ => DEFAULT_LANGUAGE,
        }
    }

    pub fn is_language_supported(&self, language: &str) -> bool {
        self.bundles.contains_key(language)
    }

    fn format(&self, language: &str, key: &str, args: Option<&FluentArgs>) -> Option<String> {
        let bundle = self.bundles.get(language)?;
        let pattern = bundle.get_message(key)?.value()?;

        let mut errors = vec![];
        let value = bundle.format_pattern(pattern, args, &mut errors);
        Some(value.into_owned())
    }

    /// Get a localized message, falling back to English and then to the key itself
    pub fn get_message(&self, key: &str, args: &[(&str, &str)], language: Option<&str>) -> String {
        let language = Self::resolve_language(language);
        let fluent_args = if args.is_empty() {
            None
        } else {
            let mut fluent_args = FluentArgs::new();
            for (name, value) in args {
                fluent_args.set(*name, FluentValue::from(*value));
            }
            Some(fluent_args)
        };

        self.format(language, key, fluent_args.as_ref())
            .or_else(|| self.format(DEFAULT_LANGUAGE, key, fluent_args.as_ref()))
            .unwrap_or_else(|| format!("Missing translation: {key}"))
    }
}

static LOCALIZATION_MANAGER: OnceLock<LocalizationManager> = OnceLock::new();

/// Initialize the global localization manager
pub fn init_localization() -> Result<()> {
    if LOCALIZATION_MANAGER.get().is_some() {
        return Ok(());
    }
    let manager = LocalizationManager::new()?;
    let _ = LOCALIZATION_MANAGER.set(manager);
    Ok(())
}

/// Get the global localization manager, initializing it on first use
pub fn get_localization_manager() -> Option<&'static LocalizationManager> {
    if LOCALIZATION_MANAGER.get().is_none() {
        if let Err(e) = init_localization() {
            tracing::error!(error = %e, "Failed to initialize localization");
            return None;
        }
    }
    LOCALIZATION_MANAGER.get()
}

/// Localized message in English
pub fn t(key: &str) -> String {
    t_lang(key, None)
}

/// Localized message in the user's language
pub fn t_lang(key: &str, language: Option<&str>) -> String {
    t_args_lang(key, &[], language)
}

/// Localized message with arguments in English
pub fn t_args(key: &str, args: &[(&str, &str)]) -> String {
    t_args_lang(key, args, None)
}

/// Localized message with arguments in the user's language
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language: Option<&str>) -> String {
    match get_localization_manager() {
        Some(manager) => manager.get_message(key, args, language),
        None => key.to_string(),
    }
}
