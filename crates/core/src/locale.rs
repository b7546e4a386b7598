//! Recipient locales.
//!
//! EDUCAFRIC serves a bilingual French/English user base. French is the
//! primary market language and acts as the fallback when a template has no
//! variant for the requested locale.

use serde::{Deserialize, Serialize};

/// A recipient's preferred message language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// French — the default and fallback locale.
    Fr,
    /// English.
    En,
}

impl Locale {
    /// The locale used when a template has no variant for the requested one.
    pub const FALLBACK: Locale = Locale::Fr;

    /// Stable wire name (`fr` / `en`), matching the `preferred_locale`
    /// column in `recipient_contacts`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::Fr => "fr",
            Locale::En => "en",
        }
    }

    /// Parse a stored locale value, defaulting to French for anything
    /// unrecognised rather than failing a delivery over a bad row.
    pub fn parse_or_default(value: &str) -> Locale {
        match value {
            "en" => Locale::En,
            _ => Locale::Fr,
        }
    }
}

impl Default for Locale {
    fn default() -> Self {
        Locale::Fr
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_locales() {
        assert_eq!(Locale::parse_or_default("en"), Locale::En);
        assert_eq!(Locale::parse_or_default("fr"), Locale::Fr);
    }

    #[test]
    fn unknown_locale_defaults_to_french() {
        assert_eq!(Locale::parse_or_default("sw"), Locale::Fr);
        assert_eq!(Locale::parse_or_default(""), Locale::Fr);
    }
}
