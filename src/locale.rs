//! Locale tag normalization for the four localized-text fields.
//!
//! LCMS2's `cmsSetLanguage` takes a fixed `[i8; 3]` pair built for passing
//! straight into a C FFI call; there is no FFI boundary left here, so a
//! locale is just the normalized key string itself, produced by
//! [`Locale::normalize`].

use crate::error::IccError;
use std::fmt;

/// A normalized locale key: `""` (default), `"xx"`, or `"xx_YY"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locale(String);

impl Locale {
    /// The default/unspecified locale.
    #[must_use]
    pub fn default_locale() -> Self {
        Self(String::new())
    }

    /// Normalizes an input locale string per the tag-surface rules:
    /// `"en_US*"` collapses to the default; anything after `.` or `(` is
    /// stripped; at most two language characters and two country
    /// characters survive.
    pub fn normalize(input: &str) -> Result<Self, IccError> {
        if input.is_empty() {
            return Ok(Self::default_locale());
        }
        if input.starts_with("en_US") {
            return Ok(Self::default_locale());
        }

        let cut = input
            .find(['.', '('])
            .map_or(input, |idx| &input[..idx]);

        if cut.is_empty() {
            return Err(IccError::InvalidLocale(input.to_owned()));
        }

        let mut parts = cut.splitn(2, '_');
        let lang = parts.next().unwrap_or("");
        let country = parts.next();

        if lang.is_empty() || !lang.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(IccError::InvalidLocale(input.to_owned()));
        }
        let lang = &lang[..lang.len().min(2)];

        let normalized = match country {
            Some(c) if !c.is_empty() && c.bytes().all(|b| b.is_ascii_alphabetic()) => {
                format!("{lang}_{}", &c[..c.len().min(2)])
            }
            Some(_) => return Err(IccError::InvalidLocale(input.to_owned())),
            None => lang.to_owned(),
        };
        Ok(Self(normalized))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<default>")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::default_locale()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_en_us_are_default() {
        assert_eq!(Locale::normalize("").unwrap(), Locale::default_locale());
        assert_eq!(Locale::normalize("en_US").unwrap(), Locale::default_locale());
        assert_eq!(Locale::normalize("en_US.UTF-8").unwrap(), Locale::default_locale());
    }

    #[test]
    fn strips_suffixes() {
        assert_eq!(Locale::normalize("fr_CA.UTF-8").unwrap().as_str(), "fr_CA");
        assert_eq!(Locale::normalize("de_DE(euro)").unwrap().as_str(), "de_DE");
    }

    #[test]
    fn language_only() {
        assert_eq!(Locale::normalize("fr").unwrap().as_str(), "fr");
    }

    #[test]
    fn invalid_forms_error() {
        assert!(Locale::normalize(".").is_err());
        assert!(Locale::normalize("1r_CA").is_err());
        assert!(Locale::normalize("fr_1A").is_err());
    }
}
