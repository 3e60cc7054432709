//! Configuration for this crate.

/// Settings carried into every inspection.
///
/// The engine itself reads none of these fields; they travel with the
/// inspection so a host can shape the presentation of results (most
/// notably the locale its own diagnostics layer renders in).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// The locale the host renders messages in.
    locale: String,
}

impl Settings {
    /// Constructs settings with the given locale.
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
        }
    }

    /// Gets the locale the host renders messages in.
    pub fn locale(&self) -> &str {
        &self.locale
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            locale: "en-US".into(),
        }
    }
}
