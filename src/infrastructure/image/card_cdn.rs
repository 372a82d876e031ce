//! Card artwork addressing.

use serde::{Deserialize, Serialize};

use crate::domain::entities::CardId;

/// Placeholder replaced by the card id in URL templates.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Default artwork CDN template.
pub const DEFAULT_URL_TEMPLATE: &str = "https://cdn.233.momobako.com/ygoimg/jp/{id}.webp";

/// Maps card ids to remote artwork locators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardArtSource {
    url_template: String,
}

impl CardArtSource {
    /// Creates a source from a template containing `{id}`.
    /// A template without the placeholder gets the id appended as a path segment.
    #[must_use]
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
        }
    }

    /// Returns the template.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.url_template
    }

    /// Renders the artwork URL for a card.
    #[must_use]
    pub fn url_for(&self, id: CardId) -> String {
        if self.url_template.contains(ID_PLACEHOLDER) {
            self.url_template.replace(ID_PLACEHOLDER, &id.to_string())
        } else {
            format!("{}/{id}", self.url_template.trim_end_matches('/'))
        }
    }
}

impl Default for CardArtSource {
    fn default() -> Self {
        Self::new(DEFAULT_URL_TEMPLATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(DEFAULT_URL_TEMPLATE, 89_631_139, "https://cdn.233.momobako.com/ygoimg/jp/89631139.webp" ; "default_cdn")]
    #[test_case("http://localhost:8080/{id}.png", 5, "http://localhost:8080/5.png" ; "custom_template")]
    #[test_case("https://mirror.example/art/", 12, "https://mirror.example/art/12" ; "no_placeholder")]
    fn test_url_for(template: &str, raw: u32, expected: &str) {
        let source = CardArtSource::new(template);
        assert_eq!(source.url_for(CardId::new(raw).unwrap()), expected);
    }
}
