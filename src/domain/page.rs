//! Page model: an immutable fetched page handed over by the fetching collaborator

use chrono::{DateTime, Utc};
use scraper::Html;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::FetchError;
use crate::infrastructure::url_normalizer;

/// How the fetching collaborator should obtain a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RenderHint {
    /// Plain HTTP fetch of the server-rendered markup
    #[default]
    Static,
    /// Script-rendered DOM from a browser
    Rendered,
    /// Rendered DOM after scroll-triggered loading has been exhausted
    Scroll,
}

impl RenderHint {
    pub const fn is_rendered(self) -> bool {
        !matches!(self, Self::Static)
    }
}

/// A fetched page. Fields are private so a `Page` cannot change after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    url: Url,
    markup: String,
    rendered: bool,
    fetched_at: DateTime<Utc>,
}

impl Page {
    /// Build a page, normalizing the URL it was fetched from
    pub fn new(url: &str, markup: impl Into<String>, rendered: bool) -> Result<Self, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_url(parsed, markup, rendered))
    }

    pub fn from_url(url: Url, markup: impl Into<String>, rendered: bool) -> Self {
        Self {
            url: url_normalizer::normalize(&url),
            markup: markup.into(),
            rendered,
            fetched_at: Utc::now(),
        }
    }

    /// Override the fetch timestamp (fixtures, replayed pages)
    #[must_use]
    pub const fn with_fetched_at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.fetched_at = fetched_at;
        self
    }

    pub const fn url(&self) -> &Url {
        &self.url
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub const fn rendered(&self) -> bool {
        self.rendered
    }

    pub const fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Parse the markup. `Html` is `!Send`, so callers keep it inside synchronous scopes.
    pub fn document(&self) -> Html {
        Html::parse_document(&self.markup)
    }

    /// Visible text of the page with whitespace runs collapsed
    pub fn text(&self) -> String {
        let document = self.document();
        crate::infrastructure::parsing::dom::visible_text(&document)
    }

    /// BLAKE3 digest of the markup, used to spot listing pages that repeat
    pub fn content_digest(&self) -> String {
        blake3::hash(self.markup.as_bytes()).to_hex().to_string()
    }
}
