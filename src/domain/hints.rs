//! Site hints: optional, read-only selectors that bias detection for a known site
//!
//! Hints arrive as plain strings ([`SiteHintsConfig`]) and are compiled once into
//! [`SiteHints`] before the run starts. A selector that fails to compile is a
//! configuration error; a hint that is absent simply leaves that aspect to heuristics.

use std::collections::HashMap;
use std::path::Path;

use scraper::Selector;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigurationError;
use crate::infrastructure::parsing::dom::compile_selector;

/// Hints as written in a hints file or passed by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteHintsConfig {
    /// Selector matching one element per directory entry
    pub list_item_selector: Option<String>,
    /// Selector for the detail link inside a list item
    pub detail_link_selector: Option<String>,
    pub next_link_selector: Option<String>,
    /// Query parameter carrying the page number or cursor
    pub pagination_param: Option<String>,
    /// Per-field selectors, keyed by schema field name
    pub fields: HashMap<String, String>,
    /// Extra label texts per field name
    pub label_synonyms: HashMap<String, Vec<String>>,
    /// Ask for rendered fetches from the first page on
    pub requires_rendering: bool,
}

impl SiteHintsConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(raw)
            .map_err(|e| ConfigurationError::Load(format!("invalid site hints: {e}")))
    }

    /// Compile every selector up front
    pub fn compile(&self) -> Result<SiteHints, ConfigurationError> {
        let optional = |hint: &str, raw: Option<&String>| -> Result<Option<Selector>, ConfigurationError> {
            raw.map(|selector| compile_selector(hint, selector)).transpose()
        };

        let mut field_selectors: Vec<(String, Selector)> = self
            .fields
            .iter()
            .map(|(field, raw)| Ok((field.clone(), compile_selector(&format!("fields.{field}"), raw)?)))
            .collect::<Result<_, ConfigurationError>>()?;
        field_selectors.sort_by(|a, b| a.0.cmp(&b.0));

        if let Some(param) = &self.pagination_param {
            if param.trim().is_empty() {
                return Err(ConfigurationError::invalid_value(
                    "pagination_param",
                    "must not be empty",
                ));
            }
        }

        Ok(SiteHints {
            list_item_selector: optional("list_item_selector", self.list_item_selector.as_ref())?,
            detail_link_selector: optional("detail_link_selector", self.detail_link_selector.as_ref())?,
            next_link_selector: optional("next_link_selector", self.next_link_selector.as_ref())?,
            pagination_param: self.pagination_param.as_ref().map(|p| p.trim().to_string()),
            field_selectors,
            label_synonyms: self.label_synonyms.clone(),
            requires_rendering: self.requires_rendering,
            source: self.clone(),
        })
    }
}

/// Compiled hints. Never mutated by the engine.
#[derive(Debug, Clone)]
pub struct SiteHints {
    pub list_item_selector: Option<Selector>,
    pub detail_link_selector: Option<Selector>,
    pub next_link_selector: Option<Selector>,
    pub pagination_param: Option<String>,
    field_selectors: Vec<(String, Selector)>,
    label_synonyms: HashMap<String, Vec<String>>,
    pub requires_rendering: bool,
    source: SiteHintsConfig,
}

impl SiteHints {
    pub fn field_selector(&self, field: &str) -> Option<&Selector> {
        self.field_selectors
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, selector)| selector)
    }

    pub fn label_synonyms(&self, field: &str) -> &[String] {
        self.label_synonyms.get(field).map_or(&[], Vec::as_slice)
    }

    /// The uncompiled form these hints were built from
    pub const fn source(&self) -> &SiteHintsConfig {
        &self.source
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SiteEntry {
    domain: String,
    #[serde(default)]
    hints: SiteHintsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    sites: Vec<SiteEntry>,
}

/// Per-domain hints loaded from a hints file
#[derive(Debug, Clone, Default)]
pub struct SiteHintsCatalog {
    entries: Vec<(String, SiteHints)>,
}

impl SiteHintsCatalog {
    /// Load a catalog file (TOML, YAML or JSON, by extension).
    ///
    /// ```toml
    /// [[sites]]
    /// domain = "example.org"
    /// hints = { list_item_selector = "li.person", pagination_param = "page" }
    /// ```
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let parsed: CatalogFile = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;

        let mut entries = Vec::with_capacity(parsed.sites.len());
        for entry in parsed.sites {
            let domain = entry.domain.trim().trim_start_matches("www.").to_ascii_lowercase();
            if domain.is_empty() {
                return Err(ConfigurationError::invalid_value("sites.domain", "must not be empty"));
            }
            entries.push((domain, entry.hints.compile()?));
        }
        tracing::debug!("Loaded site hints for {} domains", entries.len());
        Ok(Self { entries })
    }

    pub fn insert(&mut self, domain: &str, hints: SiteHints) {
        self.entries
            .push((domain.trim_start_matches("www.").to_ascii_lowercase(), hints));
    }

    /// Hints for the entry whose domain matches the URL's host (subdomains included)
    pub fn for_url(&self, url: &Url) -> Option<&SiteHints> {
        let host = url.host_str()?.trim_start_matches("www.").to_ascii_lowercase();
        self.entries
            .iter()
            .filter(|(domain, _)| host == *domain || host.ends_with(&format!(".{domain}")))
            .max_by_key(|(domain, _)| domain.len())
            .map(|(_, hints)| hints)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_compile_reports_bad_selector() {
        let config = SiteHintsConfig {
            list_item_selector: Some("li..person".into()),
            ..SiteHintsConfig::default()
        };
        assert!(matches!(
            config.compile(),
            Err(ConfigurationError::InvalidSelector { hint, .. }) if hint == "list_item_selector"
        ));
    }

    #[test]
    fn test_compile_keeps_field_selectors_and_synonyms() {
        let config = SiteHintsConfig::from_json_str(
            r#"{"fields": {"email": "a.email"}, "label_synonyms": {"email": ["correo"]}, "pagination_param": "page"}"#,
        )
        .unwrap();
        let hints = config.compile().unwrap();
        assert!(hints.field_selector("email").is_some());
        assert!(hints.field_selector("phone").is_none());
        assert_eq!(hints.label_synonyms("email"), ["correo".to_string()]);
        assert_eq!(hints.pagination_param.as_deref(), Some("page"));
        assert!(hints.list_item_selector.is_none());
    }

    #[test]
    fn test_catalog_matches_subdomains() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[[sites]]
domain = "example.org"
hints = {{ list_item_selector = "li.person" }}

[[sites]]
domain = "www.staff.example.org"
hints = {{ requires_rendering = true }}
"#
        )
        .unwrap();

        let catalog = SiteHintsCatalog::from_file(file.path()).unwrap();
        assert_eq!(catalog.len(), 2);

        let root = Url::parse("https://www.example.org/people").unwrap();
        assert!(catalog.for_url(&root).unwrap().list_item_selector.is_some());

        let staff = Url::parse("https://staff.example.org/").unwrap();
        assert!(catalog.for_url(&staff).unwrap().requires_rendering);

        let other = Url::parse("https://example.com/").unwrap();
        assert!(catalog.for_url(&other).is_none());
    }
}
