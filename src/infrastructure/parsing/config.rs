//! Parsing configuration for heuristic detection and extraction
//!
//! Centralized tunables and built-in selector/label tables. Nothing in here is
//! site-specific; site-specific selectors arrive as site hints.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::schema::{FieldSpec, FieldType};

/// Main parsing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    /// Minimum members for a repeated structure to count as a list
    pub min_group_size: usize,

    /// Ancestors whose groups are only used when nothing else qualifies
    pub boilerplate_regions: Vec<String>,

    /// How many segments after a label are searched for its value
    pub max_label_distance: usize,

    /// Label texts per field name
    pub label_synonyms: HashMap<String, Vec<String>>,

    /// Semantic-markup selectors per field name
    pub semantic_selectors: HashMap<String, Vec<String>>,

    /// Semantic selectors applied by field type when the name has none
    pub type_selectors: HashMap<FieldType, Vec<String>>,

    /// Pagination cue tables
    pub pagination: PaginationCues,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            min_group_size: 3,
            boilerplate_regions: vec!["nav".to_string(), "header".to_string(), "footer".to_string()],
            max_label_distance: 6,
            label_synonyms: default_label_synonyms(),
            semantic_selectors: default_semantic_selectors(),
            type_selectors: default_type_selectors(),
            pagination: PaginationCues::default(),
        }
    }
}

impl ParsingConfig {
    /// Label texts for a field: built-ins by name (or by type), the field name itself,
    /// schema synonyms and hint synonyms. Lowercased, longest first.
    pub fn labels_for(&self, field: &FieldSpec, hint_synonyms: &[String]) -> Vec<String> {
        let key = field.name.to_lowercase();
        let builtin = self
            .label_synonyms
            .get(&key)
            .or_else(|| self.label_synonyms.get(field.field_type.as_str()));

        let mut labels: Vec<String> = std::iter::once(key.replace(['_', '-'], " "))
            .chain(builtin.into_iter().flatten().cloned())
            .chain(field.synonyms.iter().cloned())
            .chain(hint_synonyms.iter().cloned())
            .map(|label| label.trim().to_lowercase())
            .filter(|label| !label.is_empty())
            .collect();

        labels.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        labels.dedup();
        labels
    }
}

/// Texts and names that signal each pagination idiom
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationCues {
    /// Whole-text matches (case-insensitive) for a "next" link
    pub next_texts: Vec<String>,

    /// Query parameters that usually carry a cursor
    pub cursor_params: Vec<String>,

    /// Selectors for elements signalling script-loaded continuation
    pub scroll_selectors: Vec<String>,

    /// Attributes that may hold the continuation endpoint
    pub scroll_url_attributes: Vec<String>,

    /// Button texts for "load more" controls
    pub load_more_texts: Vec<String>,
}

impl Default for PaginationCues {
    fn default() -> Self {
        Self {
            next_texts: [
                "next", "next page", "next ›", "next »", "next >", "›", "»", "→", ">", ">>",
                "older posts", "older entries", "more results",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            cursor_params: [
                "cursor", "after", "before", "offset", "start", "from", "page_token", "pageToken",
                "continuation", "next",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            scroll_selectors: vec![
                "[class*='load-more']".to_string(),
                "[id*='load-more']".to_string(),
                "[class*='infinite']".to_string(),
                "[id*='infinite']".to_string(),
                "[data-next-url]".to_string(),
                "[data-next]".to_string(),
                "[hx-get][hx-trigger*='revealed']".to_string(),
            ],
            scroll_url_attributes: vec![
                "data-next-url".to_string(),
                "data-next".to_string(),
                "hx-get".to_string(),
                "data-url".to_string(),
                "href".to_string(),
            ],
            load_more_texts: vec![
                "load more".to_string(),
                "show more".to_string(),
                "see more".to_string(),
            ],
        }
    }
}

fn table(entries: &[(&[&str], &[&str])]) -> HashMap<String, Vec<String>> {
    let mut map = HashMap::new();
    for (keys, values) in entries {
        let values: Vec<String> = values.iter().map(ToString::to_string).collect();
        for key in *keys {
            map.insert((*key).to_string(), values.clone());
        }
    }
    map
}

fn default_label_synonyms() -> HashMap<String, Vec<String>> {
    table(&[
        (&["email", "e_mail", "mail"], &["email", "e-mail", "mail", "email address", "contact"]),
        (
            &["phone", "telephone", "tel", "mobile"],
            &["phone", "telephone", "tel", "tel.", "mobile", "cell", "office phone", "phone number"],
        ),
        (
            &["url", "website", "homepage", "site"],
            &["website", "homepage", "home page", "web", "url", "site", "link"],
        ),
        (&["name", "full_name"], &["name", "full name"]),
        (
            &["title", "job_title", "position", "role"],
            &["title", "job title", "position", "role"],
        ),
        (
            &["org", "organization", "company", "affiliation", "employer"],
            &["organization", "organisation", "company", "affiliation", "employer", "department"],
        ),
        (
            &["location", "address", "city"],
            &["location", "address", "office", "city"],
        ),
        (
            &["bio", "about", "description", "summary"],
            &["bio", "biography", "about", "summary", "profile"],
        ),
    ])
}

fn default_semantic_selectors() -> HashMap<String, Vec<String>> {
    table(&[
        (
            &["name", "full_name"],
            &["h1", "[itemprop='name']", "meta[property='og:title']"],
        ),
        (&["title", "job_title", "position", "role"], &["[itemprop='jobTitle']"]),
        (
            &["org", "organization", "company", "affiliation", "employer"],
            &["[itemprop='affiliation']", "[itemprop='worksFor']"],
        ),
        (&["location", "address", "city"], &["[itemprop='address']"]),
        (
            &["bio", "about", "description", "summary"],
            &["[itemprop='description']", "meta[name='description']"],
        ),
        (
            &["page_url", "profile_url", "canonical_url"],
            &["link[rel='canonical']", "meta[property='og:url']"],
        ),
        (&["website", "homepage"], &["a[itemprop='url']"]),
    ])
}

fn default_type_selectors() -> HashMap<FieldType, Vec<String>> {
    HashMap::from([
        (FieldType::Email, vec!["a[href^='mailto:']".to_string(), "[itemprop='email']".to_string()]),
        (FieldType::Phone, vec!["a[href^='tel:']".to_string(), "[itemprop='telephone']".to_string()]),
    ])
}
