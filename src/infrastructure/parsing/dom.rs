//! DOM traversal helpers shared by the item detector and the field extractor

use scraper::{ElementRef, Html, Selector};

use crate::error::ConfigurationError;

/// Elements whose text never counts as visible content
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// A piece of content inside a container, in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Collapsed, non-empty text node
    Text(String),
    /// `href` of an anchor, emitted before the anchor's own text
    Link(String),
}

impl Segment {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(text) | Self::Link(text) => text,
        }
    }
}

pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn is_skipped_tag(name: &str) -> bool {
    SKIPPED_TAGS.contains(&name)
}

/// Visible text of the whole document, whitespace-collapsed
pub fn visible_text(document: &Html) -> String {
    visible_element_text(document.root_element())
}

/// Visible text below `element`, whitespace-collapsed
pub fn visible_element_text(element: ElementRef<'_>) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| is_skipped_tag(el.name()))
        });
        if !hidden {
            parts.push(text);
        }
    }
    collapse_whitespace(&parts.join(" "))
}

/// Ordered text and link segments below `container`
pub fn segments(container: ElementRef<'_>) -> Vec<Segment> {
    let mut out = Vec::new();
    for node in container.descendants() {
        if let Some(element) = node.value().as_element() {
            if element.name() == "a" {
                if let Some(href) = element.attr("href").map(str::trim).filter(|h| !h.is_empty()) {
                    out.push(Segment::Link(href.to_string()));
                }
            }
            continue;
        }

        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| is_skipped_tag(el.name()))
        });
        if hidden {
            continue;
        }
        let collapsed = collapse_whitespace(text);
        if !collapsed.is_empty() {
            out.push(Segment::Text(collapsed));
        }
    }
    out
}

/// Parent element, if any
pub fn parent_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.parent().and_then(ElementRef::wrap)
}

/// Number of element ancestors
pub fn depth(element: ElementRef<'_>) -> usize {
    element
        .ancestors()
        .filter(|ancestor| ancestor.value().is_element())
        .count()
}

/// Whether any ancestor has one of the given tag names
pub fn has_ancestor_tag(element: ElementRef<'_>, tags: &[&str]) -> bool {
    element.ancestors().any(|ancestor| {
        ancestor
            .value()
            .as_element()
            .is_some_and(|el| tags.contains(&el.name()))
    })
}

/// Tag plus sorted class list, e.g. `li.card.person`
pub fn tag_with_classes(element: ElementRef<'_>) -> String {
    let value = element.value();
    let mut classes: Vec<&str> = value.classes().collect();
    classes.sort_unstable();
    classes.dedup();
    if classes.is_empty() {
        value.name().to_string()
    } else {
        format!("{}.{}", value.name(), classes.join("."))
    }
}

/// Structural locator such as `body/div.directory/ul/li.person[3]`
///
/// The index is the 1-based position among siblings with the same tag and classes,
/// and is only printed when such siblings exist.
pub fn dom_path(element: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    let mut current = Some(element);

    while let Some(el) = current {
        if el.value().name() == "html" {
            break;
        }
        let label = tag_with_classes(el);
        let siblings: Vec<ElementRef<'_>> = el
            .parent()
            .map(|parent| {
                parent
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|sibling| tag_with_classes(*sibling) == label)
                    .collect()
            })
            .unwrap_or_default();

        if siblings.len() > 1 {
            let position = siblings
                .iter()
                .position(|sibling| sibling.id() == el.id())
                .map_or(1, |i| i + 1);
            parts.push(format!("{label}[{position}]"));
        } else {
            parts.push(label);
        }
        current = parent_element(el);
    }

    parts.reverse();
    parts.join("/")
}

/// Text content of an element, or the relevant attribute for links, meta tags and images
pub fn element_value(element: ElementRef<'_>, prefer_href: bool) -> Option<String> {
    let value = element.value();
    let from_attr = match value.name() {
        "meta" => value.attr("content"),
        "link" => value.attr("href"),
        "a" if prefer_href => value.attr("href"),
        "img" => value.attr("alt"),
        "input" => value.attr("value"),
        _ => None,
    };

    let raw = match from_attr {
        Some(attr) => attr.to_string(),
        None => visible_element_text(element),
    };
    let collapsed = collapse_whitespace(&raw);
    (!collapsed.is_empty()).then_some(collapsed)
}

/// Compile one selector, reporting the hint it belongs to on failure
pub fn compile_selector(hint: &str, selector: &str) -> Result<Selector, ConfigurationError> {
    Selector::parse(selector).map_err(|e| ConfigurationError::invalid_selector(hint, selector, e))
}

/// Compile a fallback list; entries that fail are logged and skipped
pub fn compile_selector_list(selectors: &[String]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|raw| match Selector::parse(raw) {
            Ok(selector) => Some(selector),
            Err(e) => {
                tracing::warn!("Failed to compile built-in selector '{}': {}", raw, e);
                None
            }
        })
        .collect()
}
